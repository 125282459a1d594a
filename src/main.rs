use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use fcminer_core::config_models::cli_args;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

pub fn main() -> Result<()> {
    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .context("Could not create tokio runtime")?;

    let result = tokio_runtime.block_on(async {
        // Fetch the CLI arguments
        let args: cli_args::Args = cli_args::Args::parse();

        // Set up logger.
        // Configure logger to use ISO-8601, of which rfc3339 is a subset.
        // install global collector configured based on RUST_LOG env var.
        // Accepted `RUST_LOG` values are `trace`, `debug`, `info`, `warn`,
        // and `error`.
        let info_env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .with_env_filter(info_env_filter)
            .with_thread_ids(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set trace subscriber")?;

        fcminer_core::initialize(args).await
    });

    tokio_runtime.shutdown_timeout(tokio::time::Duration::from_secs(10));
    result
}
