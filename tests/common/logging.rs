use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

/// `#[traced_test]` filters out events from `fcminer_core` in integration
/// tests, because each test file is its own crate. Call this at the start of
/// a test instead.
///
/// Only the first call in a process installs the subscriber.
pub fn tracing_logger() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("self=trace,fcminer_core=debug"));
    let subscriber = FmtSubscriber::builder()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(env_filter)
        .with_thread_ids(true)
        .with_test_writer()
        .finish();

    let _result = tracing::subscriber::set_global_default(subscriber);
}
