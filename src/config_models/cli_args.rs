use std::path::PathBuf;

use clap::Parser;

use crate::models::coins::Coins;

/// Declarative specification of command-line arguments
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// The data directory that contains the local mining records.
    ///
    /// Defaults to the operating system's data directory for fcminer.
    #[clap(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Mine as this user. Without it the miner runs anonymously and cannot
    /// start a session.
    #[clap(long)]
    pub user_id: Option<String>,

    /// Length of one mining session, in seconds.
    #[clap(long, default_value = "21600", value_parser(clap::value_parser!(u64).range(1..=604_800)))]
    pub mining_period_secs: u64,

    /// Length of one reward cycle, in seconds. Must not exceed the session
    /// length.
    #[clap(long, default_value = "180", value_parser(clap::value_parser!(u64).range(1..)))]
    pub cycle_length_secs: u64,

    /// Reward credited per cycle before referrals, upgrades and boosts.
    #[clap(long, default_value = "0.003")]
    pub base_rate: Coins,

    /// Rate added per referred user.
    #[clap(long, default_value = "0.0001")]
    pub referral_bonus_rate: Coins,

    /// Upper bound on the total referral bonus.
    #[clap(long, default_value = "0.001")]
    pub referral_bonus_cap: Coins,

    /// How often the accrual step runs, in milliseconds.
    #[clap(long, default_value = "1000", value_parser(clap::value_parser!(u64).range(10..=60_000)))]
    pub tick_interval_ms: u64,

    /// Interval of the safety-net flush to the local store, in milliseconds.
    #[clap(long, default_value = "2000", value_parser(clap::value_parser!(u64).range(10..=600_000)))]
    pub flush_interval_ms: u64,

    /// Interval of reconciliation with the remote profile, in seconds.
    #[clap(long, default_value = "300", value_parser(clap::value_parser!(u64).range(1..)))]
    pub sync_interval_secs: u64,

    /// Give up on a remote call after this many milliseconds.
    #[clap(long, default_value = "10000", value_parser(clap::value_parser!(u64).range(1..)))]
    pub remote_timeout_ms: u64,

    /// Start a mining session right after loading, if none is running.
    #[clap(long)]
    pub start: bool,
}

impl Default for Args {
    fn default() -> Self {
        let empty: Vec<String> = vec![];
        Self::parse_from(empty)
    }
}
