use std::time::Duration;

use anyhow::ensure;

use super::cli_args::Args;
use crate::models::state::mining_rate::RateSchedule;
use crate::models::state::mining_state::MiningParams;

/// Everything the engine and its driver loop are tuned by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub params: MiningParams,
    pub rates: RateSchedule,
    pub tick_interval: Duration,
    pub flush_interval: Duration,
    pub sync_interval: Duration,
    pub remote_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            params: MiningParams::default(),
            rates: RateSchedule::default(),
            tick_interval: Duration::from_secs(1),
            flush_interval: Duration::from_secs(2),
            sync_interval: Duration::from_secs(5 * 60),
            remote_timeout: Duration::from_secs(10),
        }
    }
}

impl TryFrom<&Args> for EngineConfig {
    type Error = anyhow::Error;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        ensure!(
            args.cycle_length_secs <= args.mining_period_secs,
            "cycle length ({}s) must not exceed the mining period ({}s)",
            args.cycle_length_secs,
            args.mining_period_secs
        );

        Ok(Self {
            params: MiningParams {
                period_secs: args.mining_period_secs,
                cycle_secs: args.cycle_length_secs,
            },
            rates: RateSchedule {
                base: args.base_rate,
                referral_bonus: args.referral_bonus_rate,
                referral_bonus_cap: args.referral_bonus_cap,
            },
            tick_interval: Duration::from_millis(args.tick_interval_ms),
            flush_interval: Duration::from_millis(args.flush_interval_ms),
            sync_interval: Duration::from_secs(args.sync_interval_secs),
            remote_timeout: Duration::from_millis(args.remote_timeout_ms),
        })
    }
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::*;

    #[test]
    fn default_args_give_default_config() {
        assert_eq!(
            EngineConfig::default(),
            EngineConfig::try_from(&Args::default()).unwrap()
        );
    }

    #[test]
    fn cycle_longer_than_period_is_rejected() {
        let args = Args::parse_from([
            "fcminer",
            "--mining-period-secs",
            "100",
            "--cycle-length-secs",
            "180",
        ]);
        assert!(EngineConfig::try_from(&args).is_err());
    }
}
