use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::decimal::Percent;
use crate::errors::{LendingError, Result};

/// default interval between scheduled sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// largest periodicity chrono can represent as a duration
pub const MAX_PERIODICITY_SECONDS: u64 = i64::MAX as u64 / 1_000;

/// global loan-contract parameters, owned by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanParameters {
    /// interest charged per period, as a percentage of principal
    pub interest_rate: Percent,
    /// length of one payment period
    pub periodicity_seconds: u64,
    /// extra percentage charged for early payoff
    pub termination_fee: Percent,
}

impl LoanParameters {
    pub fn new(interest_rate: Percent, periodicity_seconds: u64, termination_fee: Percent) -> Self {
        Self {
            interest_rate,
            periodicity_seconds,
            termination_fee,
        }
    }

    /// weekly payments
    pub fn weekly(interest_rate: Percent, termination_fee: Percent) -> Self {
        Self::new(interest_rate, 7 * 24 * 60 * 60, termination_fee)
    }

    pub fn validate(&self) -> Result<()> {
        if self.periodicity_seconds == 0 {
            return Err(LendingError::InvalidConfiguration {
                message: "payment periodicity must be positive".to_string(),
            });
        }
        if self.periodicity_seconds > MAX_PERIODICITY_SECONDS {
            return Err(LendingError::InvalidConfiguration {
                message: format!("payment periodicity {}s is out of range", self.periodicity_seconds),
            });
        }
        if self.interest_rate.is_negative() {
            return Err(LendingError::InvalidPercentage {
                percent: self.interest_rate,
            });
        }
        if self.termination_fee.is_negative() {
            return Err(LendingError::InvalidPercentage {
                percent: self.termination_fee,
            });
        }
        Ok(())
    }
}

/// reconciliation sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// time between scheduled passes
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    /// run a pass as soon as the schedule starts instead of after one interval
    pub run_immediately: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            run_immediately: true,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(LendingError::InvalidConfiguration {
                message: "sweep interval must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// engine configuration loaded at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub sweep: SweepConfig,
    /// decimals of the ledger currency, used when rendering amounts
    #[serde(default = "default_currency_decimals")]
    pub currency_decimals: u32,
}

fn default_currency_decimals() -> u32 {
    18
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep: SweepConfig::default(),
            currency_decimals: default_currency_decimals(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| LendingError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.sweep.validate()?;
        if self.currency_decimals > 38 {
            return Err(LendingError::InvalidConfiguration {
                message: format!("currency decimals {} out of range", self.currency_decimals),
            });
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_periodicity_is_configuration_error() {
        let params = LoanParameters::new(Percent::from_percentage(5), 0, Percent::from_percentage(10));
        assert!(matches!(
            params.validate(),
            Err(LendingError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_negative_rates_rejected() {
        let params = LoanParameters::weekly(Percent::from_decimal(dec!(-0.5)), Percent::ZERO);
        assert!(matches!(
            params.validate(),
            Err(LendingError::InvalidPercentage { .. })
        ));

        let params = LoanParameters::weekly(Percent::ZERO, Percent::from_decimal(dec!(-1)));
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_weekly_parameters() {
        let params = LoanParameters::weekly(Percent::from_percentage(5), Percent::from_percentage(10));
        assert_eq!(params.periodicity_seconds, 604_800);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_default_sweep_every_ten_minutes() {
        let config = EngineConfig::default();
        assert_eq!(config.sweep.interval, Duration::from_secs(600));
        assert!(config.sweep.run_immediately);
    }

    #[test]
    fn test_engine_config_from_json() {
        let config = EngineConfig::from_json(
            r#"{ "sweep": { "interval": 30, "run_immediately": false }, "currency_decimals": 6 }"#,
        )
        .unwrap();
        assert_eq!(config.sweep.interval, Duration::from_secs(30));
        assert!(!config.sweep.run_immediately);
        assert_eq!(config.currency_decimals, 6);

        let defaults = EngineConfig::from_json("{}").unwrap();
        assert_eq!(defaults.sweep.interval, DEFAULT_SWEEP_INTERVAL);
        assert_eq!(defaults.currency_decimals, 18);
    }

    #[test]
    fn test_engine_config_rejects_zero_interval() {
        let result = EngineConfig::from_json(r#"{ "sweep": { "interval": 0, "run_immediately": true } }"#);
        assert!(matches!(result, Err(LendingError::InvalidConfiguration { .. })));

        assert!(EngineConfig::from_json("not json").is_err());
    }
}
