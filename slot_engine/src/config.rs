//! Engine configuration.
//!
//! Consolidates all environment variable reads for the odds table and the
//! retry policy and validates them once at startup.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SlotConfig {
    /// Payout odds
    pub odds: OddsConfig,
    /// Backoff applied to recoverable settlement failures
    pub retry: RetryConfig,
}

/// Payout odds.
///
/// The two probabilities are independent draws, not a partition of [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OddsConfig {
    /// Probability of a three-symbol match
    pub three_match_probability: f64,
    /// Probability of a two-symbol match (drawn only when three-match misses)
    pub two_match_probability: f64,
    /// Bet multiplier paid on a three-symbol match
    pub three_match_multiplier: Decimal,
    /// Bet multiplier paid on a two-symbol match
    pub two_match_multiplier: Decimal,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            three_match_probability: 0.05,
            two_match_probability: 0.30,
            three_match_multiplier: Decimal::TEN,
            two_match_multiplier: Decimal::TWO,
        }
    }
}

/// Exponential backoff parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Delay before the first retry
    pub initial_interval: Duration,
    /// Growth factor applied to the delay after each retry
    pub multiplier: f64,
    /// Total time budget measured from the first attempt
    pub max_elapsed: Duration,
    /// Cap on a single delay
    pub max_interval: Duration,
    /// Jitter: each delay is drawn from `interval * [1 - f, 1 + f]`
    pub randomization_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_elapsed: Duration::from_secs(2),
            max_interval: Duration::from_secs(60),
            randomization_factor: 0.5,
        }
    }
}

impl SlotConfig {
    /// Load `.env` (if present) and then read configuration from the environment
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    /// Load configuration from environment variables
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `THREE_MATCH_PROBABILITY` | 0.05 |
    /// | `TWO_MATCH_PROBABILITY` | 0.30 |
    /// | `MULTIPLIER_THREE` | 10 |
    /// | `MULTIPLIER_TWO` | 2 |
    /// | `SPIN_RETRY_INITIAL_INTERVAL_MS` | 500 |
    /// | `SPIN_RETRY_MULTIPLIER` | 1.5 |
    /// | `SPIN_RETRY_MAX_ELAPSED_MS` | 2000 |
    /// | `SPIN_RETRY_MAX_INTERVAL_MS` | 60000 |
    /// | `SPIN_RETRY_RANDOMIZATION` | 0.5 |
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set but malformed, or
    /// if any value fails [`SlotConfig::validate`]
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = SlotConfig::default();

        let odds = OddsConfig {
            three_match_probability: parse_env_or(
                "THREE_MATCH_PROBABILITY",
                defaults.odds.three_match_probability,
            )?,
            two_match_probability: parse_env_or(
                "TWO_MATCH_PROBABILITY",
                defaults.odds.two_match_probability,
            )?,
            three_match_multiplier: parse_env_or(
                "MULTIPLIER_THREE",
                defaults.odds.three_match_multiplier,
            )?,
            two_match_multiplier: parse_env_or("MULTIPLIER_TWO", defaults.odds.two_match_multiplier)?,
        };

        let retry = RetryConfig {
            initial_interval: Duration::from_millis(parse_env_or(
                "SPIN_RETRY_INITIAL_INTERVAL_MS",
                500,
            )?),
            multiplier: parse_env_or("SPIN_RETRY_MULTIPLIER", defaults.retry.multiplier)?,
            max_elapsed: Duration::from_millis(parse_env_or("SPIN_RETRY_MAX_ELAPSED_MS", 2000)?),
            max_interval: Duration::from_millis(parse_env_or("SPIN_RETRY_MAX_INTERVAL_MS", 60_000)?),
            randomization_factor: parse_env_or(
                "SPIN_RETRY_RANDOMIZATION",
                defaults.retry.randomization_factor,
            )?,
        };

        let config = SlotConfig { odds, retry };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("THREE_MATCH_PROBABILITY", self.odds.three_match_probability)?;
        check_probability("TWO_MATCH_PROBABILITY", self.odds.two_match_probability)?;
        check_multiplier("MULTIPLIER_THREE", self.odds.three_match_multiplier)?;
        check_multiplier("MULTIPLIER_TWO", self.odds.two_match_multiplier)?;

        let retry = &self.retry;
        if retry.initial_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "SPIN_RETRY_INITIAL_INTERVAL_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                var: "SPIN_RETRY_MULTIPLIER".to_string(),
                reason: format!("Must be a finite value >= 1.0, got {}", retry.multiplier),
            });
        }

        if retry.max_interval < retry.initial_interval {
            return Err(ConfigError::Invalid {
                var: "SPIN_RETRY_MAX_INTERVAL_MS".to_string(),
                reason: format!(
                    "Must be at least the initial interval ({:?})",
                    retry.initial_interval
                ),
            });
        }

        if !(0.0..=1.0).contains(&retry.randomization_factor) {
            return Err(ConfigError::Invalid {
                var: "SPIN_RETRY_RANDOMIZATION".to_string(),
                reason: "Must be within [0, 1]".to_string(),
            });
        }

        Ok(())
    }
}

fn check_probability(var: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Invalid {
            var: var.to_string(),
            reason: format!("Probability must be within [0, 1], got {value}"),
        });
    }
    Ok(())
}

fn check_multiplier(var: &str, value: Decimal) -> Result<(), ConfigError> {
    if value < Decimal::ZERO {
        return Err(ConfigError::Invalid {
            var: var.to_string(),
            reason: format!("Multiplier must be non-negative, got {value}"),
        });
    }
    Ok(())
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an environment variable, falling back to `default` only when unset
///
/// # Errors
///
/// Returns `ConfigError::Invalid` when the variable is set but does not parse
pub(crate) fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_or(key, std::env::var(key).ok().as_deref(), default)
}

fn parse_or<T>(key: &str, raw: Option<&str>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("Cannot parse {value:?}: {e}"),
        }),
    }
}
