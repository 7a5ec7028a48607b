//! # Engine Configuration
//!
//! ## Load Order (later overrides earlier)
//! 1. Default values (`tally_core` constants)
//! 2. Environment variables
//!
//! | Variable | Default |
//! |---|---|
//! | `TALLY_DISCOUNT_APPROVAL_THRESHOLD_BPS` | 1000 (10%) |
//! | `TALLY_LOYALTY_EARN_UNIT_CENTS` | 1000 (one point per 10.00) |
//! | `TALLY_RECEIPT_PREFIX` | `INV` |
//! | `TALLY_CAS_MAX_ATTEMPTS` | 8 |

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use tally_core::{
    Money, DEFAULT_DISCOUNT_APPROVAL_THRESHOLD_BPS, DEFAULT_LOYALTY_EARN_UNIT_CENTS,
    DEFAULT_RECEIPT_PREFIX,
};

pub const ENV_DISCOUNT_THRESHOLD: &str = "TALLY_DISCOUNT_APPROVAL_THRESHOLD_BPS";
pub const ENV_EARN_UNIT: &str = "TALLY_LOYALTY_EARN_UNIT_CENTS";
pub const ENV_RECEIPT_PREFIX: &str = "TALLY_RECEIPT_PREFIX";
pub const ENV_CAS_ATTEMPTS: &str = "TALLY_CAS_MAX_ATTEMPTS";

/// Retry budget for counter CAS loops.
pub const DEFAULT_CAS_MAX_ATTEMPTS: u32 = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is set but does not parse.
    #[error("{var} has invalid value '{value}'")]
    InvalidValue { var: String, value: String },

    /// Parsed but unusable configuration.
    #[error("Invalid engine configuration: {0}")]
    Invalid(String),
}

/// Tunables of the sale engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesConfig {
    /// Combined line + manual discount above this needs manager approval.
    pub discount_approval_threshold_bps: i64,
    /// Grand total per earned loyalty point.
    pub loyalty_earn_unit_cents: i64,
    pub receipt_prefix: String,
    pub cas_max_attempts: u32,
}

impl Default for SalesConfig {
    fn default() -> Self {
        SalesConfig {
            discount_approval_threshold_bps: DEFAULT_DISCOUNT_APPROVAL_THRESHOLD_BPS,
            loyalty_earn_unit_cents: DEFAULT_LOYALTY_EARN_UNIT_CENTS,
            receipt_prefix: DEFAULT_RECEIPT_PREFIX.to_string(),
            cas_max_attempts: DEFAULT_CAS_MAX_ATTEMPTS,
        }
    }
}

impl SalesConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by `lookup`, then validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=10_000).contains(&self.discount_approval_threshold_bps) {
            return Err(ConfigError::Invalid(
                "discount approval threshold must be between 0 and 10000 bps".into(),
            ));
        }
        if self.loyalty_earn_unit_cents <= 0 {
            return Err(ConfigError::Invalid("loyalty earn unit must be positive".into()));
        }
        if self.receipt_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("receipt prefix must not be empty".into()));
        }
        if self.cas_max_attempts == 0 {
            return Err(ConfigError::Invalid("cas_max_attempts must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn loyalty_earn_unit(&self) -> Money {
        Money::from_cents(self.loyalty_earn_unit_cents)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DISCOUNT_THRESHOLD) {
            self.discount_approval_threshold_bps = parse(ENV_DISCOUNT_THRESHOLD, &value)?;
            debug!(bps = self.discount_approval_threshold_bps, "Overriding discount threshold from environment");
        }

        if let Some(value) = lookup(ENV_EARN_UNIT) {
            self.loyalty_earn_unit_cents = parse(ENV_EARN_UNIT, &value)?;
        }

        if let Some(value) = lookup(ENV_RECEIPT_PREFIX) {
            debug!(prefix = %value, "Overriding receipt prefix from environment");
            self.receipt_prefix = value.trim().to_string();
        }

        if let Some(value) = lookup(ENV_CAS_ATTEMPTS) {
            self.cas_max_attempts = parse(ENV_CAS_ATTEMPTS, &value)?;
        }

        Ok(())
    }
}

fn parse<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SalesConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SalesConfig::default());
        assert_eq!(config.discount_approval_threshold_bps, 1000);
        assert_eq!(config.loyalty_earn_unit().cents(), 1000);
        assert_eq!(config.receipt_prefix, "INV");
        assert_eq!(config.cas_max_attempts, 8);
    }

    #[test]
    fn test_overrides() {
        let config = SalesConfig::from_lookup(lookup(&[
            (ENV_DISCOUNT_THRESHOLD, "1500"),
            (ENV_RECEIPT_PREFIX, " RCP "),
            (ENV_CAS_ATTEMPTS, "3"),
        ]))
        .unwrap();

        assert_eq!(config.discount_approval_threshold_bps, 1500);
        assert_eq!(config.receipt_prefix, "RCP");
        assert_eq!(config.cas_max_attempts, 3);
        assert_eq!(config.loyalty_earn_unit_cents, 1000);
    }

    #[test]
    fn test_unparseable_value_is_an_error() {
        let err = SalesConfig::from_lookup(lookup(&[(ENV_EARN_UNIT, "ten")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: ENV_EARN_UNIT.to_string(),
                value: "ten".to_string()
            }
        );
    }

    #[test]
    fn test_validation() {
        assert!(SalesConfig::from_lookup(lookup(&[(ENV_CAS_ATTEMPTS, "0")])).is_err());
        assert!(SalesConfig::from_lookup(lookup(&[(ENV_EARN_UNIT, "0")])).is_err());
        assert!(SalesConfig::from_lookup(lookup(&[(ENV_DISCOUNT_THRESHOLD, "20000")])).is_err());
        assert!(SalesConfig::from_lookup(lookup(&[(ENV_RECEIPT_PREFIX, "  ")])).is_err());
    }
}
