//! Ledger configuration
//!
//! Sources, lowest to highest priority:
//!
//! 1. Defaults (20% partner share, 30 day risk window, 10000 high-debt
//!    threshold, 450-unit intake chunks)
//! 2. TOML file passed with `--config`
//! 3. Environment variables (`LEDGER_PARTNER_SHARE_RATE`,
//!    `LEDGER_RISK_WINDOW_DAYS`, `LEDGER_HIGH_DEBT_THRESHOLD`,
//!    `LEDGER_INTAKE_CHUNK_SIZE`)
//! 4. Command-line flags, applied by the binary
//!
//! ```toml
//! partner_share_rate = "0.20"
//! risk_window_days = 30
//! high_debt_threshold = 10000
//! intake_chunk_size = 450
//!
//! [store]
//! max_attempts = 5
//! max_writes_per_commit = 500
//! ```

use crate::types::{Amount, LedgerError, ShareRate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub const ENV_PARTNER_SHARE_RATE: &str = "LEDGER_PARTNER_SHARE_RATE";
pub const ENV_RISK_WINDOW_DAYS: &str = "LEDGER_RISK_WINDOW_DAYS";
pub const ENV_HIGH_DEBT_THRESHOLD: &str = "LEDGER_HIGH_DEBT_THRESHOLD";
pub const ENV_INTAKE_CHUNK_SIZE: &str = "LEDGER_INTAKE_CHUNK_SIZE";

/// Limits of the underlying document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// How many times a conflicting transaction body is run before giving up
    pub max_attempts: u32,

    /// Upper bound on documents written by a single commit
    pub max_writes_per_commit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            max_attempts: 5,
            max_writes_per_commit: 500,
        }
    }
}

/// Business parameters of the ledger engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub partner_share_rate: ShareRate,

    /// A customer with an open balance and no activity for longer than this
    /// is flagged at risk
    pub risk_window_days: i64,

    /// Balances above this are flagged high debt
    pub high_debt_threshold: Amount,

    /// Units per stock intake commit
    pub intake_chunk_size: usize,

    pub store: StoreConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            partner_share_rate: ShareRate::DEFAULT,
            risk_window_days: 30,
            high_debt_threshold: 10_000,
            intake_chunk_size: 450,
            store: StoreConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Load defaults, then the optional TOML file, then the environment
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Config` if the file cannot be read or parsed, an
    /// environment value does not parse, or the result fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, LedgerError> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "loading ledger config");
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    LedgerError::config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&contents)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, LedgerError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), LedgerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_PARTNER_SHARE_RATE) {
            debug!(rate = %value, "overriding partner share rate from environment");
            self.partner_share_rate = ShareRate::from_str(&value)
                .map_err(|e| LedgerError::config(format!("{}: {}", ENV_PARTNER_SHARE_RATE, e)))?;
        }
        if let Some(value) = lookup(ENV_RISK_WINDOW_DAYS) {
            self.risk_window_days = parse_env(ENV_RISK_WINDOW_DAYS, &value)?;
        }
        if let Some(value) = lookup(ENV_HIGH_DEBT_THRESHOLD) {
            self.high_debt_threshold = parse_env(ENV_HIGH_DEBT_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_INTAKE_CHUNK_SIZE) {
            self.intake_chunk_size = parse_env(ENV_INTAKE_CHUNK_SIZE, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.risk_window_days <= 0 {
            return Err(LedgerError::config("risk_window_days must be positive"));
        }
        if self.high_debt_threshold < 0 {
            return Err(LedgerError::config("high_debt_threshold must not be negative"));
        }
        if self.intake_chunk_size == 0 {
            return Err(LedgerError::config("intake_chunk_size must be positive"));
        }
        if self.store.max_attempts == 0 {
            return Err(LedgerError::config("store.max_attempts must be positive"));
        }
        if self.store.max_writes_per_commit == 0 {
            return Err(LedgerError::config("store.max_writes_per_commit must be positive"));
        }
        if self.intake_chunk_size > self.store.max_writes_per_commit {
            return Err(LedgerError::config(format!(
                "intake_chunk_size {} exceeds store.max_writes_per_commit {}",
                self.intake_chunk_size, self.store.max_writes_per_commit
            )));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, LedgerError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| LedgerError::config(format!("{}={}: {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.partner_share_rate, ShareRate::DEFAULT);
        assert_eq!(config.intake_chunk_size, 450);
        assert_eq!(config.store.max_writes_per_commit, 500);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = LedgerConfig::from_toml(
            r#"
            partner_share_rate = "0.25"
            risk_window_days = 45

            [store]
            max_attempts = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.partner_share_rate.to_string(), "0.25");
        assert_eq!(config.risk_window_days, 45);
        assert_eq!(config.high_debt_threshold, 10_000);
        assert_eq!(config.store.max_attempts, 8);
        assert_eq!(config.store.max_writes_per_commit, 500);
    }

    #[test]
    fn test_unknown_toml_key_is_rejected() {
        let result = LedgerConfig::from_toml("partner_rate = 0.3");
        assert!(matches!(result, Err(LedgerError::Config { .. })));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = LedgerConfig::from_toml("risk_window_days = 45").unwrap();
        config
            .apply_env_overrides(env(&[
                (ENV_RISK_WINDOW_DAYS, "10"),
                (ENV_PARTNER_SHARE_RATE, "0.5"),
            ]))
            .unwrap();
        assert_eq!(config.risk_window_days, 10);
        assert_eq!(config.partner_share_rate.to_string(), "0.5");
    }

    #[rstest]
    #[case::rate_out_of_range(ENV_PARTNER_SHARE_RATE, "1.5")]
    #[case::not_a_number(ENV_HIGH_DEBT_THRESHOLD, "lots")]
    #[case::negative_chunk(ENV_INTAKE_CHUNK_SIZE, "-1")]
    fn test_bad_env_value(#[case] key: &str, #[case] value: &str) {
        let mut config = LedgerConfig::default();
        let result = config.apply_env_overrides(env(&[(key, value)]));
        assert!(matches!(result, Err(LedgerError::Config { .. })));
    }

    #[test]
    fn test_chunk_larger_than_write_limit_is_invalid() {
        let config = LedgerConfig {
            intake_chunk_size: 600,
            ..LedgerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "high_debt_threshold = 5000").unwrap();
        let config = LedgerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.high_debt_threshold, 5000);
    }
}
