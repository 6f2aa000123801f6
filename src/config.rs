//! Runtime configuration, read from the environment.
use std::env;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "student-market.db";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketConfig {
    pub db_path: PathBuf,
    /// Throw the database away when the store is dropped. `db_path` is ignored.
    pub temporary: bool,
    pub log_filter: String,
    /// Flush to disk after every committed write instead of relying on sled's background flush.
    pub flush_on_write: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            temporary: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            flush_on_write: false,
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

impl MarketConfig {
    /// Reads `MARKET_DB_PATH`, `MARKET_DB_TEMPORARY`, `MARKET_LOG` and `MARKET_FLUSH`,
    /// falling back to the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            db_path: env::var("MARKET_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            temporary: env_bool("MARKET_DB_TEMPORARY", defaults.temporary),
            log_filter: env::var("MARKET_LOG").unwrap_or(defaults.log_filter),
            flush_on_write: env_bool("MARKET_FLUSH", defaults.flush_on_write),
        }
    }

    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Self::default()
        }
    }

    /// Temporary databases ignore `db_path`; sled picks a fresh location for each one.
    pub fn sled_config(&self) -> sled::Config {
        if self.temporary {
            return sled::Config::new().temporary(true);
        }
        sled::Config::new().path(&self.db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_values() {
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn temporary_keeps_other_defaults() {
        let config = MarketConfig::temporary();
        assert!(config.temporary);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(!config.flush_on_write);
    }
}
