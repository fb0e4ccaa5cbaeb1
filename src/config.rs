//! Storage configuration, read from `BANK_*` environment variables
use std::path::PathBuf;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankConfig {
    pub db_path: PathBuf,
    /// Delete the database when the store is dropped.
    pub temporary: bool,
    /// Background flush interval. `None` disables it.
    pub flush_every_ms: Option<u64>,
    /// Flush to disk after every write before reporting success.
    pub sync_writes: bool,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("bank.db"),
            temporary: false,
            flush_every_ms: Some(500),
            sync_writes: false,
        }
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

impl BankConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup, falling back to defaults for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("BANK_DB_PATH") {
            if path.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "BANK_DB_PATH".into(),
                    message: "path cannot be empty".into(),
                });
            }
            config.db_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("BANK_DB_TEMPORARY") {
            config.temporary = parse("BANK_DB_TEMPORARY", &raw)?;
        }
        if let Some(raw) = lookup("BANK_FLUSH_EVERY_MS") {
            let ms: u64 = parse("BANK_FLUSH_EVERY_MS", &raw)?;
            config.flush_every_ms = (ms > 0).then_some(ms);
        }
        if let Some(raw) = lookup("BANK_SYNC_WRITES") {
            config.sync_writes = parse("BANK_SYNC_WRITES", &raw)?;
        }

        Ok(config)
    }

    pub fn session_from_env() -> Result<Self, ConfigError> {
        Self::session_from_lookup(|key| std::env::var(key).ok())
    }

    /// Config for the console session. Unless `BANK_DB_PATH` names a
    /// database, the session runs on a temporary one under the system temp
    /// dir, so it never touches an existing ledger.
    pub fn session_from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit_path = lookup("BANK_DB_PATH").is_some();
        let mut config = Self::from_lookup(&lookup)?;

        if !explicit_path {
            config.db_path =
                std::env::temp_dir().join(format!("bank-ledger-session-{}", std::process::id()));
            config.temporary = true;
        }

        Ok(config)
    }

    pub fn sled_config(&self) -> sled::Config {
        sled::Config::new()
            .path(&self.db_path)
            .temporary(self.temporary)
            .flush_every_ms(self.flush_every_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_keys_use_defaults() {
        let config = BankConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, BankConfig::default());
    }

    #[test]
    fn reads_every_key() {
        let config = BankConfig::from_lookup(lookup_from(&[
            ("BANK_DB_PATH", "/tmp/ledger"),
            ("BANK_DB_TEMPORARY", "true"),
            ("BANK_FLUSH_EVERY_MS", "0"),
            ("BANK_SYNC_WRITES", "true"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/ledger"));
        assert!(config.temporary);
        assert_eq!(config.flush_every_ms, None);
        assert!(config.sync_writes);
    }

    #[test]
    fn session_defaults_to_a_temporary_database_away_from_the_ledger() {
        let config = BankConfig::session_from_lookup(lookup_from(&[])).unwrap();

        assert!(config.temporary);
        assert!(config.db_path.starts_with(std::env::temp_dir()));
        assert_ne!(config.db_path, BankConfig::default().db_path);
    }

    #[test]
    fn session_honours_an_explicit_database() {
        let config = BankConfig::session_from_lookup(lookup_from(&[
            ("BANK_DB_PATH", "/tmp/ledger"),
            ("BANK_SYNC_WRITES", "true"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/ledger"));
        assert!(!config.temporary);
        assert!(config.sync_writes);
    }

    #[test]
    fn rejects_malformed_values() {
        let err = BankConfig::from_lookup(lookup_from(&[("BANK_FLUSH_EVERY_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "BANK_FLUSH_EVERY_MS"));

        let err = BankConfig::from_lookup(lookup_from(&[("BANK_DB_PATH", " ")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "BANK_DB_PATH"));
    }
}
