use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::gate::GateMode;
use crate::tracker::DEFAULT_DAILY_LIMIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Sqlite => f.write_str("sqlite"),
            StoreKind::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreKind::Sqlite),
            "memory" | "in-memory" => Ok(StoreKind::Memory),
            other => anyhow::bail!("unknown store kind {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuotaTrackerConfig {
    pub server_host: String,
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub store: StoreKind,
    pub daily_limit: u64,
    pub gate_mode: GateMode,
    pub request_timeout_secs: u64,
    pub log_level: String,
}

impl Default for QuotaTrackerConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 8183,
            data_dir: PathBuf::from("data/quota"),
            store: StoreKind::Sqlite,
            daily_limit: DEFAULT_DAILY_LIMIT,
            gate_mode: GateMode::AtomicClaim,
            request_timeout_secs: 30,
            log_level: "info".to_string(),
        }
    }
}

impl QuotaTrackerConfig {
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(host) = env::var("QUOTA_HOST") {
            cfg.server_host = host;
        }
        if let Ok(port) = env::var("QUOTA_PORT") {
            cfg.server_port = port.parse().context("QUOTA_PORT must be a valid u16")?;
        }
        if let Ok(dir) = env::var("QUOTA_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(store) = env::var("QUOTA_STORE") {
            cfg.store = store
                .parse()
                .with_context(|| format!("QUOTA_STORE is invalid: {store}"))?;
        }
        if let Ok(limit) = env::var("QUOTA_DAILY_LIMIT") {
            cfg.daily_limit = limit
                .parse()
                .context("QUOTA_DAILY_LIMIT must be a positive integer")?;
        }
        if let Ok(mode) = env::var("QUOTA_GATE_MODE") {
            cfg.gate_mode = mode
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("QUOTA_GATE_MODE is invalid: {mode}"))?;
        }
        if let Ok(timeout) = env::var("REQUEST_TIMEOUT_SECS") {
            cfg.request_timeout_secs = timeout
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a positive integer")?;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            cfg.log_level = level;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store == StoreKind::Sqlite {
            ensure_directory(&self.data_dir)?;
        }

        if self.daily_limit == 0 {
            anyhow::bail!("QUOTA_DAILY_LIMIT must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        Ok(())
    }
}

fn ensure_directory(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("{} exists but is not a directory", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("unable to create data directory {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_free_tier() {
        let config = QuotaTrackerConfig::default();
        assert_eq!(config.daily_limit, 15);
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.gate_mode, GateMode::AtomicClaim);
    }

    #[test]
    fn test_store_kind_from_str() {
        assert_eq!("SQLite".parse::<StoreKind>().unwrap(), StoreKind::Sqlite);
        assert_eq!("memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert!("postgres".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_config_validation() {
        let temp = tempdir().expect("failed to create temp dir");
        let mut config = QuotaTrackerConfig {
            data_dir: temp.path().join("quota"),
            ..QuotaTrackerConfig::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.data_dir.is_dir());

        config.daily_limit = 0;
        assert!(config.validate().is_err());

        config.daily_limit = 15;
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_file_as_data_dir() {
        let temp = tempdir().expect("failed to create temp dir");
        let file = temp.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();

        let config = QuotaTrackerConfig {
            data_dir: file,
            ..QuotaTrackerConfig::default()
        };
        assert!(config.validate().is_err());

        let in_memory = QuotaTrackerConfig {
            store: StoreKind::Memory,
            ..config
        };
        assert!(in_memory.validate().is_ok());
    }
}
