//! Web service settings from the environment and the command line.

use crate::cache::DEFAULT_TTL;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_STORE_PATH: &str = "database/procesos.bin.gz";
const DEFAULT_WORKSHEET: &str = "Procesos_Graphy";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number of seconds, got '{value}'")]
    InvalidTtl { name: &'static str, value: String },
}

/// Runtime settings for the web service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Gzip file holding the worksheet
    pub store_path: PathBuf,
    /// Title recorded when a new worksheet file is created
    pub worksheet: String,
    pub cache_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            worksheet: DEFAULT_WORKSHEET.to_string(),
            cache_ttl: DEFAULT_TTL,
        }
    }
}

impl AppConfig {
    /// Read `LAB_BIND_ADDR`, `LAB_STORE_PATH`, `LAB_WORKSHEET` and
    /// `LAB_CACHE_TTL_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();
        if let Some(addr) = lookup("LAB_BIND_ADDR").filter(|v| !v.trim().is_empty()) {
            config.bind_addr = addr.trim().to_string();
        }
        if let Some(path) = lookup("LAB_STORE_PATH").filter(|v| !v.trim().is_empty()) {
            config.store_path = PathBuf::from(path.trim());
        }
        if let Some(name) = lookup("LAB_WORKSHEET").filter(|v| !v.trim().is_empty()) {
            config.worksheet = name.trim().to_string();
        }
        if let Some(ttl) = lookup("LAB_CACHE_TTL_SECS") {
            let secs = ttl.trim().parse::<u64>().map_err(|_| ConfigError::InvalidTtl {
                name: "LAB_CACHE_TTL_SECS",
                value: ttl.clone(),
            })?;
            config.cache_ttl = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Command line overrides: `website [bind_addr] [store_path]`.
    pub fn with_args(mut self, args: &[String]) -> Self {
        if let Some(addr) = args.get(1) {
            self.bind_addr = addr.clone();
        }
        if let Some(path) = args.get(2) {
            self.store_path = PathBuf::from(path);
        }
        self
    }
}
