// Runtime configuration
//
// Loaded once at startup and handed by reference to whatever needs it.
// A missing file falls back to Config::default().

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::SplitPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/ledger.toml";
pub const CONFIG_ENV_VAR: &str = "LEDGER_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub db: DbConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
    /// "prod" selects the production database, anything else the dev one
    pub env: String,
    pub cors_origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub path: PathBuf,
    pub path_dev: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub split: SplitPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            env: "dev".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ledger.db"),
            path_dev: PathBuf::from("ledger-dev.db"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Config::default());
        }
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Config::from_toml(&s).with_context(|| format!("parse {}", path.display()))
    }

    pub fn from_toml(s: &str) -> Result<Config> {
        let cfg: Config = toml::from_str(s)?;
        Ok(cfg)
    }

    /// Resolve the config file: explicit argument, then $LEDGER_CONFIG, then the default path
    pub fn resolve_path(explicit: Option<&str>) -> PathBuf {
        explicit
            .map(PathBuf::from)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn is_prod(&self) -> bool {
        self.api.env == "prod"
    }

    pub fn database_path(&self) -> &Path {
        if self.is_prod() {
            &self.db.path
        } else {
            &self.db.path_dev
        }
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.api.port)
    }
}
