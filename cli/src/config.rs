//! Node configuration file
//!
//! ```toml
//! data_dir = "$HOME/.kudos/ledger"
//! log_level = "info"
//!
//! [ledger]
//! monthly_give_limit = 100
//! grant_amount_per_cycle = 50
//! ```

use anyhow::{Context, Result};
use kudos_core::LedgerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "$HOME/.kudos/ledger";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub data_dir: String,
    pub log_level: String,
    pub ledger: LedgerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: NodeConfig = toml::from_str(contents).context("invalid config file")?;
        config.ledger.validate()?;
        Ok(config)
    }

    /// Read `path`. A missing file yields the defaults; a malformed one is
    /// an error.
    pub fn load(path: &Path) -> Result<(Self, bool)> {
        if !path.exists() {
            return Ok((Self::default(), false));
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok((Self::from_toml(&contents)?, true))
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(expand_path(&self.data_dir))
    }
}

pub fn expand_path(path: &str) -> String {
    path.replace("$HOME", &std::env::var("HOME").unwrap_or_default())
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from(expand_path("$HOME/.kudos/config.toml"))
}
