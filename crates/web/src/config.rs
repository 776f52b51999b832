//! Web server configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use superlists_common::ItemStore;

/// Environment variable overriding the listen address
pub const ENV_WEB_ADDR: &str = "SUPERLISTS_WEB_ADDR";

/// Environment variable overriding the database path. `:memory:` selects an
/// in-memory store.
pub const ENV_DB_PATH: &str = "SUPERLISTS_DB_PATH";

const MEMORY_DB: &str = ":memory:";

/// Web server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// HTTP listen address
    pub listen: SocketAddr,

    /// SQLite database file
    pub db_path: PathBuf,

    /// Keep everything in memory and ignore `db_path`
    pub in_memory: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8000)),
            db_path: superlists_common::default_db_path(),
            in_memory: false,
        }
    }
}

impl WebConfig {
    /// Load configuration from file, falling back to defaults when it does
    /// not exist
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(self) -> anyhow::Result<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` in place of the process environment
    pub fn apply_env_from<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(ENV_WEB_ADDR).filter(|v| !v.trim().is_empty()) {
            self.listen = addr
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid {}={:?}: {}", ENV_WEB_ADDR, addr, e))?;
        }

        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            if path.trim() == MEMORY_DB {
                self.in_memory = true;
            } else {
                self.db_path = PathBuf::from(path.trim());
                self.in_memory = false;
            }
        }

        Ok(self)
    }

    /// Open the item store this configuration describes
    pub fn open_store(&self) -> superlists_common::Result<ItemStore> {
        if self.in_memory {
            ItemStore::open_memory()
        } else {
            ItemStore::open(&self.db_path)
        }
    }
}
