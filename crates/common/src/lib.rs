//! Superlists Common Library
//!
//! Shared data model and the SQLite-backed item store used by the web
//! server and the functional test harness.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use db::Database;
pub use error::{Error, Result};
pub use store::ItemStore;
pub use types::*;

/// Superlists version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default data directory
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".superlists")
}

/// Default database path
pub fn default_db_path() -> std::path::PathBuf {
    default_store_path().join("db.sqlite3")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
