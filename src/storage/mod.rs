//! Storage module for persisting completed runs
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Saving, listing, loading and deleting analysis runs
//! - Saved leads

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{Lead, RunId, RunStore, StorageError, StorageResult, StoredRun};

use std::path::Path;

/// Opens the run store at `path`, tagging saved runs with `config_hash`
pub fn open_store(path: &Path, config_hash: &str) -> StorageResult<SqliteStore> {
    Ok(SqliteStore::new(path)?.with_config_hash(config_hash))
}
