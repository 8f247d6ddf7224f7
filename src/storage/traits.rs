//! Storage traits and error types
//!
//! The pipeline only needs somewhere to hand a finished run; `RunStore` is
//! that seam. Saved leads are a SQLite-only feature and live on `SqliteStore`.

use crate::model::{AnalysisRecord, CallerId, Run, SearchRegion};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Identifier assigned to a persisted run
pub type RunId = i64;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Lead not found: {0}")]
    LeadNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A run as read back from storage
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRun {
    pub id: RunId,
    pub caller: CallerId,
    pub keyword: String,
    pub region: SearchRegion,
    /// Ordered by rank
    pub records: Vec<AnalysisRecord>,
    pub warnings: Vec<String>,
    pub completed_at: DateTime<Utc>,
    /// Hash of the config file the run was produced with
    pub config_hash: Option<String>,
}

impl StoredRun {
    pub fn into_run(self) -> Run {
        Run {
            caller: self.caller,
            keyword: self.keyword,
            region: self.region,
            records: self.records,
            completed_at: self.completed_at,
            warnings: self.warnings,
            saved_as: Some(self.id),
        }
    }
}

/// A site a caller flagged for follow-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    pub id: i64,
    pub caller: CallerId,
    pub url: String,
    pub business_name: String,
    /// Run the lead came from; cleared when that run is deleted
    pub run_id: Option<RunId>,
    pub created_at: DateTime<Utc>,
}

/// Persistence collaborator for completed runs
///
/// Records must round-trip losslessly. Implementations are shared across
/// tasks, so they must be `Send + Sync`.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persists a completed run and returns its id
    async fn save_run(&self, run: &Run) -> StorageResult<RunId>;

    /// Lists a caller's runs, most recently completed first
    async fn list_runs(&self, caller: &CallerId) -> StorageResult<Vec<StoredRun>>;

    /// Loads one run
    ///
    /// # Errors
    ///
    /// Returns `StorageError::RunNotFound` if no run has this id
    async fn get_run(&self, id: RunId) -> StorageResult<StoredRun>;

    /// Deletes one run
    ///
    /// # Errors
    ///
    /// Returns `StorageError::RunNotFound` if no run has this id
    async fn delete_run(&self, id: RunId) -> StorageResult<()>;
}
