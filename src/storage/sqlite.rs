//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the `RunStore` trait,
//! plus saved-lead management.

use crate::model::{AnalysisRecord, CallerId, Run, SearchRegion};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Lead, RunId, RunStore, StorageError, StorageResult, StoredRun};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const RUN_COLUMNS: &str =
    "id, caller, keyword, region, records, warnings, completed_at, config_hash";

const LEAD_COLUMNS: &str = "id, caller, url, business_name, run_id, created_at";

/// SQLite storage backend
///
/// `RunStore` calls run on the blocking thread pool; the connection is shared
/// with those tasks behind a mutex.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    config_hash: Option<String>,
}

/// Raw `runs` row before JSON and timestamp decoding
struct RunRow {
    id: i64,
    caller: String,
    keyword: String,
    region: String,
    records: String,
    warnings: String,
    completed_at: String,
    config_hash: Option<String>,
}

impl RunRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            caller: row.get(1)?,
            keyword: row.get(2)?,
            region: row.get(3)?,
            records: row.get(4)?,
            warnings: row.get(5)?,
            completed_at: row.get(6)?,
            config_hash: row.get(7)?,
        })
    }

    fn decode(self) -> StorageResult<StoredRun> {
        Ok(StoredRun {
            id: self.id,
            caller: parse_caller(&self.caller)?,
            keyword: self.keyword,
            region: self
                .region
                .parse::<SearchRegion>()
                .map_err(StorageError::InvalidData)?,
            records: serde_json::from_str(&self.records)?,
            warnings: serde_json::from_str(&self.warnings)?,
            completed_at: parse_timestamp(&self.completed_at)?,
            config_hash: self.config_hash,
        })
    }
}

impl SqliteStore {
    /// Opens (or creates) the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config_hash: None,
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config_hash: None,
        })
    }

    /// Tags every run saved from now on with `hash`
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `op` against the connection on the blocking thread pool
    async fn blocking<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            op(&conn)
        })
        .await
        .map_err(|e| StorageError::Database(format!("storage task failed: {}", e)))?
    }

    // ===== Lead Management =====

    /// Saves `record` as a lead for `caller`
    ///
    /// # Returns
    ///
    /// The id of the new lead
    pub fn save_lead(
        &self,
        caller: &CallerId,
        record: &AnalysisRecord,
        run_id: Option<RunId>,
    ) -> StorageResult<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO leads (caller, url, business_name, run_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                caller.as_str(),
                record.url,
                record.business_name,
                run_id,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Lists a caller's leads, newest first
    pub fn list_leads(&self, caller: &CallerId) -> StorageResult<Vec<Lead>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM leads WHERE caller = ?1 ORDER BY created_at DESC, id DESC",
            LEAD_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![caller.as_str()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, caller, url, business_name, run_id, created_at)| {
                Ok(Lead {
                    id,
                    caller: parse_caller(&caller)?,
                    url,
                    business_name,
                    run_id,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    /// Deletes one lead
    pub fn delete_lead(&self, id: i64) -> StorageResult<()> {
        let deleted = self
            .conn()
            .execute("DELETE FROM leads WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StorageError::LeadNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl RunStore for SqliteStore {
    async fn save_run(&self, run: &Run) -> StorageResult<RunId> {
        let row = NewRun::encode(run, self.config_hash.clone())?;
        let id = self.blocking(move |conn| insert_run(conn, row)).await?;
        tracing::debug!(run_id = id, records = run.records.len(), "Run saved");
        Ok(id)
    }

    async fn list_runs(&self, caller: &CallerId) -> StorageResult<Vec<StoredRun>> {
        let caller = caller.as_str().to_string();
        self.blocking(move |conn| select_runs(conn, &caller)).await
    }

    async fn get_run(&self, id: RunId) -> StorageResult<StoredRun> {
        self.blocking(move |conn| select_run(conn, id)).await
    }

    async fn delete_run(&self, id: RunId) -> StorageResult<()> {
        self.blocking(move |conn| remove_run(conn, id)).await
    }
}

/// Owned column values for one `runs` insert
struct NewRun {
    caller: String,
    keyword: String,
    region: &'static str,
    records: String,
    warnings: String,
    completed_at: String,
    config_hash: Option<String>,
}

impl NewRun {
    fn encode(run: &Run, config_hash: Option<String>) -> StorageResult<Self> {
        Ok(Self {
            caller: run.caller.as_str().to_string(),
            keyword: run.keyword.clone(),
            region: run.region.suffix(),
            records: serde_json::to_string(&run.records)?,
            warnings: serde_json::to_string(&run.warnings)?,
            completed_at: format_timestamp(run.completed_at),
            config_hash,
        })
    }
}

// ===== Run Management =====

fn insert_run(conn: &Connection, run: NewRun) -> StorageResult<RunId> {
    conn.execute(
        "INSERT INTO runs (caller, keyword, region, records, warnings, completed_at, config_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            run.caller,
            run.keyword,
            run.region,
            run.records,
            run.warnings,
            run.completed_at,
            run.config_hash,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn select_runs(conn: &Connection, caller: &str) -> StorageResult<Vec<StoredRun>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM runs WHERE caller = ?1 ORDER BY completed_at DESC, id DESC",
        RUN_COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![caller], RunRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(RunRow::decode).collect()
}

fn select_run(conn: &Connection, id: RunId) -> StorageResult<StoredRun> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
            params![id],
            RunRow::from_row,
        )
        .optional()?;

    row.ok_or(StorageError::RunNotFound(id))?.decode()
}

fn remove_run(conn: &Connection, id: RunId) -> StorageResult<()> {
    let deleted = conn.execute("DELETE FROM runs WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(StorageError::RunNotFound(id));
    }
    Ok(())
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("bad timestamp '{}': {}", s, e)))
}

fn parse_caller(s: &str) -> StorageResult<CallerId> {
    CallerId::new(s).ok_or_else(|| StorageError::InvalidData("empty caller id".to_string()))
}
