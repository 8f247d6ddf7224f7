//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Sitescout database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Completed analysis runs; records are stored as a JSON array in rank order
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    caller TEXT NOT NULL,
    keyword TEXT NOT NULL,
    region TEXT NOT NULL,
    records TEXT NOT NULL,
    warnings TEXT NOT NULL DEFAULT '[]',
    completed_at TEXT NOT NULL,
    config_hash TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_caller ON runs(caller, completed_at);

-- Sites flagged for follow-up
CREATE TABLE IF NOT EXISTS leads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    caller TEXT NOT NULL,
    url TEXT NOT NULL,
    business_name TEXT NOT NULL,
    run_id INTEGER REFERENCES runs(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_leads_caller ON leads(caller, created_at);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - SQLite connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
