//! Sitescout: keyword-driven website auditing
//!
//! This crate collects the websites that rank for a search keyword and audits each one:
//! page-speed metrics, Lighthouse category scores, and whether the site runs WordPress.
//! Every outbound API class is gated by a daily quota so a run degrades predictably
//! instead of failing half-way through.

pub mod config;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod probes;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sitescout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Analysis run failed: {0}")]
    Run(#[from] RunError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run-level abort conditions
///
/// Only these end a run in the `error` state. Everything that goes wrong for a
/// single candidate is captured on its record instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Daily API quota exceeded for '{key}'. Please try again tomorrow.")]
    QuotaExceeded { key: String },

    #[error("No results found. Please try a different search term.")]
    NoResults,

    #[error("Search API rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("Search request failed: {0}")]
    Upstream(String),

    #[error("Run cancelled")]
    Cancelled,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing credential: {0}. Add it to the config file or the environment.")]
    MissingCredential(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Sitescout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{AnalysisRecord, CallerId, Candidate, RecordStatus, Run, SearchRegion};
pub use pipeline::{BatchOrchestrator, ItemAnalyzer, RateLimiter, SearchAggregator};
pub use state::{ProgressState, RunStatus};
