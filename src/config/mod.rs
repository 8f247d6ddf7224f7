//! Configuration module for Sitescout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sitescout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitescout.toml")).unwrap();
//! println!("Search quota: {}/day", config.limits.search_queries_per_day);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FingerprintConfig, LimitsConfig, OutputConfig, PageSpeedConfig, PipelineConfig,
    SearchConfig, GOOGLE_APIS_ENDPOINT,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash, parse_config,
    API_KEY_ENV, ENGINE_ID_ENV,
};
