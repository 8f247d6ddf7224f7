use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable holding the Google API key
pub const API_KEY_ENV: &str = "SITESCOUT_GOOGLE_API_KEY";

/// Environment variable holding the programmable search engine id
pub const ENGINE_ID_ENV: &str = "SITESCOUT_SEARCH_ENGINE_ID";

/// Loads and parses a configuration file from the given path
///
/// Credentials missing from the file are filled from the environment
/// (`SITESCOUT_GOOGLE_API_KEY`, `SITESCOUT_SEARCH_ENGINE_ID`).
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sitescout::config::load_config;
///
/// let config = load_config(Path::new("sitescout.toml")).unwrap();
/// println!("Max results: {}", config.search.max_results);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Fills credentials that the file leaves empty from `lookup`
///
/// Values present in the file win over the environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let is_blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());

    if is_blank(&config.search.api_key) {
        if let Some(key) = lookup(API_KEY_ENV) {
            tracing::debug!("Using search API key from {}", API_KEY_ENV);
            config.search.api_key = Some(key);
        }
    }

    if is_blank(&config.search.engine_id) {
        if let Some(id) = lookup(ENGINE_ID_ENV) {
            tracing::debug!("Using search engine id from {}", ENGINE_ID_ENV);
            config.search.engine_id = Some(id);
        }
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stored alongside every persisted run so results can be traced back to the
/// quotas and endpoints that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
