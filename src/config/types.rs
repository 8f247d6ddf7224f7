use serde::Deserialize;

/// Default Google APIs origin shared by the search and PageSpeed endpoints
pub const GOOGLE_APIS_ENDPOINT: &str = "https://www.googleapis.com";

/// Main configuration structure for Sitescout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub pagespeed: PageSpeedConfig,
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
}

/// Custom Search API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SearchConfig {
    /// Google API key (falls back to `SITESCOUT_GOOGLE_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Programmable search engine id (falls back to `SITESCOUT_SEARCH_ENGINE_ID`)
    #[serde(default)]
    pub engine_id: Option<String>,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Results requested per page; the API never returns more than 10
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Number of candidates collected per run
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

/// PageSpeed Insights configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PageSpeedConfig {
    /// Separate key for PageSpeed; the search key is used when absent
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Lighthouse form factor: "mobile" or "desktop"
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

/// WordPress fingerprinting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FingerprintConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Probe `/wp-admin` with a HEAD request as an extra indicator
    #[serde(default = "default_true")]
    pub check_wp_admin: bool,
}

/// Daily quota per outbound API class
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LimitsConfig {
    #[serde(default = "default_search_limit")]
    pub search_queries_per_day: u32,

    #[serde(default = "default_pagespeed_limit")]
    pub pagespeed_queries_per_day: u32,

    #[serde(default = "default_fingerprint_limit")]
    pub fingerprint_checks_per_day: u32,
}

/// Batch pipeline behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineConfig {
    /// Candidates analyzed at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Upper bound for any single external call (seconds)
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            engine_id: None,
            endpoint: default_endpoint(),
            page_size: default_page_size(),
            max_results: default_max_results(),
        }
    }
}

impl Default for PageSpeedConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_endpoint(),
            strategy: default_strategy(),
        }
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            check_wp_admin: true,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            search_queries_per_day: default_search_limit(),
            pagespeed_queries_per_day: default_pagespeed_limit(),
            fingerprint_checks_per_day: default_fingerprint_limit(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    GOOGLE_APIS_ENDPOINT.to_string()
}

fn default_page_size() -> u32 {
    10
}

fn default_max_results() -> u32 {
    50
}

fn default_strategy() -> String {
    "mobile".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_true() -> bool {
    true
}

fn default_search_limit() -> u32 {
    100
}

fn default_pagespeed_limit() -> u32 {
    1000
}

fn default_fingerprint_limit() -> u32 {
    1000
}

fn default_concurrency() -> u32 {
    1
}

fn default_call_timeout() -> u64 {
    60
}

impl Config {
    /// Returns the search API key and engine id, or the first one missing
    pub fn search_credentials(&self) -> Result<(String, String), crate::ConfigError> {
        let api_key = non_empty(&self.search.api_key)
            .ok_or_else(|| crate::ConfigError::MissingCredential("search.api-key".to_string()))?;
        let engine_id = non_empty(&self.search.engine_id).ok_or_else(|| {
            crate::ConfigError::MissingCredential("search.engine-id".to_string())
        })?;
        Ok((api_key, engine_id))
    }

    /// Returns the PageSpeed API key, falling back to the search key
    pub fn pagespeed_key(&self) -> Result<String, crate::ConfigError> {
        non_empty(&self.pagespeed.api_key)
            .or_else(|| non_empty(&self.search.api_key))
            .ok_or_else(|| crate::ConfigError::MissingCredential("pagespeed.api-key".to_string()))
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
