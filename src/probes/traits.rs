//! Collaborator traits and error types
//!
//! The pipeline only depends on these contracts. HTTP implementations live in
//! the sibling modules; tests substitute scripted fakes.

use crate::model::SearchRegion;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by an external lookup
///
/// The `Display` text is what lands in `AnalysisRecord::error_message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Upstream(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Upstream("Request timeout".to_string())
        } else if e.is_connect() {
            Self::Upstream("Connection refused".to_string())
        } else {
            Self::Upstream(e.to_string())
        }
    }
}

/// Result type for probe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// One raw search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPage {
    pub items: Vec<SearchHit>,

    /// False once the source has run dry
    pub page_had_full_results: bool,
}

/// Performance numbers for one URL, already normalized
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageMetrics {
    pub load_time_seconds: f64,
    pub lcp_seconds: f64,
    pub cls: f64,
    pub fid_millis: u32,
    pub performance_score: f64,
    pub seo_score: f64,
    pub accessibility_score: f64,
}

/// Technology fingerprint for one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fingerprint {
    pub is_word_press: bool,
}

/// Paged keyword search
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Fetches up to `page_size` hits starting at the 1-based `start_offset`
    async fn fetch_page(
        &self,
        keyword: &str,
        region: SearchRegion,
        start_offset: u32,
        page_size: u32,
    ) -> ProbeResult<SearchPage>;
}

/// Performance/quality metrics lookup
#[async_trait]
pub trait MetricsProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult<PageMetrics>;
}

/// Technology detection lookup
#[async_trait]
pub trait FingerprintProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult<Fingerprint>;
}
