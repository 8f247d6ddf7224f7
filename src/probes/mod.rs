//! External lookups used by the pipeline
//!
//! This module is responsible for:
//! - Defining the collaborator contracts the pipeline consumes
//! - Querying the Custom Search API for candidate sites
//! - Running PageSpeed Insights audits
//! - Detecting WordPress from page HTML

mod http;
mod pagespeed;
mod search;
mod traits;
mod wordpress;

pub use http::build_http_client;
pub use pagespeed::PageSpeedClient;
pub use search::GoogleSearchClient;
pub use traits::{
    Fingerprint, FingerprintProbe, MetricsProbe, PageMetrics, ProbeError, ProbeResult,
    SearchHit, SearchPage, SearchSource,
};
pub use wordpress::{count_html_indicators, WordPressDetector, WORDPRESS_THRESHOLD};
