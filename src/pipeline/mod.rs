//! Batch analysis pipeline
//!
//! This module is responsible for:
//! - Gating every outbound call class behind a daily quota (`RateLimiter`)
//! - Paging through search results into a ranked candidate list (`SearchAggregator`)
//! - Auditing one candidate with failures confined to its record (`ItemAnalyzer`)
//! - Driving a whole run and publishing progress (`BatchOrchestrator`)
//!
//! Data flows strictly downward: the orchestrator calls the aggregator and the
//! analyzer, and both of those consult the limiter before every external call.

mod aggregator;
mod analyzer;
mod limiter;
mod orchestrator;

pub use aggregator::{SearchAggregator, SearchOutcome};
pub use analyzer::ItemAnalyzer;
pub use limiter::RateLimiter;
pub use orchestrator::{BatchOrchestrator, OrchestratorSettings};

use crate::probes::{ProbeError, ProbeResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Quota key consumed once per search page request
pub const SEARCH_QUOTA_KEY: &str = "search";

/// Quota key consumed once per metrics probe
pub const PAGESPEED_QUOTA_KEY: &str = "pagespeed";

/// Quota key consumed once per fingerprint probe
pub const FINGERPRINT_QUOTA_KEY: &str = "fingerprint";

/// Awaits an external call, bounded by `limit` and abandoned on cancellation
///
/// Expiry is reported as `ProbeError::Timeout` so callers treat it exactly
/// like the call failing.
pub(crate) async fn bounded_call<T, F>(
    cancel: &CancellationToken,
    limit: Duration,
    call: F,
) -> ProbeResult<T>
where
    F: Future<Output = ProbeResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProbeError::Cancelled),
        result = tokio::time::timeout(limit, call) => {
            result.unwrap_or(Err(ProbeError::Timeout(limit)))
        }
    }
}
