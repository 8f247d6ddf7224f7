use crate::model::{AnalysisRecord, Candidate, RecordStatus};
use crate::pipeline::{bounded_call, RateLimiter, FINGERPRINT_QUOTA_KEY, PAGESPEED_QUOTA_KEY};
use crate::probes::{FingerprintProbe, MetricsProbe, PageMetrics};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Error text recorded when the metrics quota denies a candidate
pub const QUOTA_EXCEEDED_MESSAGE: &str = "quota exceeded";

/// Audits a single candidate
///
/// `analyze` never fails: whatever goes wrong is written onto the returned
/// record so the batch can carry on.
pub struct ItemAnalyzer {
    metrics: Arc<dyn MetricsProbe>,
    fingerprint: Arc<dyn FingerprintProbe>,
    limiter: Arc<RateLimiter>,
    pagespeed_limit: u32,
    fingerprint_limit: u32,
    call_timeout: Duration,
}

impl ItemAnalyzer {
    pub fn new(
        metrics: Arc<dyn MetricsProbe>,
        fingerprint: Arc<dyn FingerprintProbe>,
        limiter: Arc<RateLimiter>,
        pagespeed_limit: u32,
        fingerprint_limit: u32,
        call_timeout: Duration,
    ) -> Self {
        Self {
            metrics,
            fingerprint,
            limiter,
            pagespeed_limit,
            fingerprint_limit,
            call_timeout,
        }
    }

    /// Produces exactly one record for `candidate`
    ///
    /// 1. Metrics quota denied: error record, nothing else runs
    /// 2. Metrics probe fails: error record with the probe's message,
    ///    fingerprint skipped
    /// 3. Fingerprint probe runs; its failure (or a denied fingerprint quota)
    ///    only means `is_word_press = false`
    pub async fn analyze(&self, candidate: &Candidate, cancel: &CancellationToken) -> AnalysisRecord {
        if !self
            .limiter
            .try_acquire(PAGESPEED_QUOTA_KEY, self.pagespeed_limit)
        {
            tracing::warn!(url = %candidate.url, rank = candidate.rank, "Metrics quota denied");
            return AnalysisRecord::failed(candidate, QUOTA_EXCEEDED_MESSAGE);
        }

        let metrics = match bounded_call(cancel, self.call_timeout, self.metrics.probe(&candidate.url)).await {
            Ok(metrics) => metrics,
            Err(e) => {
                tracing::warn!(url = %candidate.url, rank = candidate.rank, error = %e, "Metrics probe failed");
                return AnalysisRecord::failed(candidate, e.to_string());
            }
        };

        let is_word_press = self.detect_word_press(candidate, cancel).await;

        success_record(candidate, metrics, is_word_press)
    }

    async fn detect_word_press(&self, candidate: &Candidate, cancel: &CancellationToken) -> bool {
        if !self
            .limiter
            .try_acquire(FINGERPRINT_QUOTA_KEY, self.fingerprint_limit)
        {
            tracing::warn!(url = %candidate.url, "Fingerprint quota denied, assuming not WordPress");
            return false;
        }

        match bounded_call(cancel, self.call_timeout, self.fingerprint.probe(&candidate.url)).await {
            Ok(fingerprint) => fingerprint.is_word_press,
            Err(e) => {
                tracing::debug!(url = %candidate.url, error = %e, "Fingerprint probe failed");
                false
            }
        }
    }
}

fn success_record(candidate: &Candidate, metrics: PageMetrics, is_word_press: bool) -> AnalysisRecord {
    AnalysisRecord {
        url: candidate.url.clone(),
        business_name: candidate.title.clone(),
        rank: candidate.rank,
        page_load_time: non_negative(metrics.load_time_seconds),
        lcp: non_negative(metrics.lcp_seconds),
        cls: non_negative(metrics.cls),
        fid: metrics.fid_millis,
        performance: unit_score(metrics.performance_score),
        seo: unit_score(metrics.seo_score),
        accessibility: unit_score(metrics.accessibility_score),
        is_word_press,
        status: RecordStatus::Success,
        error_message: None,
    }
}

/// Maps NaN and infinities to 0
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn non_negative(value: f64) -> f64 {
    finite_or_zero(value).max(0.0)
}

fn unit_score(value: f64) -> f64 {
    finite_or_zero(value).clamp(0.0, 1.0)
}
