use crate::model::{Candidate, SearchRegion};
use crate::pipeline::{bounded_call, RateLimiter, SEARCH_QUOTA_KEY};
use crate::probes::{ProbeError, SearchPage, SearchSource};
use crate::url::dedupe_key;
use crate::RunError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The search API serves at most this many results for one query
pub const SEARCH_RESULT_CEILING: u32 = 100;

/// Ranked candidates plus any non-fatal page problems
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// Ordered by rank, starting at 1
    pub candidates: Vec<Candidate>,

    /// One entry per page that failed after at least one candidate was collected
    pub warnings: Vec<String>,
}

/// Pages through a search source until enough candidates are collected
///
/// Pages are requested sequentially at start offsets `1, 1 + page_size, ...`
/// and concatenated in request order. Paging stops at the target count, at
/// the first short page, or at `SEARCH_RESULT_CEILING`. Each page consumes
/// one unit of the `search` quota.
pub struct SearchAggregator {
    source: Arc<dyn SearchSource>,
    limiter: Arc<RateLimiter>,
    daily_limit: u32,
    page_size: u32,
    call_timeout: Duration,
}

impl SearchAggregator {
    pub fn new(
        source: Arc<dyn SearchSource>,
        limiter: Arc<RateLimiter>,
        daily_limit: u32,
        page_size: u32,
        call_timeout: Duration,
    ) -> Self {
        Self {
            source,
            limiter,
            daily_limit,
            page_size: page_size.max(1),
            call_timeout,
        }
    }

    /// Collects up to `target_count` unique candidates for `keyword`
    ///
    /// # Errors
    ///
    /// Fails only while nothing has been collected yet:
    /// * `QuotaExceeded` - the first page was denied by the limiter
    /// * `Unauthorized` / `Upstream` - the first page request failed
    /// * `NoResults` - the source had nothing for this keyword
    /// * `Cancelled` - at any point
    ///
    /// A failure on a later page stops paging and keeps what was collected,
    /// with the failure recorded in `SearchOutcome::warnings`.
    pub async fn collect(
        &self,
        keyword: &str,
        region: SearchRegion,
        target_count: u32,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, RunError> {
        let target = target_count as usize;
        // Duplicates dropped along the way are refilled from later pages
        let max_pages = target_count.max(SEARCH_RESULT_CEILING).div_ceil(self.page_size);

        let mut outcome = SearchOutcome::default();
        let mut seen = HashSet::new();

        for page_index in 0..max_pages {
            if outcome.candidates.len() >= target {
                break;
            }
            let start_offset = page_index * self.page_size + 1;

            if !self.limiter.try_acquire(SEARCH_QUOTA_KEY, self.daily_limit) {
                if outcome.candidates.is_empty() {
                    return Err(RunError::QuotaExceeded {
                        key: SEARCH_QUOTA_KEY.to_string(),
                    });
                }
                outcome.warnings.push(format!(
                    "Search quota exhausted before the page starting at result {}; kept {} candidates",
                    start_offset,
                    outcome.candidates.len()
                ));
                break;
            }

            let page = match self.fetch(keyword, region, start_offset, cancel).await {
                Ok(page) => page,
                Err(ProbeError::Cancelled) => return Err(RunError::Cancelled),
                Err(e) if outcome.candidates.is_empty() => {
                    tracing::warn!(keyword, start = start_offset, error = %e, "First search page failed");
                    return Err(match e {
                        ProbeError::Unauthorized(msg) => RunError::Unauthorized(msg),
                        other => RunError::Upstream(other.to_string()),
                    });
                }
                Err(e) => {
                    tracing::warn!(keyword, start = start_offset, error = %e, "Search page failed, keeping partial results");
                    outcome.warnings.push(format!(
                        "Search page starting at result {} failed: {}",
                        start_offset, e
                    ));
                    break;
                }
            };

            tracing::debug!(keyword, start = start_offset, items = page.items.len(), "Search page received");

            for hit in page.items {
                if outcome.candidates.len() >= target {
                    break;
                }
                let key = dedupe_key(&hit.url).unwrap_or_else(|_| hit.url.clone());
                if !seen.insert(key) {
                    tracing::debug!(url = %hit.url, "Skipping duplicate search hit");
                    continue;
                }
                outcome.candidates.push(Candidate {
                    rank: outcome.candidates.len() as u32 + 1,
                    url: hit.url,
                    title: hit.title,
                });
            }

            if !page.page_had_full_results {
                break;
            }
        }

        if outcome.candidates.is_empty() {
            return Err(RunError::NoResults);
        }

        tracing::info!(keyword, candidates = outcome.candidates.len(), "Search results collected");
        Ok(outcome)
    }

    async fn fetch(
        &self,
        keyword: &str,
        region: SearchRegion,
        start_offset: u32,
        cancel: &CancellationToken,
    ) -> Result<SearchPage, ProbeError> {
        bounded_call(
            cancel,
            self.call_timeout,
            self.source
                .fetch_page(keyword, region, start_offset, self.page_size),
        )
        .await
    }
}
