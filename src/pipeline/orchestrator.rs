//! Batch orchestrator - one keyword run from search to persisted result
//!
//! This module drives a run through its lifecycle:
//! - Checking the caller identity before any quota is spent
//! - Collecting ranked candidates through the `SearchAggregator`
//! - Analyzing candidates with bounded concurrency, in rank order
//! - Publishing `ProgressState` snapshots on a watch channel
//! - Handing the finished run to the `RunStore`

use crate::config::Config;
use crate::model::{AnalysisRecord, CallerId, Candidate, Run, SearchRegion};
use crate::pipeline::{ItemAnalyzer, RateLimiter, SearchAggregator};
use crate::probes::{FingerprintProbe, MetricsProbe, SearchSource};
use crate::state::ProgressState;
use crate::storage::RunStore;
use crate::RunError;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Run-wide knobs taken from `[search]` and `[pipeline]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Candidates collected per run
    pub target_count: u32,

    /// Candidates analyzed at the same time
    pub concurrency: usize,

    /// Bound on the persistence hand-off
    pub store_timeout: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_count: config.search.max_results,
            concurrency: config.pipeline.concurrency.max(1) as usize,
            store_timeout: Duration::from_secs(config.pipeline.call_timeout_secs),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            target_count: 50,
            concurrency: 1,
            store_timeout: Duration::from_secs(60),
        }
    }
}

/// Main pipeline structure
///
/// Owns the live `ProgressState`; observers get read-only snapshots through
/// `subscribe` or `progress`. Each `start_run` is an independent submission,
/// so re-running a keyword is just calling it again.
pub struct BatchOrchestrator {
    aggregator: SearchAggregator,
    analyzer: ItemAnalyzer,
    store: Arc<dyn RunStore>,
    settings: OrchestratorSettings,
    progress: watch::Sender<ProgressState>,
}

impl BatchOrchestrator {
    pub fn new(
        aggregator: SearchAggregator,
        analyzer: ItemAnalyzer,
        store: Arc<dyn RunStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (progress, _) = watch::channel(ProgressState::idle());
        Self {
            aggregator,
            analyzer,
            store,
            settings,
            progress,
        }
    }

    /// Wires the aggregator and analyzer from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration (limits, page size, timeouts)
    /// * `limiter` - Quota state shared by every outbound call
    /// * `search` / `metrics` / `fingerprint` - External lookups
    /// * `store` - Where completed runs are handed off
    pub fn from_config(
        config: &Config,
        limiter: Arc<RateLimiter>,
        search: Arc<dyn SearchSource>,
        metrics: Arc<dyn MetricsProbe>,
        fingerprint: Arc<dyn FingerprintProbe>,
        store: Arc<dyn RunStore>,
    ) -> Self {
        let call_timeout = Duration::from_secs(config.pipeline.call_timeout_secs);

        let aggregator = SearchAggregator::new(
            search,
            Arc::clone(&limiter),
            config.limits.search_queries_per_day,
            config.search.page_size,
            call_timeout,
        );
        let analyzer = ItemAnalyzer::new(
            metrics,
            fingerprint,
            limiter,
            config.limits.pagespeed_queries_per_day,
            config.limits.fingerprint_checks_per_day,
            call_timeout,
        );

        Self::new(
            aggregator,
            analyzer,
            store,
            OrchestratorSettings::from_config(config),
        )
    }

    /// Returns a receiver that always holds the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.progress.subscribe()
    }

    /// Returns the current snapshot
    pub fn progress(&self) -> ProgressState {
        self.progress.borrow().clone()
    }

    /// Runs one keyword batch to a terminal state
    ///
    /// # Returns
    ///
    /// * `Ok(Run)` - Every candidate went through the analyzer. Item failures
    ///   are on the records; a failed hand-off to storage is a warning.
    /// * `Err(RunError)` - The run aborted; progress ends in `error`
    pub async fn start_run(
        &mut self,
        caller: Option<CallerId>,
        keyword: &str,
        region: SearchRegion,
        cancel: &CancellationToken,
    ) -> Result<Run, RunError> {
        let Some(caller) = caller else {
            tracing::warn!(keyword, "Run rejected: no caller identity");
            self.publish(ProgressState::failed(0.0, RunError::AuthenticationRequired.to_string()));
            return Err(RunError::AuthenticationRequired);
        };

        tracing::info!(keyword, region = %region, caller = %caller, "Starting analysis run");
        self.publish(ProgressState::analyzing(0.0, None));

        let outcome = match self
            .aggregator
            .collect(keyword, region, self.settings.target_count, cancel)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail(e)),
        };

        let records = match self.analyze_all(&outcome.candidates, cancel).await {
            Ok(records) => records,
            Err(e) => return Err(self.fail(e)),
        };

        let mut run = Run {
            caller,
            keyword: keyword.to_string(),
            region,
            records,
            completed_at: Utc::now(),
            warnings: outcome.warnings,
            saved_as: None,
        };

        if let Err(e) = self.persist(&mut run, cancel).await {
            return Err(self.fail(e));
        }

        tracing::info!(
            keyword,
            records = run.records.len(),
            errors = run.error_count(),
            warnings = run.warnings.len(),
            "Analysis run completed"
        );
        self.publish(ProgressState::completed());

        Ok(run)
    }

    /// Analyzes candidates in rank order, publishing progress after each one
    ///
    /// `buffered` keeps up to `concurrency` analyses in flight but yields
    /// results in input order, so this single loop is the only publisher and
    /// the fraction never decreases.
    async fn analyze_all(
        &self,
        candidates: &[Candidate],
        cancel: &CancellationToken,
    ) -> Result<Vec<AnalysisRecord>, RunError> {
        let total = candidates.len();
        let mut records = Vec::with_capacity(total);

        let mut results = stream::iter(candidates)
            .map(|candidate| self.analyzer.analyze(candidate, cancel))
            .buffered(self.settings.concurrency.max(1));

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RunError::Cancelled),
                next = results.next() => next,
            };
            let Some(record) = next else {
                break;
            };

            if !record.is_success() {
                tracing::debug!(url = %record.url, rank = record.rank, "Candidate recorded as error");
            }

            let processed = records.len() + 1;
            self.publish(ProgressState::analyzing(
                processed as f64 / total as f64,
                Some(record.url.clone()),
            ));
            records.push(record);
        }

        Ok(records)
    }

    /// Hands the run to storage; only cancellation is fatal here
    async fn persist(&self, run: &mut Run, cancel: &CancellationToken) -> Result<(), RunError> {
        let saved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Cancelled),
            saved = tokio::time::timeout(self.settings.store_timeout, self.store.save_run(run)) => saved,
        };

        match saved {
            Ok(Ok(id)) => {
                tracing::info!(run_id = id, "Run saved");
                run.saved_as = Some(id);
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to save analysis run");
                run.warnings.push(format!("Failed to save analysis: {}", e));
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.settings.store_timeout, "Saving analysis run timed out");
                run.warnings.push(format!(
                    "Failed to save analysis: timed out after {:?}",
                    self.settings.store_timeout
                ));
            }
        }
        Ok(())
    }

    /// Moves to `error`, keeping the fraction reached so far
    fn fail(&self, error: RunError) -> RunError {
        let reached = self.progress.borrow().progress_fraction;
        tracing::error!(error = %error, "Analysis run failed");
        self.publish(ProgressState::failed(reached, error.to_string()));
        error
    }

    fn publish(&self, next: ProgressState) {
        let current = self.progress.borrow().status;
        debug_assert!(
            current.can_transition_to(next.status),
            "illegal progress transition {} -> {}",
            current,
            next.status
        );
        self.progress.send_replace(next);
    }
}
