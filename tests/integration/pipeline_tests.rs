//! Integration tests for the analysis pipeline
//!
//! Most tests drive `BatchOrchestrator` with scripted collaborators; the last
//! one wires the real HTTP clients against wiremock and a SQLite file.

use async_trait::async_trait;
use sitescout::config::{
    Config, FingerprintConfig, LimitsConfig, OutputConfig, PageSpeedConfig, PipelineConfig,
    SearchConfig,
};
use sitescout::pipeline::{OrchestratorSettings, PAGESPEED_QUOTA_KEY};
use sitescout::probes::{
    build_http_client, FingerprintProbe, Fingerprint, GoogleSearchClient, MetricsProbe,
    PageMetrics, PageSpeedClient, ProbeError, ProbeResult, SearchHit, SearchPage, SearchSource,
    WordPressDetector,
};
use sitescout::storage::{open_store, RunId, RunStore, SqliteStore, StorageError, StorageResult, StoredRun};
use sitescout::{
    BatchOrchestrator, CallerId, ItemAnalyzer, ProgressState, RateLimiter, RecordStatus, Run,
    RunError, RunStatus, SearchAggregator, SearchRegion,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Search source holding `total` distinct results
struct PagedSearch {
    total: usize,
    calls: AtomicUsize,
}

impl PagedSearch {
    fn new(total: usize) -> Self {
        Self {
            total,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchSource for PagedSearch {
    async fn fetch_page(
        &self,
        _keyword: &str,
        _region: SearchRegion,
        start_offset: u32,
        page_size: u32,
    ) -> ProbeResult<SearchPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let first = (start_offset as usize - 1).min(self.total);
        let last = (first + page_size as usize).min(self.total);
        let items: Vec<SearchHit> = (first..last)
            .map(|i| SearchHit {
                url: format!("https://business{}.example/", i + 1),
                title: format!("Business {}", i + 1),
            })
            .collect();
        Ok(SearchPage {
            page_had_full_results: items.len() == page_size as usize,
            items,
        })
    }
}

/// Metrics probe that fails for chosen URLs and sleeps longer for early ranks
struct ScriptedMetrics {
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl ScriptedMetrics {
    fn new(failing: &[&str]) -> Self {
        Self {
            failing: failing.iter().map(|u| u.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MetricsProbe for ScriptedMetrics {
    async fn probe(&self, url: &str) -> ProbeResult<PageMetrics> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        // later calls finish first so out-of-order completion is exercised
        tokio::time::sleep(Duration::from_millis(20u64.saturating_sub(call as u64 * 2))).await;

        if self.failing.contains(url) {
            return Err(ProbeError::Upstream("Lighthouse returned error".to_string()));
        }
        Ok(PageMetrics {
            load_time_seconds: 2.0,
            lcp_seconds: 2.5,
            cls: 0.05,
            fid_millis: 30,
            performance_score: 0.8,
            seo_score: 0.9,
            accessibility_score: 0.7,
        })
    }
}

/// Metrics probe that cancels the run when it sees its `trigger`-th call
struct CancellingMetrics {
    cancel: CancellationToken,
    trigger: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl MetricsProbe for CancellingMetrics {
    async fn probe(&self, _url: &str) -> ProbeResult<PageMetrics> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.trigger {
            self.cancel.cancel();
        }
        Ok(PageMetrics::default())
    }
}

struct EveryOtherWordPress;

#[async_trait]
impl FingerprintProbe for EveryOtherWordPress {
    async fn probe(&self, url: &str) -> ProbeResult<Fingerprint> {
        let odd = url
            .trim_end_matches(".example/")
            .trim_start_matches("https://business")
            .parse::<u32>()
            .map(|n| n % 2 == 1)
            .unwrap_or(false);
        Ok(Fingerprint { is_word_press: odd })
    }
}

/// Store that refuses every write
struct BrokenStore;

#[async_trait]
impl RunStore for BrokenStore {
    async fn save_run(&self, _run: &Run) -> StorageResult<RunId> {
        Err(StorageError::Database("disk is full".to_string()))
    }

    async fn list_runs(&self, _caller: &CallerId) -> StorageResult<Vec<StoredRun>> {
        Ok(Vec::new())
    }

    async fn get_run(&self, id: RunId) -> StorageResult<StoredRun> {
        Err(StorageError::RunNotFound(id))
    }

    async fn delete_run(&self, id: RunId) -> StorageResult<()> {
        Err(StorageError::RunNotFound(id))
    }
}

struct Harness {
    limiter: Arc<RateLimiter>,
    search_limit: u32,
    pagespeed_limit: u32,
    target_count: u32,
    concurrency: usize,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new()),
            search_limit: 100,
            pagespeed_limit: 1000,
            target_count: 50,
            concurrency: 1,
        }
    }
}

impl Harness {
    fn build(
        &self,
        search: Arc<dyn SearchSource>,
        metrics: Arc<dyn MetricsProbe>,
        store: Arc<dyn RunStore>,
    ) -> BatchOrchestrator {
        BatchOrchestrator::new(
            SearchAggregator::new(search, self.limiter.clone(), self.search_limit, 10, TIMEOUT),
            ItemAnalyzer::new(
                metrics,
                Arc::new(EveryOtherWordPress),
                self.limiter.clone(),
                self.pagespeed_limit,
                1000,
                TIMEOUT,
            ),
            store,
            OrchestratorSettings {
                target_count: self.target_count,
                concurrency: self.concurrency,
                store_timeout: TIMEOUT,
            },
        )
    }
}

fn alice() -> Option<CallerId> {
    CallerId::new("alice")
}

/// Collects every snapshot the subscriber observes until a terminal state
fn record_progress(mut rx: watch::Receiver<ProgressState>) -> tokio::task::JoinHandle<Vec<ProgressState>> {
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            let done = state.status.is_terminal();
            seen.push(state);
            if done {
                break;
            }
        }
        seen
    })
}

#[tokio::test]
async fn test_run_collects_ranked_records() {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let search = Arc::new(PagedSearch::new(45));
    let mut orchestrator = Harness::default().build(
        search.clone(),
        Arc::new(ScriptedMetrics::new(&[])),
        store.clone(),
    );

    let run = orchestrator
        .start_run(alice(), "plumber sydney", SearchRegion::ComAu, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.records.len(), 45);
    let ranks: Vec<u32> = run.records.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, (1..=45).collect::<Vec<_>>());
    assert_eq!(run.records[0].url, "https://business1.example/");
    assert_eq!(run.records[0].business_name, "Business 1");
    assert!(run.records[0].is_word_press);
    assert!(!run.records[1].is_word_press);
    // 10 + 10 + 10 + 10 + 5 (short page ends paging)
    assert_eq!(search.calls.load(Ordering::SeqCst), 5);
    assert!(run.warnings.is_empty());

    let stored = store.get_run(run.saved_as.unwrap()).await.unwrap();
    assert_eq!(stored.keyword, "plumber sydney");
    assert_eq!(stored.region, SearchRegion::ComAu);
    assert_eq!(stored.records.len(), 45);
}

#[tokio::test]
async fn test_no_results_fails_without_spending_metrics_quota() {
    let harness = Harness::default();
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let mut orchestrator = harness.build(
        Arc::new(PagedSearch::new(0)),
        Arc::new(ScriptedMetrics::new(&[])),
        store.clone(),
    );

    let err = orchestrator
        .start_run(alice(), "zzqqxx", SearchRegion::Com, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, RunError::NoResults);
    let progress = orchestrator.progress();
    assert_eq!(progress.status, RunStatus::Error);
    assert_eq!(progress.error.as_deref(), Some(RunError::NoResults.to_string().as_str()));
    assert_eq!(
        harness.limiter.remaining(PAGESPEED_QUOTA_KEY, harness.pagespeed_limit),
        harness.pagespeed_limit
    );
    assert!(store.list_runs(&alice().unwrap()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_item_failure_is_recorded_and_run_completes() {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let mut orchestrator = Harness::default().build(
        Arc::new(PagedSearch::new(10)),
        Arc::new(ScriptedMetrics::new(&["https://business3.example/"])),
        store,
    );

    let run = orchestrator
        .start_run(alice(), "dentist", SearchRegion::Com, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.records.len(), 10);
    let third = &run.records[2];
    assert_eq!(third.rank, 3);
    assert_eq!(third.status, RecordStatus::Error);
    assert_eq!(third.error_message.as_deref(), Some("Lighthouse returned error"));
    assert_eq!(third.page_load_time, 0.0);
    assert_eq!(third.performance, 0.0);
    assert!(!third.is_word_press);

    assert_eq!(run.error_count(), 1);
    assert!(run.records.iter().filter(|r| r.rank != 3).all(|r| r.is_success()));
    assert_eq!(orchestrator.progress().status, RunStatus::Completed);
}

#[tokio::test]
async fn test_progress_is_monotone_with_concurrency() {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let harness = Harness {
        concurrency: 4,
        ..Harness::default()
    };
    let mut orchestrator = harness.build(
        Arc::new(PagedSearch::new(12)),
        Arc::new(ScriptedMetrics::new(&[])),
        store,
    );
    let observed = record_progress(orchestrator.subscribe());

    let run = orchestrator
        .start_run(alice(), "florist", SearchRegion::Com, &CancellationToken::new())
        .await
        .unwrap();
    let snapshots = observed.await.unwrap();

    // results stay in rank order even though later probes finish first
    let ranks: Vec<u32> = run.records.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, (1..=12).collect::<Vec<_>>());

    assert!(!snapshots.is_empty());
    for pair in snapshots.windows(2) {
        assert!(
            pair[1].progress_fraction >= pair[0].progress_fraction,
            "progress went backwards: {:?}",
            pair
        );
    }
    let last = snapshots.last().unwrap();
    assert_eq!(last.status, RunStatus::Completed);
    assert_eq!(last.progress_fraction, 1.0);
    assert!(snapshots.iter().all(|s| (0.0..=1.0).contains(&s.progress_fraction)));
}

#[tokio::test]
async fn test_metrics_quota_exhaustion_marks_remaining_records() {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let harness = Harness {
        pagespeed_limit: 4,
        ..Harness::default()
    };
    let mut orchestrator = harness.build(
        Arc::new(PagedSearch::new(10)),
        Arc::new(ScriptedMetrics::new(&[])),
        store,
    );

    let run = orchestrator
        .start_run(alice(), "cafe", SearchRegion::Com, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.records.len(), 10);
    assert!(run.records[..4].iter().all(|r| r.is_success()));
    for record in &run.records[4..] {
        assert_eq!(record.status, RecordStatus::Error);
        assert_eq!(record.error_message.as_deref(), Some("quota exceeded"));
    }
    assert_eq!(harness.limiter.remaining(PAGESPEED_QUOTA_KEY, 4), 0);
}

#[tokio::test]
async fn test_search_quota_exhausted_on_first_page() {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let harness = Harness {
        search_limit: 0,
        ..Harness::default()
    };
    let search = Arc::new(PagedSearch::new(30));
    let mut orchestrator = harness.build(search.clone(), Arc::new(ScriptedMetrics::new(&[])), store);

    let err = orchestrator
        .start_run(alice(), "cafe", SearchRegion::Com, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::QuotaExceeded { .. }));
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    assert_eq!(orchestrator.progress().status, RunStatus::Error);
}

#[tokio::test]
async fn test_search_quota_exhausted_mid_run_keeps_partial_results() {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let harness = Harness {
        search_limit: 2,
        ..Harness::default()
    };
    let mut orchestrator = harness.build(
        Arc::new(PagedSearch::new(45)),
        Arc::new(ScriptedMetrics::new(&[])),
        store,
    );

    let run = orchestrator
        .start_run(alice(), "cafe", SearchRegion::Com, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.records.len(), 20);
    assert_eq!(run.warnings.len(), 1);
    assert_eq!(orchestrator.progress().status, RunStatus::Completed);
}

#[tokio::test]
async fn test_cancellation_aborts_run() {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let cancel = CancellationToken::new();
    let metrics = Arc::new(CancellingMetrics {
        cancel: cancel.clone(),
        trigger: 3,
        calls: AtomicUsize::new(0),
    });
    let mut orchestrator =
        Harness::default().build(Arc::new(PagedSearch::new(10)), metrics.clone(), store.clone());

    let err = orchestrator
        .start_run(alice(), "mechanic", SearchRegion::Com, &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, RunError::Cancelled);
    assert_eq!(metrics.calls.load(Ordering::SeqCst), 3);

    let progress = orchestrator.progress();
    assert_eq!(progress.status, RunStatus::Error);
    assert!(progress.progress_fraction < 1.0);
    assert!(store.list_runs(&alice().unwrap()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_becomes_warning() {
    let mut orchestrator = Harness::default().build(
        Arc::new(PagedSearch::new(5)),
        Arc::new(ScriptedMetrics::new(&[])),
        Arc::new(BrokenStore),
    );

    let run = orchestrator
        .start_run(alice(), "bakery", SearchRegion::Com, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.records.len(), 5);
    assert_eq!(run.saved_as, None);
    assert_eq!(run.warnings.len(), 1);
    assert!(run.warnings[0].starts_with("Failed to save analysis:"));
    assert!(run.warnings[0].contains("disk is full"));
    assert_eq!(orchestrator.progress().status, RunStatus::Completed);
}

/// Metrics probe that never answers for one URL and reports NaN scores for another
struct UnreliableMetrics {
    stalled: &'static str,
    garbled: &'static str,
}

#[async_trait]
impl MetricsProbe for UnreliableMetrics {
    async fn probe(&self, url: &str) -> ProbeResult<PageMetrics> {
        if url == self.stalled {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let score = if url == self.garbled { f64::NAN } else { 0.75 };
        Ok(PageMetrics {
            load_time_seconds: 1.0,
            performance_score: score,
            seo_score: score,
            accessibility_score: score,
            ..PageMetrics::default()
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_metrics_probe_times_out_and_run_completes() {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let mut orchestrator = Harness::default().build(
        Arc::new(PagedSearch::new(4)),
        Arc::new(UnreliableMetrics {
            stalled: "https://business2.example/",
            garbled: "",
        }),
        store,
    );

    let run = orchestrator
        .start_run(alice(), "locksmith", SearchRegion::Com, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.records.len(), 4);
    let stalled = &run.records[1];
    assert_eq!(stalled.status, RecordStatus::Error);
    assert_eq!(
        stalled.error_message,
        Some(ProbeError::Timeout(TIMEOUT).to_string())
    );
    assert_eq!(run.error_count(), 1);
    assert_eq!(orchestrator.progress().status, RunStatus::Completed);
    assert_eq!(orchestrator.progress().progress_fraction, 1.0);
}

#[tokio::test]
async fn test_nan_scores_do_not_break_saved_history() {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let mut orchestrator = Harness::default().build(
        Arc::new(PagedSearch::new(3)),
        Arc::new(UnreliableMetrics {
            stalled: "",
            garbled: "https://business1.example/",
        }),
        store.clone(),
    );

    let run = orchestrator
        .start_run(alice(), "roofing", SearchRegion::Com, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.records[0].performance, 0.0);
    assert_eq!(run.records[0].seo, 0.0);
    assert!(run.saved_as.is_some());

    let history = store.list_runs(&alice().unwrap()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].records, run.records);
}

const WORDPRESS_HOME: &str = r#"<html><head>
<meta name="generator" content="WordPress 6.4.2">
<link rel="stylesheet" href="/wp-content/themes/acme/style.css">
</head><body><h1>Acme Plumbing</h1></body></html>"#;

const STATIC_HOME: &str = "<html><head><title>Bolt Electric</title></head><body>Call us</body></html>";

fn lighthouse_body(fcp_millis: f64, performance: f64) -> serde_json::Value {
    serde_json::json!({
        "lighthouseResult": {
            "audits": {
                "first-contentful-paint": { "numericValue": fcp_millis },
                "largest-contentful-paint": { "numericValue": 2400.0 },
                "cumulative-layout-shift": { "numericValue": 0.02 },
                "max-potential-fid": { "numericValue": 40.0 }
            },
            "categories": {
                "performance": { "score": performance },
                "seo": { "score": 0.9 },
                "accessibility": { "score": 0.75 }
            }
        }
    })
}

#[tokio::test]
async fn test_full_run_against_mock_apis() {
    let server = MockServer::start().await;
    let base = server.uri();
    let acme = format!("{}/acme", base);
    let bolt = format!("{}/bolt", base);

    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .and(query_param("q", "plumber"))
        .and(query_param("gl", "au"))
        .and(query_param("start", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "link": acme, "title": "Acme Plumbing" },
                { "link": bolt, "title": "Bolt Electric" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/pagespeedonline/v5/runPagespeed"))
        .and(query_param("url", acme.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(lighthouse_body(1200.0, 0.91)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/pagespeedonline/v5/runPagespeed"))
        .and(query_param("url", bolt.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(lighthouse_body(3400.0, 0.42)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WORDPRESS_HOME))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/bolt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STATIC_HOME))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sitescout.db");
    let config = Config {
        search: SearchConfig {
            api_key: Some("test-key".to_string()),
            engine_id: Some("test-engine".to_string()),
            endpoint: base.clone(),
            ..SearchConfig::default()
        },
        pagespeed: PageSpeedConfig {
            endpoint: base.clone(),
            ..PageSpeedConfig::default()
        },
        fingerprint: FingerprintConfig {
            check_wp_admin: false,
            ..FingerprintConfig::default()
        },
        limits: LimitsConfig::default(),
        pipeline: PipelineConfig {
            concurrency: 2,
            call_timeout_secs: 5,
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().into_owned(),
        },
    };

    let client = build_http_client(&config.fingerprint.user_agent, TIMEOUT).unwrap();
    let store = Arc::new(open_store(&db_path, "cafebabe").unwrap());
    let mut orchestrator = BatchOrchestrator::from_config(
        &config,
        Arc::new(RateLimiter::new()),
        Arc::new(GoogleSearchClient::from_config(client.clone(), &config).unwrap()),
        Arc::new(PageSpeedClient::from_config(client.clone(), &config).unwrap()),
        Arc::new(WordPressDetector::from_config(client, &config)),
        store.clone(),
    );

    let run = orchestrator
        .start_run(alice(), "plumber", SearchRegion::ComAu, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.records.len(), 2);

    let first = &run.records[0];
    assert_eq!(first.rank, 1);
    assert_eq!(first.business_name, "Acme Plumbing");
    assert!(first.is_success());
    assert!(first.is_word_press);
    assert!((first.page_load_time - 1.2).abs() < 1e-9);
    assert!((first.performance - 0.91).abs() < 1e-9);
    assert_eq!(first.fid, 40);

    let second = &run.records[1];
    assert_eq!(second.rank, 2);
    assert!(second.is_success());
    assert!(!second.is_word_press);
    assert!((second.page_load_time - 3.4).abs() < 1e-9);

    let stored = store.list_runs(&alice().unwrap()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].config_hash.as_deref(), Some("cafebabe"));
    assert_eq!(stored[0].records, run.records);
}
