//! Sitescout main entry point
//!
//! This is the command-line interface for the Sitescout website auditor.

use anyhow::{anyhow, bail, Context};
use clap::{ArgGroup, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use sitescout::config::{load_config_with_hash, Config};
use sitescout::output::{export_run, export_run_to_file, print_statistics, reduce_stats, ExportFormat};
use sitescout::probes::{build_http_client, GoogleSearchClient, PageSpeedClient, WordPressDetector};
use sitescout::storage::{open_store, RunId, RunStore, SqliteStore};
use sitescout::{BatchOrchestrator, CallerId, RateLimiter, Run, SearchRegion};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sitescout: keyword-driven website auditing
///
/// Sitescout collects the sites ranking for a search keyword, measures each
/// one with PageSpeed Insights, detects WordPress, and keeps the results in a
/// local database for later export.
#[derive(Parser, Debug)]
#[command(name = "sitescout")]
#[command(version = "1.0.0")]
#[command(about = "Keyword-driven website auditing", long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args([
            "keyword", "list_runs", "show_run", "delete_run", "export",
            "save_lead", "list_leads", "delete_lead", "dry_run",
        ])
))]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Analyze the sites ranking for this keyword
    #[arg(short, long)]
    keyword: Option<String>,

    /// Google domain to search (.com, .com.au, .co.nz, .co.uk, .ca, .de)
    #[arg(long, default_value = ".com", requires = "keyword")]
    region: SearchRegion,

    /// Identity runs and leads are recorded under
    #[arg(long, env = "SITESCOUT_CALLER")]
    caller: Option<String>,

    /// List saved runs for the caller
    #[arg(long)]
    list_runs: bool,

    /// Print the statistics and failures of a saved run
    #[arg(long, value_name = "RUN_ID")]
    show_run: Option<RunId>,

    /// Delete a saved run
    #[arg(long, value_name = "RUN_ID")]
    delete_run: Option<RunId>,

    /// Export a saved run
    #[arg(long, value_name = "RUN_ID")]
    export: Option<RunId>,

    /// Export format: csv, json or md
    #[arg(long, default_value = "csv", requires = "export")]
    format: ExportFormat,

    /// Export destination (stdout when omitted)
    #[arg(long, value_name = "FILE", requires = "export")]
    out: Option<PathBuf>,

    /// Save one result of a run as a lead
    #[arg(long, value_name = "RUN_ID:RANK")]
    save_lead: Option<LeadRef>,

    /// List saved leads for the caller
    #[arg(long)]
    list_leads: bool,

    /// Delete a saved lead
    #[arg(long, value_name = "LEAD_ID")]
    delete_lead: Option<i64>,

    /// Validate config and show what a run would do without calling any API
    #[arg(long)]
    dry_run: bool,
}

/// `RUN_ID:RANK` reference to one record of a saved run
#[derive(Debug, Clone, Copy)]
struct LeadRef {
    run_id: RunId,
    rank: u32,
}

impl FromStr for LeadRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (run, rank) = s
            .split_once(':')
            .ok_or_else(|| format!("expected RUN_ID:RANK, got '{}'", s))?;
        Ok(Self {
            run_id: run.trim().parse().map_err(|e| format!("bad run id: {}", e))?,
            rank: rank.trim().parse().map_err(|e| format!("bad rank: {}", e))?,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::debug!("Configuration loaded (hash: {})", config_hash);

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    let store = open_store(Path::new(&config.output.database_path), &config_hash)
        .with_context(|| format!("failed to open {}", config.output.database_path))?;

    if let Some(keyword) = cli.keyword.as_deref() {
        handle_analyze(&config, Arc::new(store), &cli, keyword).await
    } else if cli.list_runs {
        handle_list_runs(&store, &require_caller(&cli)?).await
    } else if let Some(id) = cli.show_run {
        handle_show_run(&store, id).await
    } else if let Some(id) = cli.delete_run {
        store.delete_run(id).await?;
        println!("✓ Deleted run {}", id);
        Ok(())
    } else if let Some(id) = cli.export {
        handle_export(&store, id, cli.format, cli.out.as_deref()).await
    } else if let Some(lead) = cli.save_lead {
        handle_save_lead(&store, &require_caller(&cli)?, lead).await
    } else if cli.list_leads {
        handle_list_leads(&store, &require_caller(&cli)?)
    } else if let Some(id) = cli.delete_lead {
        store.delete_lead(id)?;
        println!("✓ Deleted lead {}", id);
        Ok(())
    } else {
        Err(anyhow!("no mode selected"))
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so exports written to stdout stay clean.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitescout=info,warn"),
            1 => EnvFilter::new("sitescout=debug,info"),
            2 => EnvFilter::new("sitescout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn require_caller(cli: &Cli) -> anyhow::Result<CallerId> {
    cli.caller
        .as_deref()
        .and_then(CallerId::new)
        .ok_or_else(|| anyhow!("a caller identity is required (--caller or SITESCOUT_CALLER)"))
}

/// Handles the --dry-run mode: validates config and shows what a run would do
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Sitescout Dry Run ===\n");

    println!("Search:");
    println!("  Endpoint: {}", config.search.endpoint);
    println!("  Page size: {}", config.search.page_size);
    println!("  Max results per run: {}", config.search.max_results);
    println!(
        "  Credentials: {}",
        match config.search_credentials() {
            Ok(_) => "configured".to_string(),
            Err(e) => e.to_string(),
        }
    );

    println!("\nPageSpeed:");
    println!("  Endpoint: {}", config.pagespeed.endpoint);
    println!("  Strategy: {}", config.pagespeed.strategy);
    println!(
        "  API key: {}",
        if config.pagespeed_key().is_ok() { "configured" } else { "missing" }
    );

    println!("\nFingerprint:");
    println!("  User agent: {}", config.fingerprint.user_agent);
    println!("  Check wp-admin: {}", config.fingerprint.check_wp_admin);

    println!("\nDaily Limits:");
    println!("  Search pages: {}", config.limits.search_queries_per_day);
    println!("  PageSpeed audits: {}", config.limits.pagespeed_queries_per_day);
    println!("  Fingerprint checks: {}", config.limits.fingerprint_checks_per_day);

    println!("\nPipeline:");
    println!("  Concurrency: {}", config.pipeline.concurrency);
    println!("  Call timeout: {}s", config.pipeline.call_timeout_secs);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let pages = config.search.max_results.div_ceil(config.search.page_size);
    println!("\n✓ Configuration is valid");
    println!(
        "✓ A run would use up to {} search pages and {} audits",
        pages, config.search.max_results
    );

    Ok(())
}

/// Handles the main analysis run
async fn handle_analyze(
    config: &Config,
    store: Arc<SqliteStore>,
    cli: &Cli,
    keyword: &str,
) -> anyhow::Result<()> {
    let client = build_http_client(
        &config.fingerprint.user_agent,
        Duration::from_secs(config.pipeline.call_timeout_secs),
    )?;

    let mut orchestrator = BatchOrchestrator::from_config(
        config,
        Arc::new(RateLimiter::new()),
        Arc::new(GoogleSearchClient::from_config(client.clone(), config)?),
        Arc::new(PageSpeedClient::from_config(client.clone(), config)?),
        Arc::new(WordPressDetector::from_config(client, config)),
        store,
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let bar = progress_bar(cli.quiet);
    let mut updates = orchestrator.subscribe();
    let bar_updates = bar.clone();
    let progress_task = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            bar_updates.set_position(state.percent());
            if let Some(url) = state.current_url {
                bar_updates.set_message(url);
            }
            if state.status.is_terminal() {
                break;
            }
        }
    });

    let caller = cli.caller.as_deref().and_then(CallerId::new);
    let result = orchestrator
        .start_run(caller, keyword, cli.region, &cancel)
        .await;

    bar.finish_and_clear();
    progress_task.abort();

    let run = result?;
    print_statistics(&run, &reduce_stats(&run.records));
    if run.has_item_failures() {
        println!(
            "Run completed with {} failed site(s); inspect them with --show-run or --export",
            run.error_count()
        );
    }

    Ok(())
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos:>3}% {wide_msg}")
    {
        bar.set_style(style.progress_chars("█▓░"));
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar.set_message("Searching...");
    bar
}

/// Handles --list-runs
async fn handle_list_runs(store: &SqliteStore, caller: &CallerId) -> anyhow::Result<()> {
    let runs = store.list_runs(caller).await?;
    if runs.is_empty() {
        println!("No saved runs for {}", caller);
        return Ok(());
    }

    println!("{:>6}  {:<20}  {:<8}  {:>5}  {:>6}  Keyword", "ID", "Completed", "Region", "Sites", "Errors");
    for stored in runs {
        let errors = stored.records.iter().filter(|r| !r.is_success()).count();
        println!(
            "{:>6}  {:<20}  {:<8}  {:>5}  {:>6}  {}",
            stored.id,
            stored.completed_at.format("%Y-%m-%d %H:%M:%S"),
            stored.region,
            stored.records.len(),
            errors,
            stored.keyword
        );
    }
    Ok(())
}

async fn load_run(store: &SqliteStore, id: RunId) -> anyhow::Result<Run> {
    Ok(store.get_run(id).await?.into_run())
}

/// Handles --show-run
async fn handle_show_run(store: &SqliteStore, id: RunId) -> anyhow::Result<()> {
    let run = load_run(store, id).await?;
    print_statistics(&run, &reduce_stats(&run.records));
    Ok(())
}

/// Handles --export
async fn handle_export(
    store: &SqliteStore,
    id: RunId,
    format: ExportFormat,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let run = load_run(store, id).await?;
    match out {
        Some(path) => {
            export_run_to_file(&run, format, path)?;
            println!("✓ Run {} exported to: {}", id, path.display());
        }
        None => export_run(&run, format, std::io::stdout().lock())?,
    }
    Ok(())
}

/// Handles --save-lead
async fn handle_save_lead(store: &SqliteStore, caller: &CallerId, lead: LeadRef) -> anyhow::Result<()> {
    let run = load_run(store, lead.run_id).await?;
    let Some(record) = run.records.iter().find(|r| r.rank == lead.rank) else {
        bail!("run {} has no result with rank {}", lead.run_id, lead.rank);
    };

    let id = store.save_lead(caller, record, Some(lead.run_id))?;
    println!("✓ Saved {} ({}) as lead {}", record.business_name, record.url, id);
    Ok(())
}

/// Handles --list-leads
fn handle_list_leads(store: &SqliteStore, caller: &CallerId) -> anyhow::Result<()> {
    let leads = store.list_leads(caller)?;
    if leads.is_empty() {
        println!("No saved leads for {}", caller);
        return Ok(());
    }

    for lead in leads {
        let origin = lead
            .run_id
            .map(|id| format!("run {}", id))
            .unwrap_or_else(|| "deleted run".to_string());
        println!(
            "{:>6}  {}  {}  {} ({})",
            lead.id,
            lead.created_at.format("%Y-%m-%d"),
            lead.business_name,
            lead.url,
            origin
        );
    }
    Ok(())
}
