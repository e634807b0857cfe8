//! BIP crawler CLI
//!
//! Local execution entry point: crawl, inspect the registry, validate the
//! configuration and show the latest stored result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bip_crawler::{
    error::Result,
    models::{AdministrativeTier, Config, DateRange, IndustryCategory, SourceRegistry, SourceSelection},
    pipeline::{Orchestrator, ProgressSnapshot, ResultAggregate, RunRequest, RunStatus},
    services::{Classifier, HostThrottle, HttpFetcher, PageExtractor},
    storage::{LocalStorage, ResultSink},
    utils::log::{header, parse_level, separator, summary},
};
use chrono::{Days, Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

/// Crawler for environmental-decision notices in Polish BIP registries
#[derive(Parser, Debug)]
#[command(name = "bip-crawler", version, about = "BIP environmental-decision crawler")]
struct Cli {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Path to the source registry JSON
    #[arg(short, long, default_value = "data/sources.json")]
    registry: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the selected sources for notices in a date range
    Crawl {
        /// First publication date (YYYY-MM-DD); defaults to 30 days before --to
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last publication date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Keep only these categories (e.g. OZE, it, przemysl); repeatable
        #[arg(long = "category")]
        categories: Vec<IndustryCategory>,

        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Show how many sources the registry holds per tier and voivodeship
    Sources {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Validate configuration and registry
    Validate,

    /// Show the latest stored result
    Info,
}

#[derive(Args, Debug, Default)]
struct SelectionArgs {
    /// Source id; repeatable
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Voivodeship name; repeatable
    #[arg(long = "voivodeship")]
    voivodeships: Vec<String>,

    /// Administrative tier (gdos, rdos, powiaty, gminy_wiejskie, ...); repeatable
    #[arg(long = "tier")]
    tiers: Vec<AdministrativeTier>,
}

impl From<SelectionArgs> for SourceSelection {
    fn from(args: SelectionArgs) -> Self {
        Self {
            ids: args.sources,
            voivodeships: args.voivodeships,
            tiers: args.tiers,
        }
    }
}

/// Initialize logging; `RUST_LOG` takes precedence over `level`.
fn init_logging(level: LevelFilter) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.to_string()))
        .format_timestamp_secs()
        .init();
}

fn load_config(path: &Path, verbose: bool) -> Config {
    let loaded = Config::load(path);
    let level = match (&loaded, verbose) {
        (_, true) => LevelFilter::Debug,
        (Ok(config), false) => parse_level(&config.logging.level),
        (Err(_), false) => LevelFilter::Info,
    };
    init_logging(level);

    loaded.unwrap_or_else(|e| {
        log::warn!("Config load failed from {}: {e}. Using defaults.", path.display());
        Config::default()
    })
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config, cli.verbose);
    let storage = LocalStorage::new(&config.output.dir);

    match cli.command {
        Command::Crawl {
            from,
            to,
            categories,
            selection,
        } => {
            config.validate()?;
            let registry = Arc::new(SourceRegistry::load(&cli.registry)?);

            let to = to.unwrap_or_else(|| Local::now().date_naive());
            let from = from
                .or_else(|| to.checked_sub_days(Days::new(30)))
                .unwrap_or(to);
            let request = RunRequest::new(DateRange::new(from, to)?)
                .with_categories(categories)
                .with_selection(selection.into());

            let result = crawl(&config, registry, request).await?;
            let written = storage.write_result(&result).await?;
            report(&result);
            log::info!("Snapshot: {}", written.snapshot_location);
        }

        Command::Sources { selection } => {
            let registry = SourceRegistry::load(&cli.registry)?;
            let selection = SourceSelection::from(selection);
            let selected = selection.apply(&registry);

            header("Source registry");
            log::info!("{} of {} sources selected", selected.len(), registry.len());
            separator();
            for (tier, count) in registry.count_by_tier() {
                log::info!("  {:<28} {count:>5}", tier.group_key());
            }
            separator();
            for (voivodeship, count) in registry.count_by_voivodeship() {
                log::info!("  {voivodeship:<28} {count:>5}");
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {e}");
                return Err(e);
            }
            PageExtractor::new(&config.extraction)?;
            log::info!(
                "✓ Config OK ({} listing patterns, {} category rules)",
                config.extraction.listing_patterns.len(),
                config.classification.rules.len()
            );

            let registry = SourceRegistry::load(&cli.registry)?;
            log::info!("✓ Registry OK ({} sources)", registry.len());
        }

        Command::Info => {
            log::info!("Result directory: {}", storage.root().display());
            let snapshots = storage.list_snapshots().await?;
            log::info!("Stored runs: {}", snapshots.len());
            match storage.load_latest().await? {
                Some(result) => report(&result),
                None => log::info!("No result found yet."),
            }
        }
    }

    Ok(())
}

/// Run a crawl in the background, logging progress until it ends.
async fn crawl(
    config: &Config,
    registry: Arc<SourceRegistry>,
    request: RunRequest,
) -> Result<ResultAggregate> {
    let throttle = Arc::new(HostThrottle::new(Duration::from_millis(
        config.run.min_host_spacing_ms,
    )));
    let fetcher = Arc::new(HttpFetcher::new(&config.crawler, throttle)?);
    let extractor = Arc::new(PageExtractor::new(&config.extraction)?);
    let classifier = Arc::new(Classifier::new(&config.classification));
    let orchestrator = Orchestrator::new(
        registry,
        config.run.clone(),
        fetcher,
        extractor,
        classifier,
    );

    header("BIP crawl");
    let handle = orchestrator.start(request)?;

    let token = handle.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; stopping the run and keeping merged records");
            token.cancel();
        }
    });

    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.run.progress_interval_secs.max(1)));
    ticker.tick().await;
    while !handle.is_finished() {
        tokio::select! {
            _ = ticker.tick() => log_progress(&handle.progress()),
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
        }
    }

    let result = handle.wait().await?;
    if result.metadata.status == RunStatus::Cancelled {
        log::warn!(
            "Run cancelled: {} sources left unfinished",
            result.metadata.sources_abandoned
        );
    }
    Ok(result)
}

fn log_progress(snap: &ProgressSnapshot) {
    log::info!(
        "[{:>5.1}%] {}/{} sources done ({} failed), {} records, {}s",
        snap.fraction() * 100.0,
        snap.sources_completed,
        snap.sources_total,
        snap.sources_failed,
        snap.records_found,
        snap.elapsed.as_secs()
    );
}

fn report(result: &ResultAggregate) {
    let meta = &result.metadata;
    let mut items = vec![
        ("Status", meta.status.to_string()),
        ("Date range", format!("{} .. {}", meta.date_range.from, meta.date_range.to)),
        ("Sources attempted", meta.sources_attempted.to_string()),
        ("Sources succeeded", meta.sources_succeeded.to_string()),
        ("Sources failed", meta.sources_failed.to_string()),
        ("Sources abandoned", meta.sources_abandoned.to_string()),
        (
            "Pages fetched",
            format!(
                "{} ({} degraded, {} failed)",
                meta.pages_fetched, meta.degraded_pages, meta.pages_failed
            ),
        ),
        ("Records", result.len().to_string()),
        ("Needs review", result.needs_review().to_string()),
    ];
    for (category, count) in result.count_by_category() {
        items.push((category.label(), count.to_string()));
    }
    summary("Run result", &items);

    for failure in result.failures.iter().take(20) {
        log::warn!("  {} ({}): {}", failure.source_id, failure.source_name, failure.error);
    }
    if result.failures.len() > 20 {
        log::warn!("  ... and {} more failed sources", result.failures.len() - 20);
    }
}
