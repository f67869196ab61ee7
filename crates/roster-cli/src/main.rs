use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use roster_client::{FsArtifactStore, HttpRenderer, JsonlSink};
use roster_core::config::StartUrl;
use roster_core::export;
use roster_core::traits::{ArtifactStore, RecordSink, Renderer};
use roster_core::{
    CrawlConfig, Crawler, MemoryWorkQueue, RunSummary, TracingWorkerReporter, WorkerPool,
};

const EXPORT_ARTIFACT: &str = "brevo.csv";
const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

#[derive(Parser)]
#[command(name = "roster", version, about = "Agent directory crawler and contact exporter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the listing pages and export the contacts found
    Crawl(CrawlArgs),

    /// Re-export a CSV from an existing records file without crawling
    Export {
        /// JSON-lines records file written by a previous crawl
        #[arg(short, long, env = "ROSTER_RECORDS")]
        records: PathBuf,

        /// Destination CSV file
        #[arg(short, long, env = "ROSTER_OUTPUT")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct CrawlArgs {
    /// JSON input file (camelCase `CrawlConfig`); flags below override it
    #[arg(short, long, env = "ROSTER_INPUT")]
    input: Option<PathBuf>,

    /// Listing URL to start from (repeatable; replaces the input's startUrls)
    #[arg(short = 'u', long = "start-url", env = "ROSTER_START_URLS", value_delimiter = ',')]
    start_urls: Vec<String>,

    /// Highest listing page index to visit
    #[arg(long, env = "ROSTER_MAX_PAGES")]
    max_pages: Option<u32>,

    /// Number of concurrent workers
    #[arg(short = 'c', long, env = "ROSTER_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// Stop discovering listing work after this many records
    #[arg(long, env = "ROSTER_MAX_RECORDS")]
    max_records: Option<u64>,

    /// Run every link strategy instead of stopping at the first that finds links
    #[arg(long, env = "ROSTER_EXHAUSTIVE_LINKS")]
    exhaustive_links: bool,

    /// Proxy URL for every navigation (http, https or socks5)
    #[arg(long, env = "ROSTER_PROXY")]
    proxy: Option<String>,

    /// Directory for the records file and run artifacts
    #[arg(long, env = "ROSTER_OUT_DIR", default_value = "roster-output")]
    out_dir: PathBuf,

    /// CSV destination (defaults to <out-dir>/contacts.csv)
    #[arg(short, long, env = "ROSTER_OUTPUT")]
    output: Option<PathBuf>,

    /// Render pages in headless Chromium instead of plain HTTP
    #[cfg(feature = "browser")]
    #[arg(long, env = "ROSTER_BROWSER")]
    browser: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("roster=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl(args) => cmd_crawl(args).await?,
        Commands::Export { records, output } => cmd_export(&records, &output).await?,
    }

    Ok(())
}

/// Reads the input file (if any) and applies flag overrides on top.
fn load_config(args: &CrawlArgs) -> Result<CrawlConfig> {
    let mut config = match &args.input {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read input file: {}", path.display()))?;
            CrawlConfig::from_json(&raw)
                .with_context(|| format!("Invalid input file: {}", path.display()))?
        }
        None => CrawlConfig::default(),
    };

    if !args.start_urls.is_empty() {
        config.start_urls = args
            .start_urls
            .iter()
            .map(|url| StartUrl::Plain(url.clone()))
            .collect();
    }
    if let Some(max_pages) = args.max_pages {
        config.max_pages = max_pages;
    }
    if let Some(max_concurrency) = args.max_concurrency {
        config.max_concurrency = max_concurrency;
    }
    if args.max_records.is_some() {
        config.max_records = args.max_records;
    }
    if args.exhaustive_links {
        config.exhaustive_links = true;
    }
    if args.proxy.is_some() {
        config.proxy = args.proxy.clone();
    }

    config.validate().context("Invalid crawl configuration")?;
    Ok(config)
}

async fn cmd_crawl(args: CrawlArgs) -> Result<()> {
    let config = load_config(&args)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.out_dir.join("contacts.csv"));

    let records_path = args.out_dir.join("records.jsonl");
    if records_path.exists() {
        tracing::info!(path = %records_path.display(), "Replacing records from a previous run");
        std::fs::remove_file(&records_path).with_context(|| {
            format!("Failed to clear records file: {}", records_path.display())
        })?;
    }
    let sink = JsonlSink::new(&records_path);
    let artifacts = FsArtifactStore::new(args.out_dir.join("artifacts"));
    let navigation_timeout = Duration::from_secs(config.navigation_timeout_secs);

    #[cfg(feature = "browser")]
    if args.browser {
        tracing::info!("Launching headless browser");
        let renderer =
            roster_client::BrowserRenderer::launch(navigation_timeout, config.proxy.as_deref())
                .await
                .context("Failed to launch browser")?;
        let summary = run_crawl(&config, renderer, sink.clone(), artifacts.clone()).await?;
        return finish(&summary, &sink, &artifacts, &output).await;
    }

    let renderer = HttpRenderer::with_timeout(navigation_timeout, config.proxy.as_deref())
        .context("Failed to create HTTP client")?;
    let summary = run_crawl(&config, renderer, sink.clone(), artifacts.clone()).await?;
    finish(&summary, &sink, &artifacts, &output).await
}

async fn run_crawl<R: Renderer + 'static>(
    config: &CrawlConfig,
    renderer: R,
    sink: JsonlSink,
    artifacts: FsArtifactStore,
) -> Result<RunSummary> {
    let crawler = Crawler::new(config, renderer, MemoryWorkQueue::new(), sink, artifacts)
        .context("Failed to build crawler")?;

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            ctrl_c_token.cancel();
        }
    });

    let summary = WorkerPool::new(config.max_concurrency)
        .with_handler_timeout(Duration::from_secs(config.handler_timeout_secs))
        .run(Arc::new(crawler), cancel_token, Arc::new(TracingWorkerReporter))
        .await
        .context("Crawl failed")?;

    Ok(summary)
}

/// Exports the sink to CSV and stores the artifact copy.
async fn finish(
    summary: &RunSummary,
    sink: &JsonlSink,
    artifacts: &FsArtifactStore,
    output: &Path,
) -> Result<()> {
    let csv = export_records(sink, output).await?;
    artifacts
        .put(EXPORT_ARTIFACT, csv.as_bytes(), CSV_CONTENT_TYPE)
        .await
        .context("Failed to store export artifact")?;

    println!(
        "Processed {} pages ({} failed, {} contact-page hops){}",
        summary.processed,
        summary.failed,
        summary.fallback_hops,
        if summary.cancelled { ", interrupted" } else { "" }
    );
    println!(
        "Wrote {} contacts to {} ({:.1}s)",
        summary.records,
        output.display(),
        summary.elapsed.as_secs_f64()
    );
    Ok(())
}

async fn cmd_export(records: &Path, output: &Path) -> Result<()> {
    if !records.exists() {
        anyhow::bail!("Records file not found: {}", records.display());
    }
    let sink = JsonlSink::new(records);
    let csv = export_records(&sink, output).await?;
    let rows = csv.lines().count().saturating_sub(1);
    println!("Wrote {rows} contacts to {}", output.display());
    Ok(())
}

/// Writes the deduplicated CSV (header only when there are no records) and
/// returns its contents.
async fn export_records(sink: &JsonlSink, output: &Path) -> Result<String> {
    let records = sink.records().await.context("Failed to read records")?;
    let rows = export::dedupe(&records);
    let csv = export::to_csv_string(&rows).context("Failed to build CSV")?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(output, &csv)
        .with_context(|| format!("Failed to write CSV: {}", output.display()))?;

    tracing::info!(
        records = records.len(),
        rows = rows.len(),
        path = %output.display(),
        "Export written"
    );
    Ok(csv)
}
