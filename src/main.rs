use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use cobh_events::apis::{InCobhCrawler, PortOfCorkCrawler};
use cobh_events::app::collect_use_case::{CollectUseCase, RunSummary};
use cobh_events::app::ports::PageFetcher;
use cobh_events::config::Config;
use cobh_events::infra::calendar_sink::NdjsonCalendarSink;
use cobh_events::infra::http_client::ReqwestFetcher;
use cobh_events::types::EventSource;
use cobh_events::{logging, metrics};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Parser)]
#[command(name = "cobh_events")]
#[command(about = "Cobh events and cruise calls calendar builder")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output file, overriding output.path from the config
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Directory for the rolling JSON log
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect from every source and write the calendar
    Run,
    /// Collect from the InCobh event listings only
    Listings,
    /// Collect from the Port of Cork cruise schedule only
    Cruises,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Config::load(Path::new(DEFAULT_CONFIG_PATH)).context("loading config.toml")
        }
        None => Ok(Config::default()),
    }
}

fn print_summary(summary: &RunSummary, output: &Path) {
    println!("\n📊 Collection results:");
    for report in &summary.reports {
        match &report.error {
            None => println!(
                "   {}: {} records, {} pages, {} dropped",
                report.source, report.records, report.pages, report.dropped
            ),
            Some(e) if report.unreachable => println!("   {}: unreachable ({})", report.source, e),
            Some(e) => println!("   {}: failed ({})", report.source, e),
        }
    }
    println!("   Duplicates removed: {}", summary.duplicates_removed);
    println!("   Events written: {}", summary.emitted);
    println!("   Output file: {}", output.display());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    logging::init_logging(&cli.log_dir);
    if metrics::init_metrics() {
        info!("Metrics exporter enabled");
    }

    let config = load_config(cli.config.as_deref())?;
    let fetcher: Arc<dyn PageFetcher> = Arc::new(ReqwestFetcher::new(&config.http)?);

    let mut sources: Vec<Box<dyn EventSource>> = Vec::new();
    if matches!(cli.command, Commands::Run | Commands::Listings) {
        sources.push(Box::new(InCobhCrawler::new(Arc::clone(&fetcher), &config)?));
    }
    if matches!(cli.command, Commands::Run | Commands::Cruises) {
        sources.push(Box::new(PortOfCorkCrawler::new(Arc::clone(&fetcher), &config)));
    }

    let output = cli.output.clone().unwrap_or_else(|| config.output.path.clone());
    let sink = NdjsonCalendarSink::new(&config.output, &config.time, chrono::Utc::now())
        .with_path(output.clone());

    match CollectUseCase::new(sources, Arc::new(sink)).run().await {
        Ok(summary) => {
            print_summary(&summary, &output);
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}
