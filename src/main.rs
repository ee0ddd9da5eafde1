use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use phishtank_stats_lib::application::{Orchestrator, RunError};
use phishtank_stats_lib::infrastructure::config::CrawlerConfig;
use phishtank_stats_lib::infrastructure::logging::init_logging_with_config;

#[derive(Parser, Debug)]
#[command(
    name = "phishtank-stats",
    about = "Collect PhishTank monthly statistics into a metric/year/month time series",
    version,
    long_about = None
)]
struct Args {
    /// Configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First year to fetch
    #[arg(long)]
    first_year: Option<u16>,

    /// Last year to fetch
    #[arg(long)]
    last_year: Option<u16>,

    /// Maximum concurrent fetches
    #[arg(short = 'k', long)]
    concurrency: Option<usize>,

    /// Output file for the aggregate
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Continue from an existing output file, skipping months already present
    #[arg(long)]
    resume: bool,

    /// Print every failed URL with its reason
    #[arg(long)]
    list_failures: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| CrawlerConfig::default_config_path().filter(|path| path.exists()))
    }

    fn apply(&self, config: &mut CrawlerConfig) {
        if let Some(year) = self.first_year {
            config.source.first_year = year;
        }
        if let Some(year) = self.last_year {
            config.source.last_year = year;
        }
        if let Some(k) = self.concurrency {
            config.workers.max_concurrent = k;
        }
        if let Some(path) = &self.output {
            config.output.path.clone_from(path);
        }
        if self.resume {
            config.output.resume = true;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config_path = args.config_path();
    let mut config = CrawlerConfig::load_unvalidated(config_path.as_deref())
        .with_context(|| format!("Failed to load configuration from {config_path:?}"))?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging_with_config(&config.logging)?;
    if let Some(path) = &config_path {
        info!("Loaded configuration from {:?}", path);
    }

    let orchestrator = Orchestrator::with_http(config)?;

    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight pages");
            token.cancel();
        }
    });

    match orchestrator.run().await {
        Ok(summary) => {
            if args.list_failures {
                println!("{}", summary.detailed());
            } else {
                println!("{summary}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(RunError::Persist { source, summary }) => {
            error!("Aggregate could not be written: {}", source);
            println!("{}", summary.detailed());
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
