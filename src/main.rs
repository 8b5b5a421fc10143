use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use browser_session::{BrowserSession, ChromiumSession};
use clap::{Args, Parser, Subcommand};
use ecotox_harvester::{load_config, BatchRunner, HarvestConfig, LoadedConfig, ResultLogs};
use ecotox_query::QueryDriver;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    " ",
    env!("GIT_BRANCH"),
    ", built ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the configured batch against the live search page
    Run(RunArgs),

    /// Validate configuration and batch lists without launching a browser
    Check,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Override the configured headless setting
    #[arg(long)]
    headless: Option<bool>,

    /// Detail log path
    #[arg(long, value_name = "FILE")]
    detail_log: Option<PathBuf>,

    /// Result matrix path
    #[arg(long, value_name = "FILE")]
    result_matrix: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.debug)?;

    info!("Starting ecotox-harvester v{}", env!("CARGO_PKG_VERSION"));
    let loaded = load_config(cli.config.as_ref()).await?;

    let outcome = match cli.command {
        Command::Run(args) => cmd_run(loaded, args).await,
        Command::Check => cmd_check(&loaded),
    };

    match outcome {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}

fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

fn cmd_check(loaded: &LoadedConfig) -> Result<()> {
    let config = &loaded.config;
    config.timeouts.to_query_timeouts()?;
    config.batch.check()?;

    println!("Configuration: {}", loaded.path.display());
    println!("Planned queries: {}", config.batch.query_count());
    println!("Endpoint matching: {:?}", config.matching.endpoint_match);
    println!("Detail log: {}", config.output.detail_log.display());
    println!("Result matrix: {}", config.output.result_matrix.display());
    info!(queries = config.batch.query_count(), "configuration is valid");
    Ok(())
}

async fn cmd_run(loaded: LoadedConfig, args: RunArgs) -> Result<()> {
    let mut config: HarvestConfig = loaded.config;
    if let Some(headless) = args.headless {
        config.browser.headless = headless;
    }
    if let Some(path) = args.detail_log {
        config.output.detail_log = path;
    }
    if let Some(path) = args.result_matrix {
        config.output.result_matrix = path;
    }

    let timeouts = config.timeouts.to_query_timeouts()?;
    let runner = BatchRunner::new(&config.batch)?;
    let mut logs = ResultLogs::open(&config.output.detail_log, &config.output.result_matrix).await?;

    info!(
        headless = config.browser.headless,
        start_url = %config.browser.start_url,
        "launching browser"
    );
    let session = Arc::new(
        ChromiumSession::launch(config.browser.clone())
            .await
            .context("Failed to start browser session")?,
    );

    let port: Arc<dyn BrowserSession> = session.clone();
    let mut driver = QueryDriver::new(port)
        .with_timeouts(timeouts)
        .with_endpoint_match(config.matching.endpoint_match);
    let outcome = runner.run(&mut driver, &mut logs).await;
    drop(driver);

    match Arc::try_unwrap(session) {
        Ok(session) => session.shutdown().await,
        Err(_) => warn!("browser session still shared; skipping shutdown"),
    }

    let summary = outcome?;
    println!(
        "Completed {} queries ({} without accepted values)",
        summary.queries, summary.empty_queries
    );
    Ok(())
}
