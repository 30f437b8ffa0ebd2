//! Magic Formula screener command-line entry point.
//!
//! Two stages, run as separate invocations with the intermediate CSV as
//! the hand-off between them:
//!
//! - `fetch`: listing feeds → ticker universe → per-ticker fundamentals →
//!   `magic_formula_<exchange>_<DDMMYYYY>.csv`
//! - `rank`: intermediate CSV → `ranking_magic_formula_<exchange>.csv` and a
//!   preview of the top rows.

use anyhow::Result;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use magic_formula::config::AppConfig;
use magic_formula::engine::batch::BatchRunner;
use magic_formula::engine::extractor::FundamentalsExtractor;
use magic_formula::engine::ranker;
use magic_formula::listing::HttpListingSource;
use magic_formula::provider::yahoo::YahooClient;
use magic_formula::provider::FinancialDataProvider;
use magic_formula::storage;
use magic_formula::universe::UniverseBuilder;

#[derive(Debug, Parser)]
#[command(
    name = "magic-formula",
    version,
    about = "Rank listed companies by earnings yield and return on capital"
)]
struct Cli {
    /// Path to the TOML configuration file (defaults apply if it is missing).
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the ticker universe and fetch fundamentals for every ticker.
    Fetch(FetchArgs),
    /// Rank a fundamentals dataset and print the top rows.
    Rank(RankArgs),
}

#[derive(Debug, Args)]
struct FetchArgs {
    /// Process at most N tickers (0 = all).
    #[arg(long)]
    max_tickers: Option<usize>,

    /// Pause between provider calls, in seconds.
    #[arg(long)]
    sleep_seconds: Option<f64>,

    /// Directory for the dated fundamentals CSV.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RankArgs {
    /// Fundamentals CSV to rank (default: today's file in the output dir).
    #[arg(long)]
    input: Option<PathBuf>,

    /// Ranked CSV to write.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let cfg = AppConfig::load_or_default(&cli.config)?;

    init_logging();

    match cli.command {
        Command::Fetch(args) => fetch(cfg, args).await,
        Command::Rank(args) => rank(cfg, args),
    }
}

async fn fetch(mut cfg: AppConfig, args: FetchArgs) -> Result<()> {
    if args.max_tickers.is_some() {
        cfg.universe.max_tickers = args.max_tickers;
    }
    if let Some(secs) = args.sleep_seconds {
        cfg.batch.sleep_seconds = secs;
    }
    if let Some(dir) = args.output_dir {
        cfg.batch.output_dir = dir;
    }
    cfg.validate()?;

    let listings = HttpListingSource::new(cfg.provider.timeout_secs, &cfg.provider.user_agent)?;
    let tickers = UniverseBuilder::new(&cfg.universe)
        .build(&listings, &cfg.universe)
        .await?;

    let provider = YahooClient::new(&cfg.provider)?;
    info!(
        provider = provider.name(),
        tickers = tickers.len(),
        exchange = %cfg.universe.exchange,
        max_tickers = ?cfg.max_tickers(),
        "Fetching fundamentals"
    );

    let extractor = FundamentalsExtractor::new(Box::new(provider), cfg.batch.missing_policy);
    let runner = BatchRunner::with_delay_secs(extractor, cfg.batch.sleep_seconds)?;
    let report = runner.run(&tickers).await;

    let path = report.persist(
        &cfg.batch.output_dir,
        &cfg.universe.exchange_label,
        Local::now().date_naive(),
    )?;
    info!(path = %path.display(), records = report.records.len(), "File saved");
    Ok(())
}

fn rank(cfg: AppConfig, args: RankArgs) -> Result<()> {
    let label = &cfg.universe.exchange_label;
    let input = args
        .input
        .or(cfg.ranking.input_path.clone())
        .unwrap_or_else(|| {
            cfg.batch
                .output_dir
                .join(storage::intermediate_filename(label, Local::now().date_naive()))
        });
    let output = args
        .output
        .or(cfg.ranking.output_path.clone())
        .unwrap_or_else(|| cfg.batch.output_dir.join(storage::ranked_filename(label)));

    let ranked = ranker::rank_file(&input, &output)?;
    println!("{}", ranker::format_preview(&ranked, cfg.ranking.preview_rows));
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("magic_formula=info"));

    let json_logging = std::env::var("MAGIC_FORMULA_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
