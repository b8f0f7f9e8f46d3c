use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use value_investing::analysis::AnalysisEngine;
use value_investing::data_collector::DataCollector;
use value_investing::models::Config;
use value_investing::utils::{Interval, Period};

/// Value investing screen over the S&P 500
#[derive(Parser)]
#[command(name = "value-investing")]
#[command(version)]
#[command(about = "Screen S&P 500 stocks by P/E and P/B, score tweet sentiment and forecast prices")]
#[command(long_about = "
Two runs share one SQLite database:

  collect   scrape the S&P 500 list and each ticker's trailing P/E and
            price/book ratio, then rebuild the ratio table
  analyze   screen the ratio table into low and high valuation cohorts,
            download prices, score tweet sentiment for the value cohort
            and forecast prices for tickers with net positive sentiment

Examples:
  value-investing collect
  value-investing --db ratios.db analyze --period 2y --interval 1d
")]
struct Cli {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape tickers and ratios and rebuild the ratio table
    Collect,
    /// Screen, score sentiment and forecast
    Analyze {
        /// Price history range (1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max)
        #[arg(long)]
        period: Option<Period>,

        /// Bar interval (1d, 5d, 1wk, 1mo, 3mo)
        #[arg(long)]
        interval: Option<Interval>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("value_investing=info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("❌ Configuration Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    match cli.command {
        Command::Collect => {
            let collector = DataCollector::from_config(config)?;
            let summary = collector.run_initial_collection().await?;
            println!(
                "✅ {} tickers scraped, {} ratios kept in the ratio table",
                summary.tickers, summary.remaining
            );
        }
        Command::Analyze { period, interval } => {
            if let Some(period) = period {
                config.time_period = period.to_string();
            }
            if let Some(interval) = interval {
                config.interval = interval.to_string();
            }

            let engine = match AnalysisEngine::from_config(config).await {
                Ok(engine) => engine,
                Err(e) => {
                    error!("Failed to start analysis: {}", e);
                    eprintln!("❌ {}", e);
                    std::process::exit(1);
                }
            };
            let report = engine.run().await?;
            info!(
                "🎉 {} value stocks screened, {} picked",
                report.low_pe_pb.len(),
                report.picks.len()
            );
        }
    }

    Ok(())
}
