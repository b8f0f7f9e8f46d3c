use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use value_investing::analysis::screening::{calculate_returns, mean_returns};
use value_investing::api::{build_http_client, PriceHistoryProvider, YahooClient};
use value_investing::models::{Config, PriceTable};
use value_investing::utils::{Interval, Period};

/// Print recent adjusted closes and log-return statistics for one ticker
#[derive(Parser)]
#[command(name = "fetch_history")]
struct Args {
    ticker: String,

    #[arg(long, default_value = "1y")]
    period: Period,

    #[arg(long, default_value = "1d")]
    interval: Interval,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("value_investing=info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::from_env()?;
    let yahoo = YahooClient::new(build_http_client(&config)?, &config);

    info!("📈 Fetching {} {} history for {}", args.period, args.interval, args.ticker);
    let points = yahoo.get_price_history(&args.ticker, args.period, args.interval).await?;
    if points.is_empty() {
        println!("No price data for {}", args.ticker);
        return Ok(());
    }

    println!("\n📊 {} Adjusted Closes:", args.ticker);
    println!("Date           | Adj Close");
    println!("---------------|------------");
    for point in points.iter().rev().take(10).rev() {
        println!("{}     | ${:.2}", point.date, point.adj_close);
    }

    let returns = calculate_returns(&PriceTable::from_series(vec![(args.ticker.clone(), points.clone())]));
    let first_price = points[0].adj_close;
    let last_price = points[points.len() - 1].adj_close;
    let max_price = points.iter().map(|p| p.adj_close).fold(f64::NEG_INFINITY, f64::max);
    let min_price = points.iter().map(|p| p.adj_close).fold(f64::INFINITY, f64::min);

    println!("\n📈 Statistics:");
    println!("First Price:      ${:.2}", first_price);
    println!("Last Price:       ${:.2}", last_price);
    println!("Total Return:     {:.1}%", (last_price - first_price) / first_price * 100.0);
    println!("Highest Price:    ${:.2}", max_price);
    println!("Lowest Price:     ${:.2}", min_price);
    if let Some((_, mean)) = mean_returns(&returns).first() {
        println!("Mean Log Return:  {:.6}", mean);
    }
    println!("Total Records:    {}", points.len());

    Ok(())
}
