pub mod forecast;
pub mod screening;
pub mod sentiment;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::api::{build_http_client, PriceHistoryProvider, TweetSearch, TwitterClient, YahooClient};
use crate::data_collector::download_price_data;
use crate::database_sqlx::DatabaseManagerSqlx;
use crate::models::{Config, PricePoint, PriceTable, RatioRecord, SentimentCounts, StockPick};
use crate::utils::{round2, Interval, Period};

use forecast::{FittedForecast, TrendForecaster};
use screening::ScreeningFigures;

/// Ratios older than this trigger a warning before screening
const STALE_RATIOS_DAYS: i64 = 30;

/// Age of the ratio table as judged before screening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioFreshness {
    Fresh(i64),
    Stale(i64),
    Unknown,
}

/// Everything an analysis run produced
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub figures: ScreeningFigures,
    pub low_pe_pb: Vec<String>,
    pub high_pe_pb: Vec<String>,
    pub low_returns: PriceTable,
    pub high_returns: PriceTable,
    pub sentiment: Vec<SentimentCounts>,
    pub picks: Vec<StockPick>,
}

/// Screening, sentiment and forecasting over a collected ratio table
pub struct AnalysisEngine {
    database: DatabaseManagerSqlx,
    prices: Box<dyn PriceHistoryProvider + Send + Sync>,
    tweets: Box<dyn TweetSearch + Send + Sync>,
    forecaster: TrendForecaster,
    config: Config,
}

impl AnalysisEngine {
    pub fn new(
        database: DatabaseManagerSqlx,
        prices: Box<dyn PriceHistoryProvider + Send + Sync>,
        tweets: Box<dyn TweetSearch + Send + Sync>,
        config: Config,
    ) -> Self {
        Self {
            database,
            prices,
            tweets,
            forecaster: TrendForecaster::default(),
            config,
        }
    }

    /// Open the existing database and wire up the Yahoo and Twitter clients
    pub async fn from_config(config: Config) -> Result<Self> {
        let database = DatabaseManagerSqlx::new(&config.database_path).await?;
        let http = build_http_client(&config)?;
        let yahoo = YahooClient::new(http.clone(), &config);
        let twitter = TwitterClient::new(http, &config)?;

        Ok(Self::new(database, Box::new(yahoo), Box::new(twitter), config))
    }

    pub async fn run(&self) -> Result<AnalysisReport> {
        let period: Period = self.config.time_period.parse()?;
        let interval: Interval = self.config.interval.parse()?;
        let forecast_period: Period = self.config.forecast_period.parse()?;

        info!("🚀 Starting analysis run (period {}, interval {})", period, interval);
        self.warn_if_stale().await;

        let ratios = self.database.get_existing_data().await?;
        let figures = screening::calculate_figures(&ratios);
        info!(
            "📊 {} stocks remaining, 10th percentile cut {}, 90th percentile cut {}",
            figures.num_remaining_stocks, figures.ten_perc, figures.ninety_perc
        );

        let low_pe_pb = screening::get_low_pe_pb_stocks(&ratios, figures.ten_perc);
        let high_pe_pb = screening::get_high_pe_pb_stocks(&ratios, figures.ninety_perc);
        info!("💎 Low P/E and P/B stocks ({}): {:?}", low_pe_pb.len(), low_pe_pb);
        info!("🎈 High P/E and P/B stocks ({}): {:?}", high_pe_pb.len(), high_pe_pb);

        let low_prices = download_price_data(self.prices.as_ref(), &low_pe_pb, period, interval).await;
        let high_prices = download_price_data(self.prices.as_ref(), &high_pe_pb, period, interval).await;
        let low_returns = screening::calculate_returns(&low_prices);
        let high_returns = screening::calculate_returns(&high_prices);
        log_mean_returns("low", &low_returns);
        log_mean_returns("high", &high_returns);

        // Twitter rejects an end_time too close to the request time
        let end_time = Utc::now() - Duration::seconds(30);
        let start_time = end_time - interval.duration();
        let sentiment =
            sentiment::twitter_analysis(self.tweets.as_ref(), &low_pe_pb, start_time, end_time).await?;

        let picks = self.prophet_price_prediction(&sentiment, &ratios, forecast_period).await?;
        print_picks(&picks);

        info!("✅ Analysis complete: {} pick(s)", picks.len());
        Ok(AnalysisReport {
            figures,
            low_pe_pb,
            high_pe_pb,
            low_returns,
            high_returns,
            sentiment,
            picks,
        })
    }

    /// Log the age of the ratio table. An unreadable collection date is not fatal.
    pub async fn warn_if_stale(&self) -> RatioFreshness {
        match self.database.days_since_collection().await {
            Ok(Some(days)) if days > STALE_RATIOS_DAYS => {
                warn!("⚠️  Ratios were collected {} days ago; consider running `collect` again", days);
                RatioFreshness::Stale(days)
            }
            Ok(Some(days)) => {
                debug!("Ratios collected {} days ago", days);
                RatioFreshness::Fresh(days)
            }
            Ok(None) => {
                warn!("⚠️  No collection date recorded for the ratio table");
                RatioFreshness::Unknown
            }
            Err(e) => {
                warn!("⚠️  Unreadable collection date for the ratio table: {}", e);
                RatioFreshness::Unknown
            }
        }
    }

    /// Forecast each net-positive ticker and keep those whose trend rises
    pub async fn prophet_price_prediction(
        &self,
        sentiment: &[SentimentCounts],
        ratios: &[RatioRecord],
        period: Period,
    ) -> Result<Vec<StockPick>> {
        let positive: Vec<&str> = sentiment
            .iter()
            .filter(|c| c.is_net_positive())
            .map(|c| c.ticker())
            .collect();
        let negative: Vec<&str> = sentiment
            .iter()
            .filter(|c| c.is_net_negative())
            .map(|c| c.ticker())
            .collect();
        info!("👍 {} stocks with net positive sentiment: {:?}", positive.len(), positive);
        info!("👎 {} stocks with net negative sentiment: {:?}", negative.len(), negative);

        let ratio_lookup: HashMap<&str, &RatioRecord> =
            ratios.iter().map(|r| (r.ticker.as_str(), r)).collect();
        let mut picks = Vec::new();

        for ticker in positive {
            let Some(ratio) = ratio_lookup.get(ticker) else {
                warn!("⚠️  {} not found in ratio table, skipping", ticker);
                continue;
            };

            let history = match self.prices.get_price_history(ticker, period, Interval::Daily).await {
                Ok(history) => history,
                Err(e) => {
                    warn!("❌ Price download failed for {}: {}", ticker, e);
                    continue;
                }
            };

            let model = match self.forecaster.fit(&history) {
                Ok(model) => model,
                Err(e) => {
                    warn!("❌ Cannot forecast {}: {}", ticker, e);
                    continue;
                }
            };

            let last_date = model.last_date();
            let horizon_end = last_date + Duration::days(self.config.forecast_horizon_days);
            let current_price = round2(model.trend(last_date));
            let predicted_price = round2(model.trend(horizon_end));
            info!("🔮 {}: trend {:.2} now, {:.2} on {}", ticker, current_price, predicted_price, horizon_end);

            if let Some(dir) = &self.config.output_dir {
                if let Err(e) = write_forecast_csv(dir, ticker, &history, &model, self.config.forecast_horizon_days) {
                    warn!("❌ Could not write forecast for {}: {}", ticker, e);
                }
            }

            if predicted_price <= current_price {
                continue;
            }

            let price_increase_pct = round2((predicted_price - current_price) / current_price * 100.0);
            let backtest_mae = match self.forecaster.backtest(&history, self.config.backtest_days) {
                Ok(backtest) => {
                    info!("📐 {} backtest MAE over {} days: {:.4}", ticker, self.config.backtest_days, backtest.mae);
                    if let Some(dir) = &self.config.output_dir {
                        if let Err(e) = write_backtest_csv(dir, ticker, &backtest) {
                            warn!("❌ Could not write backtest for {}: {}", ticker, e);
                        }
                    }
                    Some(backtest.mae)
                }
                Err(e) => {
                    warn!("⚠️  Backtest skipped for {}: {}", ticker, e);
                    None
                }
            };

            picks.push(StockPick {
                ticker: ticker.to_string(),
                pe_ratio: ratio.pe,
                pb_ratio: ratio.pb,
                current_price,
                predicted_price,
                price_increase_pct,
                backtest_mae,
            });
        }

        Ok(picks)
    }
}

fn log_mean_returns(cohort: &str, returns: &PriceTable) {
    if returns.tickers.is_empty() {
        return;
    }
    info!("📈 {} log returns over {} periods", cohort, returns.len());
    for (ticker, mean) in screening::mean_returns(returns) {
        debug!("{} mean log return: {:.6}", ticker, mean);
    }
}

#[derive(Serialize)]
struct ForecastRow {
    ds: NaiveDate,
    y: Option<f64>,
    yhat: f64,
    trend: f64,
}

#[derive(Serialize)]
struct BacktestRow {
    ds: NaiveDate,
    actual: f64,
    predicted: f64,
}

fn write_forecast_csv(
    dir: &Path,
    ticker: &str,
    history: &[PricePoint],
    model: &FittedForecast,
    horizon_days: i64,
) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}_forecast.csv", ticker));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let observed: HashMap<NaiveDate, f64> = history.iter().map(|p| (p.date, p.adj_close)).collect();
    let dates = model.make_future_dates(history, horizon_days);
    for point in model.forecast(&dates) {
        writer.serialize(ForecastRow {
            ds: point.ds,
            y: observed.get(&point.ds).copied(),
            yhat: point.yhat,
            trend: point.trend,
        })?;
    }
    writer.flush()?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn write_backtest_csv(dir: &Path, ticker: &str, backtest: &forecast::Backtest) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}_backtest.csv", ticker));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for ((ds, actual), predicted) in backtest
        .dates
        .iter()
        .zip(backtest.actual.iter())
        .zip(backtest.predicted.iter())
    {
        writer.serialize(BacktestRow {
            ds: *ds,
            actual: *actual,
            predicted: *predicted,
        })?;
    }
    writer.flush()?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Print the picks as a fixed-width table on stdout
pub fn print_picks(picks: &[StockPick]) {
    if picks.is_empty() {
        println!("No stocks with a rising forecast trend.");
        return;
    }

    println!(
        "{:<8} {:>8} {:>8} {:>12} {:>12} {:>10} {:>12}",
        "Ticker", "P/E", "P/B", "Current", "Predicted", "Change %", "Backtest MAE"
    );
    for pick in picks {
        let mae = pick
            .backtest_mae
            .map(|m| format!("{:.4}", m))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:>8.2} {:>8.2} {:>12.2} {:>12.2} {:>10.2} {:>12}",
            pick.ticker,
            pick.pe_ratio,
            pick.pb_ratio,
            pick.current_price,
            pick.predicted_price,
            pick.price_increase_pct,
            mae
        );
    }
}
