use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::api::{build_http_client, PriceHistoryProvider, RatioSource, TickerSource, WikipediaClient, YahooClient};
use crate::database_sqlx::DatabaseManagerSqlx;
use crate::models::{Config, PriceTable, RatioRecord, RawRatios, MISSING_RATIO};
use crate::utils::{parse_ratio, Interval, Period};

/// Value stored for a ratio that could not be obtained; removed by `delete_negatives`
const INVALID_RATIO: f64 = -1.0;

/// Summary of an initial collection run
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSummary {
    pub tickers: usize,
    pub stored: usize,
    pub removed: u64,
    pub remaining: i64,
}

/// Initial-run pipeline: ticker list, ratio scrape, ratio table
pub struct DataCollector {
    tickers: Box<dyn TickerSource + Send + Sync>,
    ratios: Box<dyn RatioSource + Send + Sync>,
    config: Config,
}

impl DataCollector {
    pub fn new(
        tickers: Box<dyn TickerSource + Send + Sync>,
        ratios: Box<dyn RatioSource + Send + Sync>,
        config: Config,
    ) -> Self {
        Self { tickers, ratios, config }
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let http = build_http_client(&config)?;
        let wikipedia = WikipediaClient::new(http.clone(), &config);
        let yahoo = YahooClient::new(http, &config);
        Ok(Self::new(Box::new(wikipedia), Box::new(yahoo), config))
    }

    pub async fn get_list_of_stocks(&self) -> Result<Vec<String>> {
        info!("📋 Fetching S&P 500 constituents...");
        let tickers = self.tickers.get_list_of_stocks().await?;
        info!("✅ Found {} tickers", tickers.len());
        Ok(tickers)
    }

    /// Scrape trailing P/E and price/book for every ticker; failures become "N/A"
    pub async fn get_ratios_data(&self, tickers: &[String]) -> Vec<RawRatios> {
        let total = tickers.len();
        let mut results = Vec::with_capacity(total);

        for (i, ticker) in tickers.iter().enumerate() {
            let ratios = match self.ratios.get_key_statistics(ticker).await {
                Ok(ratios) => {
                    debug!("{}: P/E {} P/B {}", ticker, ratios.trailing_pe, ratios.price_to_book);
                    ratios
                }
                Err(e) => {
                    warn!("❌ {}/{}: {} key statistics failed - {}", i + 1, total, ticker, e);
                    RawRatios::missing(ticker)
                }
            };
            results.push(ratios);

            if (i + 1) % 25 == 0 {
                info!("📊 Progress: {}/{} tickers scraped", i + 1, total);
            }
        }

        results
    }

    /// Derive "N/A" cells from the quote summary; anything underivable becomes -1
    pub async fn get_missing_ratios(&self, ratios: &mut [RawRatios]) {
        let missing = ratios.iter().filter(|r| r.has_missing()).count();
        if missing == 0 {
            return;
        }
        info!("🔍 Deriving ratios for {} tickers with missing values", missing);

        for entry in ratios.iter_mut().filter(|r| r.has_missing()) {
            let summary = match self.ratios.get_quote_summary(&entry.ticker).await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!("❌ Quote summary failed for {}: {}", entry.ticker, e);
                    None
                }
            };

            if entry.trailing_pe == MISSING_RATIO {
                let pe = summary.as_ref().and_then(|s| s.pe_ratio()).unwrap_or(INVALID_RATIO);
                entry.trailing_pe = pe.to_string();
            }
            if entry.price_to_book == MISSING_RATIO {
                let pb = summary.as_ref().and_then(|s| s.pb_ratio()).unwrap_or(INVALID_RATIO);
                entry.price_to_book = pb.to_string();
            }
        }
    }

    /// Steps 1-3: build the ratio table from scratch
    pub async fn run_initial_collection(&self) -> Result<CollectionSummary> {
        info!("🚀 Starting initial collection into {}", self.config.database_path);

        let tickers = self.get_list_of_stocks().await?;
        let mut raw = self.get_ratios_data(&tickers).await;
        self.get_missing_ratios(&mut raw).await;
        let records = format_ratios_df(&raw);

        let database = DatabaseManagerSqlx::create_database(&self.config.database_path)
            .await
            .context("Failed to create ratio database")?;
        let stored = database.add_many(&records).await?;
        let removed = database.delete_negatives().await?;
        database.mark_collected().await?;
        let remaining = database.count_ratios().await?;

        info!(
            "✅ Collection complete: {} stored, {} removed as negative or missing, {} remaining",
            stored, removed, remaining
        );

        Ok(CollectionSummary {
            tickers: tickers.len(),
            stored,
            removed,
            remaining,
        })
    }
}

/// Convert raw ratio strings to numbers. If either fails to parse, both become -1.
pub fn format_ratios_df(ratios: &[RawRatios]) -> Vec<RatioRecord> {
    ratios
        .iter()
        .map(|raw| match (parse_ratio(&raw.trailing_pe), parse_ratio(&raw.price_to_book)) {
            (Some(pe), Some(pb)) => RatioRecord::new(&raw.ticker, pe, pb),
            _ => {
                debug!("{}: unparseable ratios '{}' / '{}'", raw.ticker, raw.trailing_pe, raw.price_to_book);
                RatioRecord::new(&raw.ticker, INVALID_RATIO, INVALID_RATIO)
            }
        })
        .collect()
}

/// Adjusted closes for each ticker aligned on date.
///
/// A ticker whose download fails is left out of the table.
pub async fn download_price_data(
    provider: &(dyn PriceHistoryProvider + Send + Sync),
    tickers: &[String],
    period: Period,
    interval: Interval,
) -> PriceTable {
    if tickers.is_empty() {
        return PriceTable::default();
    }

    info!("📈 Downloading {} {} prices for {} tickers", period, interval, tickers.len());
    let mut series = Vec::with_capacity(tickers.len());

    for ticker in tickers {
        match provider.get_price_history(ticker, period, interval).await {
            Ok(points) if !points.is_empty() => {
                debug!("{}: {} price bars", ticker, points.len());
                series.push((ticker.clone(), points));
            }
            Ok(_) => warn!("⚠️  No price data returned for {}", ticker),
            Err(e) => warn!("❌ Price download failed for {}: {}", ticker, e),
        }
    }

    let table = PriceTable::from_series(series);
    info!("✅ Price table: {} tickers x {} dates", table.tickers.len(), table.len());
    table
}
