use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;

/// Placeholder Yahoo shows for a statistic it has no value for
pub const MISSING_RATIO: &str = "N/A";

/// Valuation ratios exactly as scraped, before any numeric conversion
#[derive(Debug, Clone, PartialEq)]
pub struct RawRatios {
    pub ticker: String,
    pub trailing_pe: String,
    pub price_to_book: String,
}

impl RawRatios {
    pub fn missing(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            trailing_pe: MISSING_RATIO.to_string(),
            price_to_book: MISSING_RATIO.to_string(),
        }
    }

    pub fn has_missing(&self) -> bool {
        self.trailing_pe == MISSING_RATIO || self.price_to_book == MISSING_RATIO
    }
}

/// One row of the `ratio` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioRecord {
    pub ticker: String,
    pub pe: f64,
    pub pb: f64,
}

impl RatioRecord {
    pub fn new(ticker: &str, pe: f64, pb: f64) -> Self {
        Self {
            ticker: ticker.to_string(),
            pe,
            pb,
        }
    }
}

/// A single adjusted-close observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub adj_close: f64,
}

/// Date-indexed table with one column per ticker.
///
/// Every row holds a value for every column; building a table from
/// per-ticker series drops the dates where any ticker is missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    pub tickers: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Vec<f64>>,
}

impl PriceTable {
    pub fn new(tickers: Vec<String>) -> Self {
        Self {
            tickers,
            dates: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Align several price series on date, keeping only dates present in all of them
    pub fn from_series(series: Vec<(String, Vec<PricePoint>)>) -> Self {
        let tickers: Vec<String> = series.iter().map(|(ticker, _)| ticker.clone()).collect();
        let mut table = Self::new(tickers);
        if series.is_empty() {
            return table;
        }

        let lookups: Vec<HashMap<NaiveDate, f64>> = series
            .iter()
            .map(|(_, points)| {
                points
                    .iter()
                    .filter(|p| p.adj_close.is_finite())
                    .map(|p| (p.date, p.adj_close))
                    .collect()
            })
            .collect();

        let all_dates: BTreeSet<NaiveDate> =
            lookups.iter().flat_map(|l| l.keys().copied()).collect();

        for date in &all_dates {
            let row: Option<Vec<f64>> = lookups.iter().map(|l| l.get(date).copied()).collect();
            if let Some(row) = row {
                table.push_row(*date, row);
            }
        }

        table
    }

    pub fn push_row(&mut self, date: NaiveDate, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.tickers.len());
        self.dates.push(date);
        self.rows.push(values);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one ticker's column, oldest first
    pub fn column(&self, ticker: &str) -> Option<Vec<f64>> {
        let idx = self.tickers.iter().position(|t| t == ticker)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }
}

/// Tweet author details from the `users` expansion
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TweetAuthor {
    pub id: String,
    pub username: String,
    pub followers: u64,
    pub tweets: u64,
    pub description: Option<String>,
    pub location: Option<String>,
}

/// A tweet joined with its author
#[derive(Debug, Clone, PartialEq)]
pub struct Tweet {
    pub author_id: String,
    pub author: Option<TweetAuthor>,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub retweets: u64,
    pub replies: u64,
    pub likes: u64,
    pub quotes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Negative => "Negative",
        };
        write!(f, "{}", label)
    }
}

/// Per-ticker tally of tweet sentiment. `stock` carries the cashtag, e.g. `$AAPL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentCounts {
    pub stock: String,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentCounts {
    pub fn new(stock: &str) -> Self {
        Self {
            stock: stock.to_string(),
            positive: 0,
            neutral: 0,
            negative: 0,
        }
    }

    pub fn record(&mut self, label: SentimentLabel) {
        match label {
            SentimentLabel::Positive => self.positive += 1,
            SentimentLabel::Neutral => self.neutral += 1,
            SentimentLabel::Negative => self.negative += 1,
        }
    }

    /// Ticker without the leading `$`
    pub fn ticker(&self) -> &str {
        self.stock.strip_prefix('$').unwrap_or(&self.stock)
    }

    pub fn is_net_positive(&self) -> bool {
        self.positive > self.negative
    }

    pub fn is_net_negative(&self) -> bool {
        self.positive < self.negative
    }
}

/// Final stock pick: a value stock whose forecast trend is rising
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPick {
    pub ticker: String,
    pub pe_ratio: f64,
    pub pb_ratio: f64,
    pub current_price: f64,
    pub predicted_price: f64,
    pub price_increase_pct: f64,
    pub backtest_mae: Option<f64>,
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub time_period: String,
    pub interval: String,
    pub forecast_period: String,
    pub forecast_horizon_days: i64,
    pub backtest_days: usize,
    pub twitter_bearer_token: Option<String>,
    pub twitter_page_delay_ms: u64,
    pub yahoo_rate_limit_per_minute: u32,
    pub user_agent: String,
    pub output_dir: Option<PathBuf>,
    pub wikipedia_sp500_url: String,
    pub yahoo_quote_base_url: String,
    pub yahoo_api_base_url: String,
    pub twitter_api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: "ratios_data.db".to_string(),
            time_period: "5y".to_string(),
            interval: "1wk".to_string(),
            forecast_period: "5y".to_string(),
            forecast_horizon_days: 365,
            backtest_days: 252,
            twitter_bearer_token: None,
            twitter_page_delay_ms: 2000,
            yahoo_rate_limit_per_minute: 60,
            user_agent: "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:89.0) Gecko/20100101 Firefox/89.0"
                .to_string(),
            output_dir: None,
            wikipedia_sp500_url: "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies"
                .to_string(),
            yahoo_quote_base_url: "https://finance.yahoo.com".to_string(),
            yahoo_api_base_url: "https://query2.finance.yahoo.com".to_string(),
            twitter_api_base_url: "https://api.twitter.com".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let defaults = Config::default();

        Ok(Config {
            database_path: std::env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            time_period: std::env::var("TIME_PERIOD").unwrap_or(defaults.time_period),
            interval: std::env::var("INTERVAL").unwrap_or(defaults.interval),
            forecast_period: std::env::var("FORECAST_PERIOD").unwrap_or(defaults.forecast_period),
            forecast_horizon_days: parse_env("FORECAST_HORIZON_DAYS", defaults.forecast_horizon_days),
            backtest_days: parse_env("BACKTEST_DAYS", defaults.backtest_days),
            twitter_bearer_token: std::env::var("TWITTER_BEARER_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            twitter_page_delay_ms: parse_env("TWITTER_PAGE_DELAY_MS", defaults.twitter_page_delay_ms),
            yahoo_rate_limit_per_minute: parse_env(
                "YAHOO_RATE_LIMIT_PER_MINUTE",
                defaults.yahoo_rate_limit_per_minute,
            ),
            user_agent: std::env::var("USER_AGENT").unwrap_or(defaults.user_agent),
            output_dir: std::env::var("OUTPUT_DIR").ok().map(PathBuf::from),
            wikipedia_sp500_url: std::env::var("WIKIPEDIA_SP500_URL")
                .unwrap_or(defaults.wikipedia_sp500_url),
            yahoo_quote_base_url: std::env::var("YAHOO_QUOTE_BASE_URL")
                .unwrap_or(defaults.yahoo_quote_base_url),
            yahoo_api_base_url: std::env::var("YAHOO_API_BASE_URL")
                .unwrap_or(defaults.yahoo_api_base_url),
            twitter_api_base_url: std::env::var("TWITTER_API_BASE_URL")
                .unwrap_or(defaults.twitter_api_base_url),
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
