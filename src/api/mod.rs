use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use scraper::{ElementRef, Node, Selector};
use std::time::Duration;

use crate::models::{Config, PricePoint, RawRatios, Tweet};
use crate::utils::{Interval, Period};

pub mod twitter_client;
pub mod wikipedia_client;
pub mod yahoo_client;

pub use twitter_client::TwitterClient;
pub use wikipedia_client::WikipediaClient;
pub use yahoo_client::{QuoteSummary, YahooClient};

/// Fixed-delay limiter used between paginated requests
pub struct ApiRateLimiter {
    delay_ms: u64,
}

impl ApiRateLimiter {
    pub fn from_millis(delay_ms: u64) -> Self {
        Self { delay_ms }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub async fn wait(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(self.delay()).await;
        }
    }
}

/// Build the shared HTTP client with the configured user agent
pub fn build_http_client(config: &Config) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(client)
}

/// Source of the index constituents to screen
#[async_trait::async_trait]
pub trait TickerSource {
    async fn get_list_of_stocks(&self) -> Result<Vec<String>>;
}

/// Source of valuation ratios and the raw figures to derive them
#[async_trait::async_trait]
pub trait RatioSource {
    async fn get_key_statistics(&self, ticker: &str) -> Result<RawRatios>;
    async fn get_quote_summary(&self, ticker: &str) -> Result<QuoteSummary>;
}

/// Historical adjusted-close prices
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PriceHistoryProvider {
    async fn get_price_history(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Vec<PricePoint>>;
}

/// Full-archive tweet search
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TweetSearch {
    async fn search_all(
        &self,
        query: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<Tweet>>;
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{}': {:?}", css, e))
}

/// Text content of an element with `<sup>` footnotes left out, trimmed
pub(crate) fn cell_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in element.descendants() {
        if let Node::Text(fragment) = node.value() {
            let in_footnote = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map_or(false, |el| el.name() == "sup")
            });
            if !in_footnote {
                text.push_str(fragment);
            }
        }
    }
    text.trim().to_string()
}
