use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;
use std::num::NonZeroU32;
use tracing::debug;
use url::Url;

use crate::models::{Config, PricePoint, RawRatios, MISSING_RATIO};
use crate::utils::{Interval, Period};
use super::{cell_text, selector, PriceHistoryProvider, RatioSource};

const TRAILING_PE_LABEL: &str = "TrailingP/E";
const PRICE_TO_BOOK_LABEL: &str = "Price/Book(mrq)";

/// Figures needed to derive a missing P/E or P/B ratio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteSummary {
    pub current_price: Option<f64>,
    pub trailing_eps: Option<f64>,
    pub book_value: Option<f64>,
}

impl QuoteSummary {
    /// Share price / trailing EPS
    pub fn pe_ratio(&self) -> Option<f64> {
        ratio(self.current_price?, self.trailing_eps?)
    }

    /// Share price / book value per share
    pub fn pb_ratio(&self) -> Option<f64> {
        ratio(self.current_price?, self.book_value?)
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    let value = numerator / denominator;
    if denominator != 0.0 && value.is_finite() {
        Some(value)
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteIndicator>,
    #[serde(default)]
    adjclose: Vec<AdjCloseIndicator>,
}

#[derive(Debug, Deserialize)]
struct QuoteIndicator {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseIndicator {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance scraper and JSON API client
pub struct YahooClient {
    client: Client,
    quote_base_url: String,
    api_base_url: String,
    limiter: DefaultDirectRateLimiter,
}

impl YahooClient {
    pub fn new(client: Client, config: &Config) -> Self {
        let per_minute = NonZeroU32::new(config.yahoo_rate_limit_per_minute).unwrap_or(NonZeroU32::MIN);

        Self {
            client,
            quote_base_url: config.yahoo_quote_base_url.trim_end_matches('/').to_string(),
            api_base_url: config.yahoo_api_base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        }
    }

    async fn get_text(&self, url: Url) -> Result<String> {
        self.limiter.until_ready().await;
        debug!("GET {}", url);

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP {} for {}", response.status(), url));
        }
        Ok(response.text().await?)
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl RatioSource for YahooClient {
    async fn get_key_statistics(&self, ticker: &str) -> Result<RawRatios> {
        let symbol = yahoo_symbol(ticker);
        let url = Url::parse_with_params(
            &format!("{}/quote/{}/key-statistics", self.quote_base_url, symbol),
            &[("p", symbol.as_str())],
        )?;

        let html = self
            .get_text(url)
            .await
            .with_context(|| format!("Failed to fetch key statistics for {}", ticker))?;
        parse_key_statistics(ticker, &html)
    }

    async fn get_quote_summary(&self, ticker: &str) -> Result<QuoteSummary> {
        let symbol = yahoo_symbol(ticker);
        let url = Url::parse_with_params(
            &format!("{}/v10/finance/quoteSummary/{}", self.api_base_url, symbol),
            &[("modules", "financialData,defaultKeyStatistics")],
        )?;

        let json = self.get_json(url).await?;
        parse_quote_summary(&json)
    }
}

#[async_trait::async_trait]
impl PriceHistoryProvider for YahooClient {
    async fn get_price_history(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Vec<PricePoint>> {
        let symbol = yahoo_symbol(ticker);
        let url = Url::parse_with_params(
            &format!("{}/v8/finance/chart/{}", self.api_base_url, symbol),
            &[
                ("range", period.as_str()),
                ("interval", interval.as_str()),
                ("includeAdjustedClose", "true"),
                ("events", "div,split"),
            ],
        )?;

        let body = self
            .get_text(url)
            .await
            .with_context(|| format!("Failed to download prices for {}", ticker))?;
        parse_chart(&body)
    }
}

/// Yahoo writes share classes with a dash (BRK-B) where the index list uses a dot
pub fn yahoo_symbol(ticker: &str) -> String {
    ticker.trim().replace('.', "-")
}

/// Pull the trailing P/E and price/book cells out of a key-statistics page
pub fn parse_key_statistics(ticker: &str, html: &str) -> Result<RawRatios> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;

    let mut ratios = RawRatios::missing(ticker);

    for table in document.select(&table_selector) {
        for row in table.select(&row_selector) {
            let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
            let (Some(label), Some(value)) = (cells.first(), cells.get(1)) else {
                continue;
            };

            let label: String = label.chars().filter(|c| !c.is_whitespace()).collect();
            let value = if value.is_empty() { MISSING_RATIO.to_string() } else { value.clone() };

            if label == TRAILING_PE_LABEL {
                ratios.trailing_pe = value;
            } else if label == PRICE_TO_BOOK_LABEL {
                ratios.price_to_book = value;
            }
        }
    }

    Ok(ratios)
}

fn raw_field(module: &Value, field: &str) -> Option<f64> {
    let value = module.get(field)?;
    value
        .get("raw")
        .and_then(Value::as_f64)
        .or_else(|| value.as_f64())
}

pub fn parse_quote_summary(json: &Value) -> Result<QuoteSummary> {
    let result = json
        .get("quoteSummary")
        .and_then(|q| q.get("result"))
        .and_then(|r| r.get(0))
        .ok_or_else(|| anyhow!("quoteSummary response has no result"))?;

    let financial_data = result.get("financialData").cloned().unwrap_or(Value::Null);
    let key_statistics = result.get("defaultKeyStatistics").cloned().unwrap_or(Value::Null);

    Ok(QuoteSummary {
        current_price: raw_field(&financial_data, "currentPrice"),
        trailing_eps: raw_field(&key_statistics, "trailingEps"),
        book_value: raw_field(&key_statistics, "bookValue"),
    })
}

/// Adjusted closes from a chart response, oldest first, skipping null bars
pub fn parse_chart(body: &str) -> Result<Vec<PricePoint>> {
    let response: ChartResponse = serde_json::from_str(body)?;

    if let Some(error) = response.chart.error.filter(|e| !e.is_null()) {
        return Err(anyhow!("Yahoo chart error: {}", error));
    }

    let result = response
        .chart
        .result
        .and_then(|mut results| if results.is_empty() { None } else { Some(results.remove(0)) })
        .ok_or_else(|| anyhow!("Yahoo chart response has no result"))?;

    let timestamps = result.timestamp.unwrap_or_default();
    let closes = match result.indicators.adjclose.into_iter().next() {
        Some(adj) if !adj.adjclose.is_empty() => adj.adjclose,
        _ => result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .unwrap_or_default(),
    };

    let mut points: Vec<PricePoint> = timestamps
        .iter()
        .zip(closes.iter())
        .filter_map(|(ts, close)| {
            let adj_close = (*close)?;
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some(PricePoint { date, adj_close })
        })
        .filter(|p| p.adj_close.is_finite())
        .collect();

    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);
    Ok(points)
}
