use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use scraper::Html;
use tracing::info;

use crate::models::Config;
use super::{cell_text, selector, TickerSource};

/// Scrapes the S&P 500 constituent list from Wikipedia
pub struct WikipediaClient {
    client: Client,
    url: String,
}

impl WikipediaClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            url: config.wikipedia_sp500_url.clone(),
        }
    }

    pub async fn fetch_page(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", self.url))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP {} fetching S&P 500 list", response.status()));
        }

        Ok(response.text().await?)
    }
}

#[async_trait::async_trait]
impl TickerSource for WikipediaClient {
    async fn get_list_of_stocks(&self) -> Result<Vec<String>> {
        let html = self.fetch_page().await?;
        let tickers = parse_constituents_table(&html)?;
        info!("✅ Parsed {} S&P 500 tickers", tickers.len());
        Ok(tickers)
    }
}

/// Read the `Symbol` column of the first table on the page
pub fn parse_constituents_table(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let header_selector = selector("th")?;
    let cell_selector = selector("td")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| anyhow!("No table found on S&P 500 page"))?;

    let mut symbol_column = None;
    let mut tickers = Vec::new();

    for row in table.select(&row_selector) {
        let headers: Vec<String> = row.select(&header_selector).map(cell_text).collect();
        if symbol_column.is_none() && !headers.is_empty() {
            symbol_column = headers.iter().position(|h| h == "Symbol");
            continue;
        }

        let Some(column) = symbol_column else { continue };
        let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
        if let Some(symbol) = cells.get(column) {
            if !symbol.is_empty() {
                tickers.push(symbol.clone());
            }
        }
    }

    if symbol_column.is_none() {
        return Err(anyhow!("No 'Symbol' column in S&P 500 table"));
    }

    Ok(tickers)
}
