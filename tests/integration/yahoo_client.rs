//! Yahoo key statistics, quote summary and chart endpoints against a mock server

use assert_matches::assert_matches;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use reqwest::Client;
use serde_json::json;
use value_investing::api::{PriceHistoryProvider, RatioSource, YahooClient};
use value_investing::utils::{Interval, Period};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::test_data;

pub fn key_statistics_page(trailing_pe: &str, price_to_book: &str) -> String {
    format!(
        r#"<html><body>
        <table>
          <tr><td>Market Cap (intraday)</td><td>12.1B</td></tr>
          <tr><td>Trailing P/E <sup>1</sup></td><td>{}</td></tr>
          <tr><td>Forward P/E</td><td>9.80</td></tr>
          <tr><td>Price/Book (mrq)</td><td>{}</td></tr>
        </table>
        </body></html>"#,
        trailing_pe, price_to_book
    )
}

pub fn quote_summary(price: f64, eps: f64, book_value: f64) -> serde_json::Value {
    json!({
        "quoteSummary": {
            "result": [{
                "financialData": { "currentPrice": { "raw": price, "fmt": format!("{:.2}", price) } },
                "defaultKeyStatistics": {
                    "trailingEps": { "raw": eps },
                    "bookValue": { "raw": book_value }
                }
            }],
            "error": null
        }
    })
}

fn client_for(server: &MockServer) -> YahooClient {
    let config = test_data::mock_config(&server.uri(), "unused.db");
    YahooClient::new(Client::new(), &config)
}

#[test_log::test(tokio::test)]
async fn test_key_statistics_scrape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote/BRK-B/key-statistics"))
        .and(query_param("p", "BRK-B"))
        .respond_with(ResponseTemplate::new(200).set_body_string(key_statistics_page("8.95", "1.52")))
        .expect(1)
        .mount(&server)
        .await;

    let ratios = client_for(&server).get_key_statistics("BRK.B").await.unwrap();
    assert_eq!(ratios.ticker, "BRK.B");
    assert_eq!(ratios.trailing_pe, "8.95");
    assert_eq!(ratios.price_to_book, "1.52");
}

#[test_log::test(tokio::test)]
async fn test_quote_summary_derives_ratios() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/XOM"))
        .and(query_param("modules", "financialData,defaultKeyStatistics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quote_summary(100.0, 8.0, 50.0)))
        .mount(&server)
        .await;

    let summary = client_for(&server).get_quote_summary("XOM").await.unwrap();
    assert_eq!(summary.pe_ratio(), Some(12.5));
    assert_eq!(summary.pb_ratio(), Some(2.0));
}

#[test_log::test(tokio::test)]
async fn test_price_history_download() {
    let server = MockServer::start().await;
    let body = json!({
        "chart": {
            "result": [{
                "timestamp": [1704067200, 1704672000, 1705276800],
                "indicators": {
                    "quote": [{ "close": [100.0, 102.0, 101.0] }],
                    "adjclose": [{ "adjclose": [99.0, 101.0, 100.5] }]
                }
            }],
            "error": null
        }
    });
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/KO"))
        .and(query_param("range", "1y"))
        .and(query_param("interval", "1wk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let points = client_for(&server)
        .get_price_history("KO", Period::OneYear, Interval::Weekly)
        .await
        .unwrap();

    assert_eq!(points.len(), 3);
    assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(points[2].adj_close, 100.5);
}

#[test_log::test(tokio::test)]
async fn test_price_history_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/NOPE"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "chart": { "result": null, "error": { "code": "Not Found", "description": "No data found" } }
        })))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .get_price_history("NOPE", Period::FiveYears, Interval::Daily)
        .await;
    assert_matches!(result, Err(_));
}
