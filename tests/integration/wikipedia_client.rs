//! S&P 500 list scraping against a mock Wikipedia

use pretty_assertions::assert_eq;
use reqwest::Client;
use value_investing::api::{TickerSource, WikipediaClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::test_data;

pub const SP500_PAGE: &str = r#"
<html><body>
<table class="wikitable sortable" id="constituents">
  <tbody>
    <tr><th>Symbol</th><th>Security</th><th>GICS Sector</th><th>Date added</th></tr>
    <tr><td><a href="/q/AAA">AAA</a></td><td>Alpha Corp</td><td>Energy</td><td>1990-01-01</td></tr>
    <tr><td><a href="/q/BBB">BBB</a></td><td>Beta Inc.</td><td>Utilities</td><td>2001-05-03</td></tr>
    <tr><td><a href="/q/BRK.B">BRK.B</a></td><td>Berkshire Hathaway</td><td>Financials</td><td>2010-02-16</td></tr>
  </tbody>
</table>
<table id="changes"><tr><th>Date</th><th>Ticker</th></tr><tr><td>2024-03-18</td><td>ZZZ</td></tr></table>
</body></html>
"#;

#[test_log::test(tokio::test)]
async fn test_get_list_of_stocks_from_first_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wiki/sp500"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SP500_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_data::mock_config(&server.uri(), "unused.db");
    let client = WikipediaClient::new(Client::new(), &config);

    let tickers = client.get_list_of_stocks().await.unwrap();
    assert_eq!(tickers, vec!["AAA", "BBB", "BRK.B"]);
}

#[test_log::test(tokio::test)]
async fn test_page_without_symbol_column_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wiki/sp500"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<table><tr><th>Ticker</th></tr><tr><td>AAA</td></tr></table>"),
        )
        .mount(&server)
        .await;

    let config = test_data::mock_config(&server.uri(), "unused.db");
    let client = WikipediaClient::new(Client::new(), &config);
    assert!(client.get_list_of_stocks().await.is_err());
}

#[test_log::test(tokio::test)]
async fn test_http_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = test_data::mock_config(&server.uri(), "unused.db");
    let client = WikipediaClient::new(Client::new(), &config);
    assert!(client.get_list_of_stocks().await.is_err());
}
