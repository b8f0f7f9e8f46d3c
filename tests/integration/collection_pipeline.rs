//! Initial collection end to end: mock Wikipedia and Yahoo, real SQLite file

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use value_investing::data_collector::DataCollector;
use value_investing::database_sqlx::DatabaseManagerSqlx;
use value_investing::models::RatioRecord;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::wikipedia_client::SP500_PAGE;
use super::yahoo_client::{key_statistics_page, quote_summary};
use crate::common::{logging, test_data};

#[test_log::test(tokio::test)]
async fn test_initial_collection_builds_ratio_table() {
    logging::log_test_step("Running initial collection against mock endpoints");
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wiki/sp500"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SP500_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quote/AAA/key-statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(key_statistics_page("14.20", "2.10")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quote/BBB/key-statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(key_statistics_page("N/A", "2.50")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v10/finance/quoteSummary/BBB"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quote_summary(30.0, 3.0, 12.0)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quote/BRK-B/key-statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(key_statistics_page("1.2k", "1.40")))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ratios_data.db").to_string_lossy().to_string();
    let config = test_data::mock_config(&server.uri(), &db_path);

    let collector = DataCollector::from_config(config).unwrap();
    let summary = collector.run_initial_collection().await.unwrap();
    logging::log_test_data("Collection summary", &summary);

    assert_eq!(summary.tickers, 3);
    assert_eq!(summary.stored, 3);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.remaining, 2);

    let database = DatabaseManagerSqlx::new(&db_path).await.unwrap();
    assert_eq!(
        database.get_existing_data().await.unwrap(),
        vec![RatioRecord::new("AAA", 14.2, 2.1), RatioRecord::new("BBB", 10.0, 2.5)]
    );
    assert_eq!(database.days_since_collection().await.unwrap(), Some(0));
}

#[test_log::test(tokio::test)]
async fn test_recollection_replaces_previous_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wiki/sp500"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<table><tr><th>Symbol</th></tr><tr><td>AAA</td></tr></table>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quote/AAA/key-statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(key_statistics_page("20.00", "3.00")))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ratios_data.db").to_string_lossy().to_string();
    let stale = DatabaseManagerSqlx::create_database(&db_path).await.unwrap();
    stale
        .add_many(&[RatioRecord::new("OLD", 5.0, 0.5)])
        .await
        .unwrap();

    let collector = DataCollector::from_config(test_data::mock_config(&server.uri(), &db_path)).unwrap();
    collector.run_initial_collection().await.unwrap();

    let tickers: Vec<String> = stale
        .get_existing_data()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.ticker)
        .collect();
    assert_eq!(tickers, vec!["AAA"]);
}
