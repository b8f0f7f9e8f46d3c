//! Ratio table operations against real SQLite files

use pretty_assertions::assert_eq;
use value_investing::database_sqlx::{DatabaseManagerSqlx, RATIOS_LAST_COLLECTED};
use value_investing::models::RatioRecord;

use crate::common::{logging, TestDatabase};

#[test_log::test(tokio::test)]
async fn test_add_many_keeps_insertion_order() {
    logging::log_test_step("Inserting ratios in one batch");
    let records = vec![
        RatioRecord::new("MMM", 11.2, 4.1),
        RatioRecord::new("AOS", 19.8, 5.3),
        RatioRecord::new("ABT", 33.0, 4.8),
    ];
    let db = TestDatabase::with_ratios(&records).await.unwrap();

    let loaded = db.manager.get_existing_data().await.unwrap();
    logging::log_test_data("Loaded ratios", &loaded);
    assert_eq!(loaded, records);
}

#[test_log::test(tokio::test)]
async fn test_delete_negatives_removes_zero_and_invalid_rows() {
    let db = TestDatabase::with_ratios(&[
        RatioRecord::new("AAA", 12.0, 1.5),
        RatioRecord::new("BAD", -1.0, -1.0),
        RatioRecord::new("LOSS", -8.5, 2.0),
        RatioRecord::new("ZERO", 15.0, 0.0),
        RatioRecord::new("BBB", 9.0, 0.9),
    ])
    .await
    .unwrap();

    assert_eq!(db.manager.delete_negatives().await.unwrap(), 3);
    let tickers: Vec<String> = db
        .manager
        .get_existing_data()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.ticker)
        .collect();
    assert_eq!(tickers, vec!["AAA", "BBB"]);
}

#[test_log::test(tokio::test)]
async fn test_reopening_keeps_ratios() {
    let db = TestDatabase::with_ratios(&[RatioRecord::new("KO", 24.0, 10.0)]).await.unwrap();
    db.manager.mark_collected().await.unwrap();

    let reopened = DatabaseManagerSqlx::new(&db.path).await.unwrap();
    assert_eq!(reopened.count_ratios().await.unwrap(), 1);
    assert!(reopened.get_metadata(RATIOS_LAST_COLLECTED).await.unwrap().is_some());
    assert_eq!(reopened.days_since_collection().await.unwrap(), Some(0));
}

#[test_log::test(tokio::test)]
async fn test_null_ratios_load_as_nan() {
    let db = TestDatabase::new().await.unwrap();
    sqlx::query("INSERT INTO ratio (Tickers, PE, PB) VALUES ('GAP', NULL, 1.2)")
        .execute(db.manager.pool())
        .await
        .unwrap();

    let loaded = db.manager.get_existing_data().await.unwrap();
    assert_eq!(loaded[0].ticker, "GAP");
    assert!(loaded[0].pe.is_nan());
    assert_eq!(loaded[0].pb, 1.2);
}

#[test_log::test(tokio::test)]
async fn test_metadata_upsert() {
    let db = TestDatabase::new().await.unwrap();
    db.manager.set_metadata(RATIOS_LAST_COLLECTED, "2020-01-01").await.unwrap();
    db.manager.set_metadata(RATIOS_LAST_COLLECTED, "2021-06-30").await.unwrap();

    assert_eq!(
        db.manager.get_metadata(RATIOS_LAST_COLLECTED).await.unwrap(),
        Some("2021-06-30".to_string())
    );
    assert!(db.manager.days_since_collection().await.unwrap().unwrap() > 30);
}
