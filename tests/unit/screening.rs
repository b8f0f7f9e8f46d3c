//! Percentile screening over realistic ratio tables

use pretty_assertions::assert_eq;
use test_log::test;
use value_investing::analysis::screening::{
    calculate_figures, calculate_returns, get_high_pe_pb_stocks, get_low_pe_pb_stocks,
};
use value_investing::models::{PriceTable, RatioRecord};

use crate::common::{logging, test_data};

#[test]
fn test_sample_table_cohorts() {
    logging::log_test_step("Screening twenty stocks");
    let ratios = test_data::sample_ratios();
    let figures = calculate_figures(&ratios);

    assert_eq!((figures.num_remaining_stocks, figures.ten_perc, figures.ninety_perc), (20, 2, 18));
    assert_eq!(get_low_pe_pb_stocks(&ratios, figures.ten_perc), vec!["T00", "T01"]);
    assert_eq!(get_high_pe_pb_stocks(&ratios, figures.ninety_perc), vec!["T18", "T19"]);
}

#[test]
fn test_cohorts_need_both_ratios() {
    let ratios = vec![
        RatioRecord::new("XOM", 8.0, 1.9),
        RatioRecord::new("NVDA", 70.0, 40.0),
        RatioRecord::new("F", 6.0, 9.0),
        RatioRecord::new("TSLA", 60.0, 0.8),
        RatioRecord::new("KO", 24.0, 10.0),
        RatioRecord::new("AAPL", 29.0, 45.0),
        RatioRecord::new("VZ", 7.0, 1.7),
        RatioRecord::new("JPM", 11.0, 1.6),
        RatioRecord::new("MSFT", 35.0, 12.0),
        RatioRecord::new("PFE", 9.0, 1.5),
        RatioRecord::new("GM", 5.0, 0.7),
    ];
    let figures = calculate_figures(&ratios);
    assert_eq!(figures.ten_perc, 2);
    assert_eq!(figures.ninety_perc, 10);

    // lowest P/E: GM, F; lowest P/B: GM, TSLA
    assert_eq!(get_low_pe_pb_stocks(&ratios, figures.ten_perc), vec!["GM"]);
    // last P/E: NVDA; last P/B: AAPL
    assert!(get_high_pe_pb_stocks(&ratios, figures.ninety_perc).is_empty());
    // from 8: P/E MSFT, TSLA, NVDA; P/B MSFT, NVDA, AAPL
    assert_eq!(get_high_pe_pb_stocks(&ratios, 8), vec!["MSFT", "NVDA"]);
}

#[test]
fn test_ties_keep_table_order_and_nan_sorts_last() {
    let ratios = vec![
        RatioRecord::new("BBB", 10.0, 1.0),
        RatioRecord::new("AAA", 10.0, 1.0),
        RatioRecord::new("NAN", f64::NAN, f64::NAN),
        RatioRecord::new("CCC", 12.0, 2.0),
    ];

    assert_eq!(get_low_pe_pb_stocks(&ratios, 1), vec!["BBB"]);
    assert_eq!(get_high_pe_pb_stocks(&ratios, 3), vec!["NAN"]);
}

#[test]
fn test_weekly_log_returns() {
    let date = |d| chrono::NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
    let mut prices = PriceTable::new(vec!["XOM".to_string()]);
    prices.push_row(date(1), vec![100.0]);
    prices.push_row(date(8), vec![105.0]);
    prices.push_row(date(15), vec![99.75]);

    let returns = calculate_returns(&prices);
    assert_eq!(returns.dates, vec![date(8), date(15)]);
    assert!((returns.rows[0][0] - 1.05f64.ln()).abs() < 1e-12);
    assert!((returns.rows[1][0] - 0.95f64.ln()).abs() < 1e-12);
}
