//! Percentile screening over the ratio table and return calculation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::models::{PriceTable, RatioRecord};

/// Table size and the slice boundaries for the bottom and top deciles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningFigures {
    pub num_remaining_stocks: usize,
    pub ten_perc: usize,
    pub ninety_perc: usize,
}

pub fn calculate_figures(ratios: &[RatioRecord]) -> ScreeningFigures {
    let num_remaining_stocks = ratios.len();
    let n = num_remaining_stocks as f64;

    ScreeningFigures {
        num_remaining_stocks,
        ten_perc: (n * 0.1).ceil() as usize,
        ninety_perc: (n * 0.9).ceil() as usize,
    }
}

/// Ascending, NaN last. Ties keep table order.
fn compare_ratio(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn sorted_tickers<F>(ratios: &[RatioRecord], key: F) -> Vec<&str>
where
    F: Fn(&RatioRecord) -> f64,
{
    let mut sorted: Vec<&RatioRecord> = ratios.iter().collect();
    sorted.sort_by(|a, b| compare_ratio(key(a), key(b)));
    sorted.into_iter().map(|r| r.ticker.as_str()).collect()
}

fn intersection(a: &[&str], b: &[&str]) -> Vec<String> {
    let a: BTreeSet<&str> = a.iter().copied().collect();
    let b: BTreeSet<&str> = b.iter().copied().collect();
    a.intersection(&b).map(|t| t.to_string()).collect()
}

/// Tickers in both the lowest `ten_perc` by P/E and the lowest `ten_perc` by P/B
pub fn get_low_pe_pb_stocks(ratios: &[RatioRecord], ten_perc: usize) -> Vec<String> {
    let by_pe = sorted_tickers(ratios, |r| r.pe);
    let by_pb = sorted_tickers(ratios, |r| r.pb);
    let cut = ten_perc.min(ratios.len());

    intersection(&by_pe[..cut], &by_pb[..cut])
}

/// Tickers ranked at or beyond `ninety_perc` by both P/E and P/B
pub fn get_high_pe_pb_stocks(ratios: &[RatioRecord], ninety_perc: usize) -> Vec<String> {
    let by_pe = sorted_tickers(ratios, |r| r.pe);
    let by_pb = sorted_tickers(ratios, |r| r.pb);
    let start = ninety_perc.min(ratios.len());

    intersection(&by_pe[start..], &by_pb[start..])
}

/// Log returns `ln(p_t / p_{t-1})`; the first row and any non-finite row are dropped
pub fn calculate_returns(prices: &PriceTable) -> PriceTable {
    let mut returns = PriceTable::new(prices.tickers.clone());

    for i in 1..prices.len() {
        let previous = &prices.rows[i - 1];
        let current = &prices.rows[i];

        let row: Vec<f64> = current
            .iter()
            .zip(previous.iter())
            .map(|(p, prev)| (p / prev).ln())
            .collect();

        if row.iter().all(|r| r.is_finite()) {
            returns.push_row(prices.dates[i], row);
        }
    }

    returns
}

/// Mean per-period log return of each column
pub fn mean_returns(returns: &PriceTable) -> Vec<(String, f64)> {
    returns
        .tickers
        .iter()
        .enumerate()
        .map(|(idx, ticker)| {
            let sum: f64 = returns.rows.iter().map(|row| row[idx]).sum();
            let mean = if returns.is_empty() { 0.0 } else { sum / returns.len() as f64 };
            (ticker.clone(), mean)
        })
        .collect()
}
