//! Additive trend + seasonality forecaster for daily price series.
//!
//! The model is
//!
//! ```text
//! y(t) = a + k·t + Σ δ_j·(t − s_j)₊ + Σ yearly Fourier terms + Σ weekly Fourier terms
//! ```
//!
//! with `t` scaled to [0, 1] over the training range and `y` scaled by its
//! maximum absolute value. Changepoint slopes `δ_j` and seasonal coefficients
//! carry ridge penalties; the system `(XᵀX + Λ)β = Xᵀy` is solved by Cholesky
//! decomposition.

use chrono::{Datelike, Duration, NaiveDate};
use ndarray::{Array1, Array2};
use serde::Serialize;
use std::f64::consts::PI;
use thiserror::Error;

use crate::models::PricePoint;

const YEAR_DAYS: f64 = 365.25;
const WEEK_DAYS: f64 = 7.0;

/// Errors for fitting and evaluating the forecaster
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Not enough observations: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Series contains non-finite values")]
    NonFiniteInput,

    #[error("Length mismatch: {actual} actual values vs {predicted} predictions")]
    LengthMismatch { actual: usize, predicted: usize },

    #[error("Normal equations are not positive definite")]
    NotPositiveDefinite,
}

/// Model structure and regularisation
#[derive(Debug, Clone)]
pub struct ForecasterConfig {
    pub n_changepoints: usize,
    /// Share of the history in which changepoints may be placed
    pub changepoint_range: f64,
    pub changepoint_penalty: f64,
    pub seasonality_penalty: f64,
    pub yearly_order: usize,
    pub weekly_order: usize,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_penalty: 1.0,
            seasonality_penalty: 0.1,
            yearly_order: 10,
            weekly_order: 3,
        }
    }
}

/// Penalty for the unregularised intercept and slope, keeps the system definite
const BASE_PENALTY: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct TrendForecaster {
    config: ForecasterConfig,
}

impl Default for TrendForecaster {
    fn default() -> Self {
        Self::new(ForecasterConfig::default())
    }
}

impl TrendForecaster {
    pub fn new(config: ForecasterConfig) -> Self {
        Self { config }
    }

    /// Fit on (date, price) observations in chronological order
    pub fn fit(&self, history: &[PricePoint]) -> Result<FittedForecast, ForecastError> {
        if history.len() < 2 {
            return Err(ForecastError::InsufficientData { needed: 2, got: history.len() });
        }
        if history.iter().any(|p| !p.adj_close.is_finite()) {
            return Err(ForecastError::NonFiniteInput);
        }

        let start = history[0].date;
        let end = history[history.len() - 1].date;
        let span_days = (end - start).num_days() as f64;
        if span_days <= 0.0 {
            return Err(ForecastError::InsufficientData { needed: 2, got: 1 });
        }

        let y_scale = history
            .iter()
            .map(|p| p.adj_close.abs())
            .fold(0.0, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let mut model = FittedForecast {
            start,
            end,
            span_days,
            y_scale,
            changepoints: Vec::new(),
            yearly_order: if span_days >= 2.0 * YEAR_DAYS { self.config.yearly_order } else { 0 },
            weekly_order: if span_days >= 2.0 * WEEK_DAYS { self.config.weekly_order } else { 0 },
            coefficients: Array1::zeros(0),
        };
        model.changepoints = self.place_changepoints(history, &model);

        let n = history.len();
        let p = model.n_features();
        let mut x = Array2::<f64>::zeros((n, p));
        let mut y = Array1::<f64>::zeros(n);
        for (i, point) in history.iter().enumerate() {
            for (j, value) in model.features(point.date).into_iter().enumerate() {
                x[[i, j]] = value;
            }
            y[i] = point.adj_close / y_scale;
        }

        let mut xtx = x.t().dot(&x);
        let xty = x.t().dot(&y);
        for (j, penalty) in self.penalties(&model).into_iter().enumerate() {
            xtx[[j, j]] += penalty;
        }

        model.coefficients = cholesky_solve(&xtx, &xty)?;
        Ok(model)
    }

    /// Fit on all but the last `holdout` points and score the prediction of those
    pub fn backtest(&self, history: &[PricePoint], holdout: usize) -> Result<Backtest, ForecastError> {
        if holdout == 0 || history.len() < holdout + 2 {
            return Err(ForecastError::InsufficientData {
                needed: holdout + 2,
                got: history.len(),
            });
        }

        let split = history.len() - holdout;
        let model = self.fit(&history[..split])?;
        let test = &history[split..];

        let dates: Vec<NaiveDate> = test.iter().map(|p| p.date).collect();
        let actual: Vec<f64> = test.iter().map(|p| p.adj_close).collect();
        let predicted: Vec<f64> = dates.iter().map(|d| model.predict(*d)).collect();
        let mae = mean_absolute_error(&actual, &predicted)?;

        Ok(Backtest { dates, actual, predicted, mae })
    }

    fn place_changepoints(&self, history: &[PricePoint], model: &FittedForecast) -> Vec<f64> {
        let eligible = ((history.len() as f64) * self.config.changepoint_range).floor() as usize;
        if eligible < 2 || self.config.n_changepoints == 0 {
            return Vec::new();
        }

        let count = self.config.n_changepoints.min(eligible - 1);
        let last = (eligible - 1) as f64;
        let mut points: Vec<f64> = (1..=count)
            .map(|i| {
                let idx = (last * i as f64 / count as f64).round() as usize;
                model.scaled_time(history[idx].date)
            })
            .collect();
        points.dedup();
        points
    }

    fn penalties(&self, model: &FittedForecast) -> Vec<f64> {
        let mut penalties = vec![BASE_PENALTY, BASE_PENALTY];
        penalties.extend(std::iter::repeat(self.config.changepoint_penalty).take(model.changepoints.len()));
        let seasonal = 2 * (model.yearly_order + model.weekly_order);
        penalties.extend(std::iter::repeat(self.config.seasonality_penalty).take(seasonal));
        penalties
    }
}

/// A fitted model that can evaluate trend and prediction for any date
#[derive(Debug, Clone)]
pub struct FittedForecast {
    start: NaiveDate,
    end: NaiveDate,
    span_days: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    yearly_order: usize,
    weekly_order: usize,
    coefficients: Array1<f64>,
}

/// One row of a forecast frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub ds: NaiveDate,
    pub yhat: f64,
    pub trend: f64,
}

impl FittedForecast {
    fn n_features(&self) -> usize {
        2 + self.changepoints.len() + 2 * (self.yearly_order + self.weekly_order)
    }

    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.span_days
    }

    fn trend_features(&self, t: f64) -> Vec<f64> {
        let mut row = Vec::with_capacity(2 + self.changepoints.len());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|s| (t - s).max(0.0)));
        row
    }

    fn features(&self, date: NaiveDate) -> Vec<f64> {
        let mut row = self.trend_features(self.scaled_time(date));
        let days = date.num_days_from_ce() as f64;
        for (order, period) in [(self.yearly_order, YEAR_DAYS), (self.weekly_order, WEEK_DAYS)] {
            for k in 1..=order {
                let angle = 2.0 * PI * k as f64 * days / period;
                row.push(angle.sin());
                row.push(angle.cos());
            }
        }
        row
    }

    pub fn last_date(&self) -> NaiveDate {
        self.end
    }

    /// Trend component in price units
    pub fn trend(&self, date: NaiveDate) -> f64 {
        let row = self.trend_features(self.scaled_time(date));
        let value: f64 = row
            .iter()
            .zip(self.coefficients.iter())
            .map(|(x, b)| x * b)
            .sum();
        value * self.y_scale
    }

    /// Trend plus seasonality in price units
    pub fn predict(&self, date: NaiveDate) -> f64 {
        let row = self.features(date);
        let value: f64 = row
            .iter()
            .zip(self.coefficients.iter())
            .map(|(x, b)| x * b)
            .sum();
        value * self.y_scale
    }

    /// History dates followed by `periods` consecutive calendar days
    pub fn make_future_dates(&self, history: &[PricePoint], periods: i64) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = history.iter().map(|p| p.date).collect();
        dates.extend((1..=periods).map(|d| self.end + Duration::days(d)));
        dates
    }

    pub fn forecast(&self, dates: &[NaiveDate]) -> Vec<ForecastPoint> {
        dates
            .iter()
            .map(|date| ForecastPoint {
                ds: *date,
                yhat: self.predict(*date),
                trend: self.trend(*date),
            })
            .collect()
    }
}

/// Out-of-sample evaluation over the held-out tail
#[derive(Debug, Clone)]
pub struct Backtest {
    pub dates: Vec<NaiveDate>,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub mae: f64,
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64, ForecastError> {
    if actual.len() != predicted.len() {
        return Err(ForecastError::LengthMismatch {
            actual: actual.len(),
            predicted: predicted.len(),
        });
    }
    if actual.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }

    let total: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(total / actual.len() as f64)
}

/// Solve `a·x = b` for symmetric positive definite `a`
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, ForecastError> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return Err(ForecastError::NotPositiveDefinite);
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Ok(x)
}
