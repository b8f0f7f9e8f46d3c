use chrono::Duration;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while validating user-supplied download parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unsupported time period '{0}' (expected one of 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd, max)")]
    InvalidPeriod(String),

    #[error("unsupported interval '{0}' (expected one of 1d, 5d, 1wk, 1mo, 3mo)")]
    InvalidInterval(String),
}

/// How far back a price download reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    YearToDate,
    Max,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::FiveDays => "5d",
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::TenYears => "10y",
            Period::YearToDate => "ytd",
            Period::Max => "max",
        }
    }
}

impl FromStr for Period {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1d" => Ok(Period::OneDay),
            "5d" => Ok(Period::FiveDays),
            "1mo" => Ok(Period::OneMonth),
            "3mo" => Ok(Period::ThreeMonths),
            "6mo" => Ok(Period::SixMonths),
            "1y" => Ok(Period::OneYear),
            "2y" => Ok(Period::TwoYears),
            "5y" => Ok(Period::FiveYears),
            "10y" => Ok(Period::TenYears),
            "ytd" => Ok(Period::YearToDate),
            "max" => Ok(Period::Max),
            other => Err(ParseError::InvalidPeriod(other.to_string())),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spacing between price bars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Daily,
    FiveDay,
    Weekly,
    Monthly,
    Quarterly,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::FiveDay => "5d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
            Interval::Quarterly => "3mo",
        }
    }

    /// Wall-clock span of one bar; months are counted as 30 days
    pub fn duration(&self) -> Duration {
        match self {
            Interval::Daily => Duration::days(1),
            Interval::FiveDay => Duration::days(5),
            Interval::Weekly => Duration::weeks(1),
            Interval::Monthly => Duration::days(30),
            Interval::Quarterly => Duration::days(90),
        }
    }
}

impl FromStr for Interval {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1d" => Ok(Interval::Daily),
            "5d" => Ok(Interval::FiveDay),
            "1wk" => Ok(Interval::Weekly),
            "1mo" => Ok(Interval::Monthly),
            "3mo" => Ok(Interval::Quarterly),
            other => Err(ParseError::InvalidInterval(other.to_string())),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a scraped ratio cell such as "23.41".
///
/// Abbreviated values ("1.2k"), thousands separators and "N/A" are rejected.
pub fn parse_ratio(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Round half away from zero to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
