//! Amount parsing for currency labels shown on the dashboard.
//!
//! The dashboard renders amounts Indonesian-style: `Rp 1.234.567,89`.
//! Dots are thousands separators, the comma is the decimal point.

use std::fmt;

/// Text written into a sheet cell when a scrape failed.
pub const ERROR_MARKER: &str = "ERROR";

/// Outcome of scraping one (project, date) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrapeResult {
    Amount(f64),
    Error,
}

impl ScrapeResult {
    pub fn is_error(&self) -> bool {
        matches!(self, ScrapeResult::Error)
    }

    pub fn amount(&self) -> Option<f64> {
        match self {
            ScrapeResult::Amount(v) => Some(*v),
            ScrapeResult::Error => None,
        }
    }
}

impl fmt::Display for ScrapeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapeResult::Amount(v) => write!(f, "{v}"),
            ScrapeResult::Error => write!(f, "{ERROR_MARKER}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// Nothing numeric left after stripping symbols and separators.
    Empty { raw: String },
    /// The cleaned text is not a finite number.
    Invalid { raw: String, cleaned: String },
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { raw } => write!(f, "no digits in amount text {raw:?}"),
            Self::Invalid { raw, cleaned } => {
                write!(f, "cannot parse amount text {raw:?} (cleaned: {cleaned:?})")
            }
        }
    }
}

impl std::error::Error for AmountError {}

/// Parse displayed currency text into a number.
///
/// Keeps only digits, `.`, `,` and `-`; drops `.`; turns `,` into the
/// decimal point. Empty input is an error, never zero.
pub fn parse_amount(raw: &str) -> Result<f64, AmountError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(AmountError::Empty { raw: raw.to_string() });
    }

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(AmountError::Invalid {
            raw: raw.to_string(),
            cleaned,
        }),
    }
}
