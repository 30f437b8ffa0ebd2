//! Shared types for the screener.
//!
//! These types form the data model handed from one pipeline stage to the
//! next: listing rows, cleaned ticker symbols, per-ticker fundamentals and
//! the final ranked rows.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Listings & tickers
// ---------------------------------------------------------------------------

/// One row from an exchange listing feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    /// Raw symbol as published by the feed. Never empty.
    pub symbol: String,
    pub security_name: String,
    /// Exchange code, either read from the feed or tagged onto it.
    pub exchange: String,
}

impl ListingRecord {
    pub fn new(symbol: &str, security_name: &str, exchange: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            security_name: security_name.to_string(),
            exchange: exchange.to_string(),
        }
    }
}

/// A provider-compatible ticker symbol (e.g. `BRK-B`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerSymbol(String);

impl TickerSymbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TickerSymbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Fundamentals
// ---------------------------------------------------------------------------

/// Per-ticker fundamentals snapshot, one row of the intermediate dataset.
///
/// Field order and names match the persisted CSV header:
/// `Ticker,EBIT,EV,EY,ROC`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    #[serde(rename = "Ticker")]
    pub ticker: TickerSymbol,
    #[serde(rename = "EBIT")]
    pub ebit: Option<f64>,
    #[serde(rename = "EV")]
    pub ev: Option<f64>,
    /// Earnings yield, EBIT / EV.
    #[serde(rename = "EY")]
    pub ey: Option<f64>,
    /// Return on capital, EBIT / (NWC + net fixed assets).
    #[serde(rename = "ROC")]
    pub roc: Option<f64>,
}

impl fmt::Display for FundamentalsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: EBIT={}, EV={}, EY={}, ROC={}",
            self.ticker,
            fmt_opt(self.ebit),
            fmt_opt(self.ev),
            fmt_opt(self.ey),
            fmt_opt(self.roc),
        )
    }
}

/// Outcome of extracting fundamentals for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// EBIT and EV resolved; derived metrics may still be null.
    Record(FundamentalsRecord),
    /// EBIT or EV could not be resolved. Not an error.
    InsufficientData { ticker: TickerSymbol },
    /// Provider or extraction failure, contained to this ticker.
    Failed { ticker: TickerSymbol, reason: String },
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// In/out validity flag. `In` sorts before `Out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    In,
    Out,
}

impl Validity {
    /// `Out` when EBIT or EV is non-positive. A null value never trips the gate.
    pub fn classify(ebit: Option<f64>, ev: Option<f64>) -> Self {
        let non_positive = |v: Option<f64>| v.is_some_and(|x| x <= 0.0);
        if non_positive(ebit) || non_positive(ev) {
            Validity::Out
        } else {
            Validity::In
        }
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validity::In => write!(f, "in"),
            Validity::Out => write!(f, "out"),
        }
    }
}

/// A fundamentals row plus its ranks, combined score and validity flag.
///
/// Persisted as `Ticker,EBIT,EV,EY,ROC,rank_EY,rank_ROC,score,out_in`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRecord {
    #[serde(rename = "Ticker")]
    pub ticker: TickerSymbol,
    #[serde(rename = "EBIT")]
    pub ebit: Option<f64>,
    #[serde(rename = "EV")]
    pub ev: Option<f64>,
    #[serde(rename = "EY")]
    pub ey: Option<f64>,
    #[serde(rename = "ROC")]
    pub roc: Option<f64>,
    #[serde(rename = "rank_EY")]
    pub rank_ey: Option<f64>,
    #[serde(rename = "rank_ROC")]
    pub rank_roc: Option<f64>,
    pub score: Option<f64>,
    pub out_in: Validity,
}

impl RankedRecord {
    pub fn new(record: FundamentalsRecord, rank_ey: Option<f64>, rank_roc: Option<f64>) -> Self {
        let score = match (rank_ey, rank_roc) {
            (Some(a), Some(b)) => Some(a + b),
            _ => None,
        };
        Self {
            out_in: Validity::classify(record.ebit, record.ev),
            ticker: record.ticker,
            ebit: record.ebit,
            ev: record.ev,
            ey: record.ey,
            roc: record.roc,
            rank_ey,
            rank_roc,
            score,
        }
    }
}

impl fmt::Display for RankedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) score={} rank_EY={} rank_ROC={}",
            self.ticker,
            self.out_in,
            fmt_opt(self.score),
            fmt_opt(self.rank_ey),
            fmt_opt(self.rank_roc),
        )
    }
}

/// Render an optional number, `NaN` for null (matches the preview table).
pub fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{x}"),
        None => "NaN".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the screener.
#[derive(Debug, thiserror::Error)]
pub enum ScreenerError {
    #[error("Listing feed error ({url}): {message}")]
    ListingFeed { url: String, message: String },

    #[error("Listing feed {url} is missing required column '{column}'")]
    MissingColumn { url: String, column: String },

    #[error("Provider error ({ticker}): {message}")]
    Provider { ticker: String, message: String },

    #[error("Malformed provider response for {ticker}: {message}")]
    MalformedResponse { ticker: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
