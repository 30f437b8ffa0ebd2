//! Financial data provider integrations.
//!
//! Defines the `FinancialDataProvider` trait, the statement table shape it
//! returns, and the Yahoo Finance implementation.

pub mod yahoo;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::types::TickerSymbol;

/// Abstraction over the market-data / financial-statement service.
///
/// All calls are keyed by the cleaned ticker symbol.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FinancialDataProvider: Send + Sync {
    /// Income-statement line items, most recent period first.
    async fn income_statement(&self, ticker: &TickerSymbol) -> Result<FinancialStatement>;

    /// Balance-sheet line items, most recent period first.
    async fn balance_sheet(&self, ticker: &TickerSymbol) -> Result<FinancialStatement>;

    /// Fast quote figures (market capitalisation).
    async fn fast_quote(&self, ticker: &TickerSymbol) -> Result<FastQuote>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Statement table
// ---------------------------------------------------------------------------

/// A financial statement: line items by name, one column per reporting
/// period, most recent period first. Cells may be blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialStatement {
    periods: Vec<NaiveDate>,
    rows: HashMap<String, Vec<Option<f64>>>,
}

impl FinancialStatement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a single-period statement from `(line item, value)` pairs.
    pub fn single_period(period: NaiveDate, items: &[(&str, f64)]) -> Self {
        let mut stmt = Self::new();
        for (name, value) in items {
            stmt.insert(name, period, Some(*value));
        }
        stmt
    }

    /// Set one cell, adding the period column (kept newest-first) if needed.
    pub fn insert(&mut self, line_item: &str, period: NaiveDate, value: Option<f64>) {
        let col = match self.periods.iter().position(|p| *p == period) {
            Some(i) => i,
            None => {
                let i = self.periods.partition_point(|p| *p > period);
                self.periods.insert(i, period);
                for row in self.rows.values_mut() {
                    row.insert(i, None);
                }
                i
            }
        };
        let width = self.periods.len();
        let row = self
            .rows
            .entry(line_item.to_string())
            .or_insert_with(|| vec![None; width]);
        row[col] = value;
    }

    pub fn contains(&self, line_item: &str) -> bool {
        self.rows.contains_key(line_item)
    }

    /// Most recent value of a line item. `None` if the item is absent or
    /// its most recent cell is blank.
    pub fn latest(&self, line_item: &str) -> Option<f64> {
        self.rows
            .get(line_item)
            .and_then(|row| row.first().copied().flatten())
    }

    /// Probe `keys` in order; the first line item present wins, and its most
    /// recent value is returned (which may itself be blank).
    pub fn first_present(&self, keys: &[&str]) -> Option<f64> {
        keys.iter()
            .find(|k| self.contains(k))
            .and_then(|k| self.latest(k))
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn line_items(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Fast-quote figures for a ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FastQuote {
    pub market_cap: Option<f64>,
    pub currency: Option<String>,
}
