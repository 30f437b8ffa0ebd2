//! Fundamentals extraction.
//!
//! Pulls the income statement, balance sheet and fast quote for one ticker,
//! resolves the line items the Magic Formula needs, and computes enterprise
//! value, earnings yield and return on capital.
//!
//! Line items vary by filer, so several are probed by priority order. The
//! outcome is always an `Extraction`: provider failures and missing data
//! never escape as errors.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::provider::{FastQuote, FinancialDataProvider, FinancialStatement};
use crate::types::{Extraction, FundamentalsRecord, TickerSymbol};

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

const EBIT_KEYS: &[&str] = &["EBIT", "Operating Income"];
const TOTAL_DEBT_KEY: &str = "Total Debt";
const CASH_KEYS: &[&str] = &[
    "Cash And Cash Equivalents",
    "Cash Cash Equivalents And Short Term Investments",
];
const TOTAL_ASSETS_KEY: &str = "Total Assets";
const CURRENT_LIABILITIES_KEY: &str = "Current Liabilities";
const NET_FIXED_ASSETS_KEY: &str = "Net PPE";

/// How a missing total-debt or cash line item enters the EV sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Absent debt/cash counts as 0: "no debt" and "unknown debt" look alike.
    #[default]
    MissingAsZero,
    /// Absent debt/cash leaves EV unresolved.
    Propagate,
}

/// Raw line items resolved for one ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineItems {
    pub ebit: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_debt: Option<f64>,
    pub cash: Option<f64>,
    pub total_assets: Option<f64>,
    pub current_liabilities: Option<f64>,
    pub net_fixed_assets: Option<f64>,
}

impl LineItems {
    pub fn resolve(
        income: &FinancialStatement,
        balance: &FinancialStatement,
        quote: &FastQuote,
    ) -> Self {
        Self {
            ebit: income.first_present(EBIT_KEYS),
            market_cap: quote.market_cap,
            total_debt: balance.latest(TOTAL_DEBT_KEY),
            cash: balance.first_present(CASH_KEYS),
            total_assets: balance.latest(TOTAL_ASSETS_KEY),
            current_liabilities: balance.latest(CURRENT_LIABILITIES_KEY),
            net_fixed_assets: balance.latest(NET_FIXED_ASSETS_KEY),
        }
    }
}

// ---------------------------------------------------------------------------
// Derived metrics
// ---------------------------------------------------------------------------

/// Zero counts as missing for the guarded computations.
fn nonzero(v: Option<f64>) -> Option<f64> {
    v.filter(|x| *x != 0.0)
}

/// EV = market cap + total debt - cash. Null without a (non-zero) market cap.
pub fn enterprise_value(items: &LineItems, policy: MissingValuePolicy) -> Option<f64> {
    let market_cap = nonzero(items.market_cap)?;
    let (debt, cash) = match policy {
        MissingValuePolicy::MissingAsZero => {
            (items.total_debt.unwrap_or(0.0), items.cash.unwrap_or(0.0))
        }
        MissingValuePolicy::Propagate => (items.total_debt?, items.cash?),
    };
    Some(market_cap + debt - cash)
}

/// Net working capital = total assets - current liabilities.
pub fn net_working_capital(items: &LineItems) -> Option<f64> {
    let assets = nonzero(items.total_assets)?;
    let liabilities = nonzero(items.current_liabilities)?;
    Some(assets - liabilities)
}

/// Turn resolved line items into a record, or the insufficient-data outcome.
///
/// A zero capital employed (NWC + net fixed assets) counts as missing, like
/// the other guarded inputs, and leaves ROC null.
pub fn compute(
    ticker: &TickerSymbol,
    items: &LineItems,
    policy: MissingValuePolicy,
) -> Extraction {
    let ev = enterprise_value(items, policy);
    let (Some(ebit), Some(ev)) = (items.ebit, ev) else {
        return Extraction::InsufficientData {
            ticker: ticker.clone(),
        };
    };

    let ey = nonzero(Some(ev)).map(|ev| ebit / ev);

    let nwc = net_working_capital(items);
    let roc = match (nonzero(Some(ebit)), nonzero(nwc), nonzero(items.net_fixed_assets)) {
        (Some(ebit), Some(nwc), Some(nfa)) => {
            nonzero(Some(nwc + nfa)).map(|capital| ebit / capital)
        }
        _ => None,
    };

    Extraction::Record(FundamentalsRecord {
        ticker: ticker.clone(),
        ebit: Some(ebit),
        ev: Some(ev),
        ey,
        roc,
    })
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

pub struct FundamentalsExtractor {
    provider: Box<dyn FinancialDataProvider>,
    policy: MissingValuePolicy,
}

impl FundamentalsExtractor {
    pub fn new(provider: Box<dyn FinancialDataProvider>, policy: MissingValuePolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> MissingValuePolicy {
        self.policy
    }

    /// Extract fundamentals for one ticker. Never fails: errors are logged
    /// and returned as `Extraction::Failed`.
    pub async fn extract(&self, ticker: &TickerSymbol) -> Extraction {
        match self.try_extract(ticker).await {
            Ok(Extraction::Record(record)) => {
                info!(
                    ticker = %ticker,
                    ebit = ?record.ebit,
                    ev = ?record.ev,
                    ey = ?record.ey,
                    roc = ?record.roc,
                    "{record}"
                );
                Extraction::Record(record)
            }
            Ok(other) => {
                warn!(ticker = %ticker, "{ticker}: insufficient data");
                other
            }
            Err(e) => {
                let reason = format!("{e:#}");
                error!(
                    ticker = %ticker,
                    provider = self.provider.name(),
                    error = %reason,
                    "Extraction failed"
                );
                Extraction::Failed {
                    ticker: ticker.clone(),
                    reason,
                }
            }
        }
    }

    async fn try_extract(&self, ticker: &TickerSymbol) -> Result<Extraction> {
        let income = self
            .provider
            .income_statement(ticker)
            .await
            .context("income statement")?;
        let balance = self
            .provider
            .balance_sheet(ticker)
            .await
            .context("balance sheet")?;
        let quote = self
            .provider
            .fast_quote(ticker)
            .await
            .context("fast quote")?;

        let items = LineItems::resolve(&income, &balance, &quote);
        if items.ebit.is_none() {
            let mut available: Vec<&str> = income.line_items().collect();
            available.sort_unstable();
            debug!(ticker = %ticker, ?available, "No EBIT line item in income statement");
        }
        Ok(compute(ticker, &items, self.policy))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
