//! Mock data sources for integration testing.
//!
//! Provides deterministic `FinancialDataProvider` and `ListingSource`
//! implementations backed by in-memory maps, with a forced-error switch
//! and a call log so tests can check ordering.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use magic_formula::listing::ListingSource;
use magic_formula::provider::{FastQuote, FinancialDataProvider, FinancialStatement};
use magic_formula::types::TickerSymbol;

/// Statements and quote served for one ticker.
#[derive(Debug, Clone, Default)]
pub struct MockTicker {
    pub income: FinancialStatement,
    pub balance: FinancialStatement,
    pub quote: FastQuote,
}

impl MockTicker {
    /// A ticker with every line item the extractor looks for.
    pub fn complete(
        ebit: f64,
        market_cap: f64,
        debt: f64,
        cash: f64,
        assets: f64,
        liabilities: f64,
        ppe: f64,
    ) -> Self {
        let period = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        Self {
            income: FinancialStatement::single_period(period, &[("EBIT", ebit)]),
            balance: FinancialStatement::single_period(
                period,
                &[
                    ("Total Debt", debt),
                    ("Cash And Cash Equivalents", cash),
                    ("Total Assets", assets),
                    ("Current Liabilities", liabilities),
                    ("Net PPE", ppe),
                ],
            ),
            quote: FastQuote {
                market_cap: Some(market_cap),
                currency: Some("USD".to_string()),
            },
        }
    }

    /// A ticker whose income statement has neither EBIT nor Operating Income.
    pub fn without_ebit(market_cap: f64) -> Self {
        let period = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        Self {
            income: FinancialStatement::single_period(period, &[("Total Revenue", 1_000.0)]),
            balance: FinancialStatement::new(),
            quote: FastQuote {
                market_cap: Some(market_cap),
                currency: None,
            },
        }
    }
}

/// A mock financial data provider. Unknown tickers return an error.
#[derive(Clone, Default)]
pub struct MockProvider {
    tickers: Arc<HashMap<String, MockTicker>>,
    calls: Arc<Mutex<Vec<String>>>,
    /// If set, every call returns this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockProvider {
    pub fn new(tickers: Vec<(&str, MockTicker)>) -> Self {
        Self {
            tickers: Arc::new(
                tickers
                    .into_iter()
                    .map(|(t, m)| (t.to_string(), m))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Tickers queried, in call order (one entry per income-statement call).
    pub fn queried(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn lookup(&self, ticker: &TickerSymbol) -> Result<MockTicker> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(anyhow!("{}", err));
        }
        self.tickers
            .get(ticker.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("No data found, symbol may be delisted: {ticker}"))
    }
}

#[async_trait]
impl FinancialDataProvider for MockProvider {
    async fn income_statement(&self, ticker: &TickerSymbol) -> Result<FinancialStatement> {
        self.calls.lock().unwrap().push(ticker.to_string());
        Ok(self.lookup(ticker)?.income)
    }

    async fn balance_sheet(&self, ticker: &TickerSymbol) -> Result<FinancialStatement> {
        Ok(self.lookup(ticker)?.balance)
    }

    async fn fast_quote(&self, ticker: &TickerSymbol) -> Result<FastQuote> {
        Ok(self.lookup(ticker)?.quote)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Listing source serving fixed text per URL. Unknown URLs fail.
#[derive(Default)]
pub struct MockListingSource {
    feeds: HashMap<String, String>,
}

impl MockListingSource {
    pub fn new(feeds: &[(&str, &str)]) -> Self {
        Self {
            feeds: feeds
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl ListingSource for MockListingSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.feeds
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused: {url}"))
    }
}
