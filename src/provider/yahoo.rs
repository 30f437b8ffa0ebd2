//! Yahoo Finance fundamentals provider.
//!
//! Statement line items and market capitalisation come from the
//! fundamentals-timeseries endpoint, one request per statement.
//!
//! API: `{base}/ws/fundamentals-timeseries/v1/finance/timeseries/{symbol}`
//! Query: `type=annualEBIT,annualTotalDebt,...&period1=..&period2=..`
//! Auth: none. Rate limit: undocumented, HTTP 429 when exceeded.
//!
//! Each requested type comes back as its own result object:
//! `{"meta":{"type":["annualEBIT"]},"annualEBIT":[{"asOfDate":..,"reportedValue":{"raw":..}}, null, ..]}`
//! Type keys are turned into display line-item names
//! (`annualNetPPE` -> `Net PPE`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{FastQuote, FinancialDataProvider, FinancialStatement};
use crate::config::ProviderConfig;
use crate::types::{ScreenerError, TickerSymbol};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const PROVIDER_NAME: &str = "yahoo";

const TIMESERIES_PATH: &str = "/ws/fundamentals-timeseries/v1/finance/timeseries";

/// Earliest period requested (1985-08-22), far enough back for every filer.
const PERIOD_START: i64 = 493_590_046;

const INCOME_TYPES: &[&str] = &[
    "EBIT",
    "OperatingIncome",
    "TotalRevenue",
    "PretaxIncome",
    "NetIncome",
];

const BALANCE_TYPES: &[&str] = &[
    "TotalDebt",
    "CashAndCashEquivalents",
    "CashCashEquivalentsAndShortTermInvestments",
    "TotalAssets",
    "CurrentAssets",
    "CurrentLiabilities",
    "NetPPE",
    "StockholdersEquity",
];

const MARKET_CAP_TYPE: &str = "trailingMarketCap";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    timeseries: TimeseriesBody,
}

#[derive(Debug, Deserialize)]
struct TimeseriesBody {
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataPoint {
    as_of_date: String,
    #[serde(default)]
    currency_code: Option<String>,
    #[serde(default)]
    reported_value: Option<ReportedValue>,
}

#[derive(Debug, Deserialize)]
struct ReportedValue {
    #[serde(default)]
    raw: Option<f64>,
}

/// One parsed timeseries: a display line-item name and its dated values.
#[derive(Debug, Clone, PartialEq)]
struct Series {
    line_item: String,
    points: Vec<(NaiveDate, Option<f64>)>,
    currency: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Yahoo Finance fundamentals client.
pub struct YahooClient {
    http: Client,
    base_url: String,
}

impl YahooClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()
            .context("Failed to build HTTP client for Yahoo Finance")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_series(&self, ticker: &TickerSymbol, types: &[String]) -> Result<Vec<Series>> {
        let symbol = urlencoding::encode(ticker.as_str());
        let url = format!(
            "{}{TIMESERIES_PATH}/{symbol}?symbol={symbol}&type={}&period1={PERIOD_START}&period2={}",
            self.base_url,
            types.join(","),
            Utc::now().timestamp(),
        );

        debug!(ticker = %ticker, url = %url, "Fetching Yahoo timeseries");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ScreenerError::Provider {
                ticker: ticker.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScreenerError::Provider {
                ticker: ticker.to_string(),
                message: "rate limited (HTTP 429)".to_string(),
            }
            .into());
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScreenerError::Provider {
                ticker: ticker.to_string(),
                message: format!("HTTP {status}: {body}"),
            }
            .into());
        }

        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read Yahoo response for {ticker}"))?;

        parse_timeseries(ticker, &body)
    }

    async fn fetch_statement(
        &self,
        ticker: &TickerSymbol,
        line_items: &[&str],
    ) -> Result<FinancialStatement> {
        let types: Vec<String> = line_items.iter().map(|k| format!("annual{k}")).collect();
        let series = self.fetch_series(ticker, &types).await?;
        Ok(build_statement(&series))
    }
}

#[async_trait]
impl FinancialDataProvider for YahooClient {
    async fn income_statement(&self, ticker: &TickerSymbol) -> Result<FinancialStatement> {
        self.fetch_statement(ticker, INCOME_TYPES).await
    }

    async fn balance_sheet(&self, ticker: &TickerSymbol) -> Result<FinancialStatement> {
        self.fetch_statement(ticker, BALANCE_TYPES).await
    }

    async fn fast_quote(&self, ticker: &TickerSymbol) -> Result<FastQuote> {
        let series = self
            .fetch_series(ticker, &[MARKET_CAP_TYPE.to_string()])
            .await?;
        Ok(quote_from(&series))
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse a timeseries response body into series, skipping types with no data.
fn parse_timeseries(ticker: &TickerSymbol, body: &str) -> Result<Vec<Series>> {
    let malformed = |message: String| ScreenerError::MalformedResponse {
        ticker: ticker.to_string(),
        message,
    };

    let resp: TimeseriesResponse =
        serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;

    if let Some(err) = resp.timeseries.error.filter(|e| !e.is_null()) {
        return Err(ScreenerError::Provider {
            ticker: ticker.to_string(),
            message: err.to_string(),
        }
        .into());
    }

    let mut out = Vec::new();
    for result in resp.timeseries.result.unwrap_or_default() {
        let type_key = result
            .pointer("/meta/type/0")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("result without meta.type".to_string()))?;

        let Some(raw_points) = result.get(type_key) else {
            continue;
        };
        let entries: Vec<Option<DataPoint>> = serde_json::from_value(raw_points.clone())
            .map_err(|e| malformed(format!("{type_key}: {e}")))?;

        let mut currency = None;
        let mut points = Vec::new();
        for p in entries.into_iter().flatten() {
            let date = NaiveDate::parse_from_str(&p.as_of_date, "%Y-%m-%d")
                .map_err(|e| malformed(format!("{type_key}: bad asOfDate {}: {e}", p.as_of_date)))?;
            if currency.is_none() {
                currency = p.currency_code;
            }
            points.push((date, p.reported_value.and_then(|v| v.raw)));
        }

        out.push(Series {
            line_item: line_item_name(type_key),
            points,
            currency,
        });
    }

    Ok(out)
}

fn build_statement(series: &[Series]) -> FinancialStatement {
    let mut stmt = FinancialStatement::new();
    for s in series {
        for (date, value) in &s.points {
            stmt.insert(&s.line_item, *date, *value);
        }
    }
    stmt
}

fn quote_from(series: &[Series]) -> FastQuote {
    let latest = series
        .iter()
        .filter(|s| s.line_item == "Market Cap")
        .flat_map(|s| s.points.iter().map(move |p| (p, &s.currency)))
        .max_by_key(|((date, _), _)| *date);

    match latest {
        Some(((_, value), currency)) => FastQuote {
            market_cap: *value,
            currency: currency.clone(),
        },
        None => FastQuote::default(),
    }
}

/// `annualCashAndCashEquivalents` -> `Cash And Cash Equivalents`,
/// `annualNetPPE` -> `Net PPE`, `trailingMarketCap` -> `Market Cap`.
pub fn line_item_name(type_key: &str) -> String {
    let key = ["annual", "quarterly", "trailing"]
        .iter()
        .find_map(|prefix| type_key.strip_prefix(prefix))
        .unwrap_or(type_key);

    let chars: Vec<char> = key.chars().collect();
    let mut name = String::with_capacity(key.len() + 8);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                name.push(' ');
            }
        }
        name.push(c);
    }
    name
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
