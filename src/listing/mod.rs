//! Exchange listing feeds.
//!
//! Defines the `ListingSource` trait (a remote fetch returning delimited
//! text) and the pipe-delimited parser that turns a symbol directory file
//! into `ListingRecord`s.
//!
//! Feed format (nasdaqtrader symbol directory):
//! `Symbol|Security Name|Market Category|...` with a trailing
//! `File Creation Time: ...` row that has a single field.

use anyhow::{Context, Result};
use async_trait::async_trait;
use csv::ReaderBuilder;
use reqwest::Client;
use tracing::debug;

use crate::config::FeedConfig;
use crate::types::{ListingRecord, ScreenerError};

const SECURITY_NAME_COLUMN: &str = "Security Name";
const EXCHANGE_COLUMN: &str = "Exchange";

/// Abstraction over the remote listing file fetch.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch the raw delimited text at `url`.
    async fn fetch(&self, url: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

pub struct HttpListingSource {
    http: Client,
}

impl HttpListingSource {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client for listing feeds")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!(url, "Fetching listing feed");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ScreenerError::ListingFeed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(ScreenerError::ListingFeed {
                url: url.to_string(),
                message: format!("HTTP {status}"),
            }
            .into());
        }

        resp.text()
            .await
            .with_context(|| format!("Failed to read listing feed body from {url}"))
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Fetch and parse one feed.
pub async fn load_feed(source: &dyn ListingSource, feed: &FeedConfig) -> Result<Vec<ListingRecord>> {
    let text = source.fetch(&feed.url).await?;
    parse_listing(&text, feed)
}

/// Parse pipe-delimited listing text into records.
///
/// Columns are looked up by header name. The symbol and security-name
/// columns are required; the exchange comes from the `Exchange` column when
/// present, otherwise from the feed's `exchange_tag`. Rows with a blank
/// symbol are dropped.
pub fn parse_listing(text: &str, feed: &FeedConfig) -> Result<Vec<ListingRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ScreenerError::ListingFeed {
            url: feed.url.clone(),
            message: format!("unreadable header row: {e}"),
        })?
        .clone();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let missing = |name: &str| ScreenerError::MissingColumn {
        url: feed.url.clone(),
        column: name.to_string(),
    };

    let symbol_idx = column(&feed.symbol_column).ok_or_else(|| missing(&feed.symbol_column))?;
    let name_idx = column(SECURITY_NAME_COLUMN).ok_or_else(|| missing(SECURITY_NAME_COLUMN))?;
    let exchange_idx = column(EXCHANGE_COLUMN);

    let tag = feed.exchange_tag.as_deref().unwrap_or_default();
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row.map_err(|e| ScreenerError::ListingFeed {
            url: feed.url.clone(),
            message: format!("malformed row: {e}"),
        })?;

        let symbol = row.get(symbol_idx).unwrap_or_default();
        if symbol.is_empty() {
            continue;
        }

        let exchange = match (&feed.exchange_tag, exchange_idx) {
            (Some(_), _) | (None, None) => tag,
            (None, Some(idx)) => row.get(idx).unwrap_or_default(),
        };

        records.push(ListingRecord::new(
            symbol,
            row.get(name_idx).unwrap_or_default(),
            exchange,
        ));
    }

    debug!(url = %feed.url, rows = records.len(), "Listing feed parsed");
    Ok(records)
}
