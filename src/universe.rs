//! Ticker universe builder.
//!
//! Turns the two raw listing feeds into the ordered list of
//! provider-compatible ticker symbols that the batch run walks through:
//!
//! 1. keep only rows of the secondary feed on the target exchange,
//! 2. concatenate primary + filtered secondary,
//! 3. keep rows whose security name matches an include keyword and no
//!    exclude keyword (case-insensitive substring match),
//! 4. clean each symbol for the data provider,
//! 5. optionally de-duplicate, then truncate to the configured maximum.

use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::info;

use crate::config::UniverseConfig;
use crate::listing::{load_feed, ListingSource};
use crate::types::{ListingRecord, TickerSymbol};

// ---------------------------------------------------------------------------
// Security-name filter
// ---------------------------------------------------------------------------

/// Include/exclude keyword classifier over security names.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl KeywordFilter {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Self {
        let lower = |ws: &[S]| {
            ws.iter()
                .map(|w| w.as_ref().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            include: lower(include),
            exclude: lower(exclude),
        }
    }

    /// True when the name matches the include set and not the exclude set.
    pub fn accepts(&self, security_name: &str) -> bool {
        let name = security_name.to_lowercase();
        let hit = |set: &[String]| set.iter().any(|kw| name.contains(kw.as_str()));
        hit(&self.include) && !hit(&self.exclude)
    }
}

// ---------------------------------------------------------------------------
// Symbol cleaning
// ---------------------------------------------------------------------------

/// Replaces characters the data provider rejects (`BRK.B` -> `BRK-B`).
#[derive(Debug, Clone)]
pub struct SymbolCleaner {
    reserved: Vec<char>,
    substitute: char,
}

impl Default for SymbolCleaner {
    fn default() -> Self {
        Self::new(&['$', '.'], '-')
    }
}

impl SymbolCleaner {
    pub fn new(reserved: &[char], substitute: char) -> Self {
        Self {
            reserved: reserved.to_vec(),
            substitute,
        }
    }

    /// Clean a raw symbol. A missing or blank symbol yields `None`.
    pub fn clean(&self, raw: Option<&str>) -> Option<TickerSymbol> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        let cleaned: String = raw
            .chars()
            .map(|c| if self.reserved.contains(&c) { self.substitute } else { c })
            .collect();
        Some(TickerSymbol::new(cleaned))
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct UniverseBuilder {
    exchange: String,
    filter: KeywordFilter,
    cleaner: SymbolCleaner,
    max_tickers: Option<usize>,
    deduplicate: bool,
}

impl UniverseBuilder {
    pub fn new(config: &UniverseConfig) -> Self {
        Self {
            exchange: config.exchange.clone(),
            filter: KeywordFilter::new(&config.include_keywords, &config.exclude_keywords),
            cleaner: SymbolCleaner::new(&config.reserved_chars, config.substitute),
            max_tickers: config.max_tickers.filter(|&n| n > 0),
            deduplicate: config.deduplicate,
        }
    }

    /// Override the ticker limit (0 or `None` removes it).
    pub fn with_max_tickers(mut self, max_tickers: Option<usize>) -> Self {
        self.max_tickers = max_tickers.filter(|&n| n > 0);
        self
    }

    /// Fetch both feeds and build the universe. Any feed failure aborts.
    pub async fn build(
        &self,
        source: &dyn ListingSource,
        config: &UniverseConfig,
    ) -> Result<Vec<TickerSymbol>> {
        let primary = load_feed(source, &config.primary)
            .await
            .with_context(|| format!("Failed to load primary listing feed {}", config.primary.url))?;
        let secondary = load_feed(source, &config.secondary)
            .await
            .with_context(|| {
                format!("Failed to load secondary listing feed {}", config.secondary.url)
            })?;

        let tickers = self.from_records(primary, secondary);
        info!(
            exchange = %self.exchange,
            tickers = tickers.len(),
            "Ticker universe built"
        );
        Ok(tickers)
    }

    /// Pure part of the build: filter, concatenate, classify, clean, limit.
    pub fn from_records(
        &self,
        primary: Vec<ListingRecord>,
        secondary: Vec<ListingRecord>,
    ) -> Vec<TickerSymbol> {
        let on_exchange = secondary.into_iter().filter(|r| r.exchange == self.exchange);

        let mut tickers: Vec<TickerSymbol> = primary
            .into_iter()
            .chain(on_exchange)
            .filter(|r| self.filter.accepts(&r.security_name))
            .filter_map(|r| self.cleaner.clean(Some(&r.symbol)))
            .collect();

        if self.deduplicate {
            let mut seen = HashSet::new();
            tickers.retain(|t| seen.insert(t.clone()));
        }

        if let Some(max) = self.max_tickers {
            tickers.truncate(max);
        }

        tickers
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
