//! Batch runner.
//!
//! Walks the ticker universe strictly in order, one provider round-trip at
//! a time, with a fixed pause between tickers. The pause is the only rate
//! limit against the data provider, so the loop must stay sequential.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::engine::extractor::FundamentalsExtractor;
use crate::storage;
use crate::types::{Extraction, FundamentalsRecord, TickerSymbol};

/// Result of one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub records: Vec<FundamentalsRecord>,
    pub insufficient: Vec<TickerSymbol>,
    pub failed: Vec<(TickerSymbol, String)>,
    pub processed: usize,
}

impl BatchReport {
    pub fn skipped(&self) -> usize {
        self.insufficient.len() + self.failed.len()
    }

    /// Write the records as `magic_formula_<label>_<DDMMYYYY>.csv` in `dir`.
    pub fn persist(&self, dir: &Path, exchange_label: &str, date: NaiveDate) -> Result<PathBuf> {
        let path = dir.join(storage::intermediate_filename(exchange_label, date));
        storage::save_fundamentals(&self.records, &path)?;
        Ok(path)
    }
}

/// `3/120 - BRK-B` for the third of 120 tickers.
pub fn progress_line(index: usize, total: usize, ticker: &TickerSymbol) -> String {
    format!("{}/{} - {}", index + 1, total, ticker)
}

pub struct BatchRunner {
    extractor: FundamentalsExtractor,
    delay: Duration,
}

impl BatchRunner {
    pub fn new(extractor: FundamentalsExtractor, delay: Duration) -> Self {
        Self { extractor, delay }
    }

    /// Delay from a number of seconds. Negative, non-finite or out-of-range
    /// values are rejected.
    pub fn with_delay_secs(extractor: FundamentalsExtractor, seconds: f64) -> Result<Self> {
        let delay = Duration::try_from_secs_f64(seconds)
            .with_context(|| format!("Invalid inter-call delay of {seconds} seconds"))?;
        Ok(Self::new(extractor, delay))
    }

    pub async fn run(&self, tickers: &[TickerSymbol]) -> BatchReport {
        let total = tickers.len();
        let mut report = BatchReport::default();

        info!(
            total,
            delay = ?self.delay,
            policy = ?self.extractor.policy(),
            "Starting batch run"
        );

        for (i, ticker) in tickers.iter().enumerate() {
            match self.extractor.extract(ticker).await {
                Extraction::Record(record) => report.records.push(record),
                Extraction::InsufficientData { ticker } => report.insufficient.push(ticker),
                Extraction::Failed { ticker, reason } => report.failed.push((ticker, reason)),
            }
            report.processed += 1;

            info!("{}", progress_line(i, total, ticker));

            if i + 1 < total && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        if report.skipped() > 0 {
            warn!(
                insufficient = report.insufficient.len(),
                failed = report.failed.len(),
                "Some tickers were skipped"
            );
        }
        info!(
            processed = report.processed,
            records = report.records.len(),
            skipped = report.skipped(),
            "Batch run complete"
        );

        report
    }
}
