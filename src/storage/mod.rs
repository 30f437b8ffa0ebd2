//! Persistence layer.
//!
//! Saves and loads the intermediate fundamentals dataset, and saves the
//! final ranked dataset, as CSV. The header row is always written, even for an
//! empty dataset, so the ranking stage can read back any completed run.
//!
//! Intermediate: `magic_formula_<exchange>_<DDMMYYYY>.csv`
//! (`Ticker,EBIT,EV,EY,ROC`).
//! Ranked: `ranking_magic_formula_<exchange>.csv`
//! (adds `rank_EY,rank_ROC,score,out_in`).

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::types::{FundamentalsRecord, RankedRecord, ScreenerError};

pub const FUNDAMENTALS_HEADER: [&str; 5] = ["Ticker", "EBIT", "EV", "EY", "ROC"];

pub const RANKED_HEADER: [&str; 9] = [
    "Ticker", "EBIT", "EV", "EY", "ROC", "rank_EY", "rank_ROC", "score", "out_in",
];

/// `magic_formula_nyse_07012026.csv` for label `nyse` on 7 Jan 2026.
pub fn intermediate_filename(exchange_label: &str, date: NaiveDate) -> String {
    format!("magic_formula_{exchange_label}_{}.csv", date.format("%d%m%Y"))
}

pub fn ranked_filename(exchange_label: &str) -> String {
    format!("ranking_magic_formula_{exchange_label}.csv")
}

pub fn save_fundamentals(records: &[FundamentalsRecord], path: &Path) -> Result<()> {
    write_csv(records, &FUNDAMENTALS_HEADER, path)?;
    info!(path = %path.display(), rows = records.len(), "Fundamentals dataset saved");
    Ok(())
}

pub fn load_fundamentals(path: &Path) -> Result<Vec<FundamentalsRecord>> {
    read_csv(path, &FUNDAMENTALS_HEADER)
}

pub fn save_ranked(records: &[RankedRecord], path: &Path) -> Result<()> {
    write_csv(records, &RANKED_HEADER, path)?;
    info!(path = %path.display(), rows = records.len(), "Ranked dataset saved");
    Ok(())
}

fn write_csv<T: Serialize>(records: &[T], header: &[&str], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    wtr.write_record(header)
        .with_context(|| format!("Failed to write header to {}", path.display()))?;
    for record in records {
        wtr.serialize(record)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    wtr.flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

fn read_csv<T: DeserializeOwned>(path: &Path, required: &[&str]) -> Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = rdr
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(ScreenerError::Storage(format!(
                "{} is missing column '{column}'",
                path.display()
            ))
            .into());
        }
    }

    let mut rows = Vec::new();
    for (i, row) in rdr.deserialize().enumerate() {
        // +2: 1-based lines, header on line 1
        let row: T = row.with_context(|| format!("{}: bad row at line {}", path.display(), i + 2))?;
        rows.push(row);
    }

    debug!(path = %path.display(), rows = rows.len(), "Dataset loaded");
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
