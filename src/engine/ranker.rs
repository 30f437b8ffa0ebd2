//! Magic Formula ranking.
//!
//! Ranks every fundamentals row by earnings yield and by return on capital
//! (highest value = rank 1, ties share the average rank), sums the two
//! ranks into a score, flags rows with non-positive EBIT or EV as `out`,
//! and sorts valid rows first, then by ascending score.
//!
//! Null metrics get a null rank, and a null rank gives a null score. Null
//! scores sort after every non-null score within their validity bucket.

use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info};

use crate::storage;
use crate::types::{fmt_opt, FundamentalsRecord, RankedRecord};

/// Average ranks in descending value order. Null (or NaN) inputs stay null
/// and do not occupy a rank.
pub fn rank_descending(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut order: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| !x.is_nan()).map(|x| (i, x)))
        .collect();
    order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let mut ranks = vec![None; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && order[end].1 == order[start].1 {
            end += 1;
        }
        // Positions start..end hold ranks start+1 ..= end.
        let avg = (start + 1 + end) as f64 / 2.0;
        for &(i, _) in &order[start..end] {
            ranks[i] = Some(avg);
        }
        start = end;
    }
    ranks
}

/// Ascending with nulls last.
fn cmp_score(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Rank and sort a fundamentals dataset. Every input row is kept.
pub fn rank(records: Vec<FundamentalsRecord>) -> Vec<RankedRecord> {
    let ey: Vec<Option<f64>> = records.iter().map(|r| r.ey).collect();
    let roc: Vec<Option<f64>> = records.iter().map(|r| r.roc).collect();
    let rank_ey = rank_descending(&ey);
    let rank_roc = rank_descending(&roc);

    let mut ranked: Vec<RankedRecord> = records
        .into_iter()
        .zip(rank_ey.into_iter().zip(rank_roc))
        .map(|(record, (re, rr))| RankedRecord::new(record, re, rr))
        .collect();

    // Stable, so equal keys keep input order.
    ranked.sort_by(|a, b| {
        a.out_in
            .cmp(&b.out_in)
            .then_with(|| cmp_score(a.score, b.score))
    });
    ranked
}

/// Load the intermediate dataset, rank it and write the ranked dataset.
pub fn rank_file(input: &Path, output: &Path) -> Result<Vec<RankedRecord>> {
    let records = storage::load_fundamentals(input)
        .with_context(|| format!("Failed to load fundamentals from {}", input.display()))?;
    let ranked = rank(records);
    storage::save_ranked(&ranked, output)?;
    for row in &ranked {
        debug!("{row}");
    }

    let valid = ranked.iter().filter(|r| r.out_in == crate::types::Validity::In).count();
    info!(
        input = %input.display(),
        output = %output.display(),
        rows = ranked.len(),
        valid,
        "Ranking written"
    );
    Ok(ranked)
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

const PREVIEW_HEADERS: [&str; 10] = [
    "", "Ticker", "EBIT", "EV", "EY", "ROC", "rank_EY", "rank_ROC", "score", "out_in",
];

/// Fixed-width table of the first `rows` ranked records.
pub fn format_preview(ranked: &[RankedRecord], rows: usize) -> String {
    let cells: Vec<[String; 10]> = ranked
        .iter()
        .take(rows)
        .enumerate()
        .map(|(i, r)| {
            [
                i.to_string(),
                r.ticker.to_string(),
                fmt_opt(r.ebit),
                fmt_opt(r.ev),
                fmt_opt(r.ey),
                fmt_opt(r.roc),
                fmt_opt(r.rank_ey),
                fmt_opt(r.rank_roc),
                fmt_opt(r.score),
                r.out_in.to_string(),
            ]
        })
        .collect();

    let mut widths = PREVIEW_HEADERS.map(str::len);
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let line = |row: &[String]| {
        row.iter()
            .zip(widths)
            .enumerate()
            .map(|(col, (cell, w))| {
                if col == 1 {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header: Vec<String> = PREVIEW_HEADERS.iter().map(|h| h.to_string()).collect();
    let mut out = vec![line(&header)];
    out.extend(cells.iter().map(|row| line(row)));
    out.join("\n")
}
