//! End-to-end pipeline scenarios.

use chrono::NaiveDate;
use std::path::PathBuf;

use magic_formula::config::UniverseConfig;
use magic_formula::engine::batch::BatchRunner;
use magic_formula::engine::extractor::{FundamentalsExtractor, MissingValuePolicy};
use magic_formula::engine::ranker;
use magic_formula::storage;
use magic_formula::types::{TickerSymbol, Validity};
use magic_formula::universe::UniverseBuilder;

use crate::mock_provider::{MockListingSource, MockProvider, MockTicker};

const NASDAQ_URL: &str = "mock://nasdaqlisted.txt";
const OTHER_URL: &str = "mock://otherlisted.txt";

const NASDAQ: &str = "\
Symbol|Security Name|Market Category|Test Issue|Financial Status|Round Lot Size|ETF|NextShares
ABC|ABC Common Stock|Q|N|N|100|N|N
XYZ|XYZ Preferred Shares|Q|N|N|100|N|N
NOEB|No Ebit Corp Common Stock|Q|N|N|100|N|N
File Creation Time: 0107202618:01|||||||
";

const OTHER: &str = "\
ACT Symbol|Security Name|Exchange|CQS Symbol|ETF|Round Lot Size|Test Issue|NASDAQ Symbol
BRK.B|Berkshire Hathaway Inc. Class B|N|BRK.B|N|100|N|BRK=B
LOSS|Loss Maker Corp Common Stock|N|LOSS|N|100|N|LOSS
ARCX|Arca Listed Co Common Stock|P|ARCX|N|100|N|ARCX
GONE|Gone Corp Ordinary Shares|N|GONE|N|100|N|GONE
File Creation Time: 0107202618:01
";

fn universe_config() -> UniverseConfig {
    let mut cfg = UniverseConfig::default();
    cfg.primary.url = NASDAQ_URL.to_string();
    cfg.secondary.url = OTHER_URL.to_string();
    cfg
}

fn listings() -> MockListingSource {
    MockListingSource::new(&[(NASDAQ_URL, NASDAQ), (OTHER_URL, OTHER)])
}

fn provider() -> MockProvider {
    MockProvider::new(vec![
        // EV = 900 + 200 - 100 = 1000, NWC = 300, ROC = 100 / 500
        ("ABC", MockTicker::complete(100.0, 900.0, 200.0, 100.0, 500.0, 200.0, 200.0)),
        ("NOEB", MockTicker::without_ebit(5_000.0)),
        // EV = 500, zero net PPE leaves ROC null
        ("BRK-B", MockTicker::complete(50.0, 450.0, 100.0, 50.0, 300.0, 100.0, 0.0)),
        // Negative EBIT: ranked but flagged out
        ("LOSS", MockTicker::complete(-10.0, 1_000.0, 0.0, 0.0, 500.0, 100.0, 100.0)),
    ])
}

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("magic_formula_it_{}", uuid::Uuid::new_v4()))
}

fn symbols(tickers: &[TickerSymbol]) -> Vec<&str> {
    tickers.iter().map(|t| t.as_str()).collect()
}

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 7).unwrap()
}

#[tokio::test]
async fn test_universe_from_feeds() {
    let cfg = universe_config();
    let tickers = UniverseBuilder::new(&cfg).build(&listings(), &cfg).await.unwrap();
    // XYZ dropped by "Preferred", ARCX by exchange, BRK.B cleaned.
    assert_eq!(symbols(&tickers), vec!["ABC", "NOEB", "BRK-B", "LOSS", "GONE"]);
}

#[tokio::test]
async fn test_universe_respects_max_tickers() {
    let cfg = UniverseConfig {
        max_tickers: Some(2),
        ..universe_config()
    };
    let tickers = UniverseBuilder::new(&cfg).build(&listings(), &cfg).await.unwrap();
    assert_eq!(symbols(&tickers), vec!["ABC", "NOEB"]);
}

#[tokio::test]
async fn test_unreachable_feed_is_fatal() {
    let cfg = universe_config();
    let only_primary = MockListingSource::new(&[(NASDAQ_URL, NASDAQ)]);
    let err = UniverseBuilder::new(&cfg)
        .build(&only_primary, &cfg)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("secondary listing feed"));
}

#[tokio::test]
async fn test_end_to_end_fetch_and_rank() {
    let cfg = universe_config();
    let tickers = UniverseBuilder::new(&cfg).build(&listings(), &cfg).await.unwrap();

    let provider = provider();
    let extractor =
        FundamentalsExtractor::new(Box::new(provider.clone()), MissingValuePolicy::MissingAsZero);
    let report = BatchRunner::with_delay_secs(extractor, 0.0)
        .unwrap()
        .run(&tickers)
        .await;

    assert_eq!(provider.queried(), vec!["ABC", "NOEB", "BRK-B", "LOSS", "GONE"]);
    assert_eq!(report.processed, 5);
    assert_eq!(report.records.len(), 3);
    assert_eq!(symbols(&report.insufficient), vec!["NOEB"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0.as_str(), "GONE");

    let dir = temp_dir();
    let intermediate = report.persist(&dir, "nyse", run_date()).unwrap();
    assert_eq!(
        intermediate.file_name().unwrap().to_str().unwrap(),
        "magic_formula_nyse_07012026.csv"
    );

    let output = dir.join(storage::ranked_filename("nyse"));
    let ranked = ranker::rank_file(&intermediate, &output).unwrap();

    let order: Vec<&str> = ranked.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(order, vec!["ABC", "BRK-B", "LOSS"]);

    // EY ties between ABC and BRK-B; only ABC has a ROC rank.
    assert_eq!(ranked[0].rank_ey, Some(1.5));
    assert_eq!(ranked[1].rank_ey, Some(1.5));
    assert_eq!(ranked[0].score, Some(2.5));
    assert_eq!(ranked[1].score, None);

    assert_eq!(ranked[2].out_in, Validity::Out);
    assert!(ranked[..2].iter().all(|r| r.out_in == Validity::In));

    // Re-ranking the same dataset yields an identical file.
    let again = dir.join("ranking_again.csv");
    ranker::rank_file(&intermediate, &again).unwrap();
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        std::fs::read_to_string(&again).unwrap()
    );

    let preview = ranker::format_preview(&ranked, 20);
    assert_eq!(preview.lines().count(), 4);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_provider_outage_still_produces_output() {
    let cfg = universe_config();
    let tickers = UniverseBuilder::new(&cfg).build(&listings(), &cfg).await.unwrap();

    let provider = provider();
    provider.set_error("HTTP 503 Service Unavailable");
    let extractor =
        FundamentalsExtractor::new(Box::new(provider.clone()), MissingValuePolicy::MissingAsZero);
    let report = BatchRunner::with_delay_secs(extractor, 0.0)
        .unwrap()
        .run(&tickers)
        .await;

    assert_eq!(report.processed, tickers.len());
    assert!(report.records.is_empty());
    assert_eq!(report.failed.len(), tickers.len());

    let dir = temp_dir();
    let intermediate = report.persist(&dir, "nyse", run_date()).unwrap();
    assert!(intermediate.exists());

    let ranked = ranker::rank_file(&intermediate, &dir.join("ranked.csv")).unwrap();
    assert!(ranked.is_empty());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_strict_policy_drops_tickers_without_debt() {
    let period = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    let mut sparse = MockTicker::complete(100.0, 900.0, 0.0, 0.0, 500.0, 200.0, 200.0);
    sparse.balance = magic_formula::provider::FinancialStatement::single_period(
        period,
        &[("Total Assets", 500.0)],
    );
    let provider = MockProvider::new(vec![("ABC", sparse)]);
    let tickers = vec![TickerSymbol::new("ABC")];

    let lenient = FundamentalsExtractor::new(
        Box::new(provider.clone()),
        MissingValuePolicy::MissingAsZero,
    );
    let report = BatchRunner::with_delay_secs(lenient, 0.0)
        .unwrap()
        .run(&tickers)
        .await;
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].ev, Some(900.0));
    assert_eq!(report.records[0].roc, None);

    let strict = FundamentalsExtractor::new(Box::new(provider), MissingValuePolicy::Propagate);
    let report = BatchRunner::with_delay_secs(strict, 0.0)
        .unwrap()
        .run(&tickers)
        .await;
    assert!(report.records.is_empty());
    assert_eq!(symbols(&report.insufficient), vec!["ABC"]);
}
