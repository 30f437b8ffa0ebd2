//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section falls back to built-in defaults, so an empty file (or a missing
//! section) yields the same screen the defaults describe.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::extractor::MissingValuePolicy;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub universe: UniverseConfig,
    pub provider: ProviderConfig,
    pub batch: BatchConfig,
    pub ranking: RankingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UniverseConfig {
    /// Exchange code kept from the secondary feed ("N" = NYSE).
    pub exchange: String,
    /// Lower-case label embedded in output filenames.
    pub exchange_label: String,
    pub include_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    /// Unset or 0 means every ticker is processed.
    pub max_tickers: Option<usize>,
    pub deduplicate: bool,
    /// Characters the data provider does not accept in symbols.
    pub reserved_chars: Vec<char>,
    pub substitute: char,
    pub primary: FeedConfig,
    pub secondary: FeedConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub symbol_column: String,
    /// Exchange code to stamp on every row when the feed has no `Exchange` column.
    #[serde(default)]
    pub exchange_tag: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatchConfig {
    /// Pause between provider calls.
    pub sleep_seconds: f64,
    pub output_dir: PathBuf,
    pub missing_policy: MissingValuePolicy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RankingConfig {
    pub input_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub preview_rows: usize,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        let words = |ws: &[&str]| ws.iter().map(|w| w.to_string()).collect();
        Self {
            exchange: "N".to_string(),
            exchange_label: "nyse".to_string(),
            include_keywords: words(&[
                "Common Stock",
                "Ordinary Shares",
                "Class A",
                "Class B",
                "Class C",
            ]),
            exclude_keywords: words(&[
                "Preferred", "ETF", "Unit", "Warrant", "Rights", "Bond", "Note", "Index", "Trust",
            ]),
            max_tickers: None,
            deduplicate: false,
            reserved_chars: vec!['$', '.'],
            substitute: '-',
            primary: FeedConfig {
                url: "https://www.nasdaqtrader.com/dynamic/SymDir/nasdaqlisted.txt".to_string(),
                symbol_column: "Symbol".to_string(),
                exchange_tag: Some("Q".to_string()),
            },
            secondary: FeedConfig {
                url: "https://www.nasdaqtrader.com/dynamic/SymDir/otherlisted.txt".to_string(),
                symbol_column: "ACT Symbol".to_string(),
                exchange_tag: None,
            },
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query2.finance.yahoo.com".to_string(),
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) magic-formula/0.1.0".to_string(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            sleep_seconds: 0.5,
            output_dir: PathBuf::from("."),
            missing_policy: MissingValuePolicy::MissingAsZero,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            input_path: None,
            output_path: None,
            preview_rows: 20,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load the file if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot be used. Run again after
    /// applying command-line overrides.
    pub fn validate(&self) -> Result<()> {
        if !self.batch.sleep_seconds.is_finite() || self.batch.sleep_seconds < 0.0 {
            anyhow::bail!(crate::types::ScreenerError::Config(format!(
                "batch.sleep_seconds must be a non-negative number, got {}",
                self.batch.sleep_seconds
            )));
        }
        if self.universe.reserved_chars.contains(&self.universe.substitute) {
            anyhow::bail!(crate::types::ScreenerError::Config(format!(
                "universe.substitute '{}' is itself a reserved character",
                self.universe.substitute
            )));
        }
        Ok(())
    }

    /// Ticker limit, with 0 treated as "no limit".
    pub fn max_tickers(&self) -> Option<usize> {
        self.universe.max_tickers.filter(|&n| n > 0)
    }
}
