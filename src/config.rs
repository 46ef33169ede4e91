use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub understat: UnderstatConfig,
    pub sportsgambler: SportsgamblerConfig,
    pub analysis: AnalysisConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Root of the `{league}/{year}/...` CSV tree.
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnderstatConfig {
    pub base_url: String,
    pub leagues: Vec<String>,
    pub years: Vec<u32>,
    /// Embedded JavaScript variables extracted from every league page.
    pub variables: Vec<String>,
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SportsgamblerConfig {
    pub base_url: String,
    pub leagues: Vec<String>,
    /// WebDriver endpoint, e.g. a local chromedriver.
    pub webdriver_url: String,
    #[serde(default)]
    pub browser_args: Vec<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Pause after navigation before reading the page source.
    pub settle_millis: u64,
    /// Rows without lineup elements tolerated before the scan stops.
    pub max_missing_rows: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub window: usize,
    pub target: String,
    pub exclude_pattern: String,
    pub test_fraction: f64,
    pub folds: usize,
    pub seed: u64,
    pub top_features: usize,
    pub fuzzy_tolerance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_headless() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from `FOOTY_CONFIG` (or config/default.toml), after
    /// reading `.env`. `FOOTY_DATA_DIR` overrides the store location.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("FOOTY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = Self::from_file(&config_path)?;

        if let Ok(dir) = std::env::var("FOOTY_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.store.base_dir = PathBuf::from(dir);
            }
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }
}
