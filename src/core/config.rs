use crate::core::loader::RatePolicy;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    /// The local price database.
    #[default]
    Database,
    /// Live quotes from Yahoo Finance.
    Yahoo,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct PricesConfig {
    #[serde(default)]
    pub source: PriceSource,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
    /// Ticker suffix per symbol namespace, e.g. `ASX: ".AX"`.
    #[serde(default)]
    pub exchanges: BTreeMap<String, String>,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        YahooProviderConfig {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            exchanges: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig::default()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Base currency all values are converted into.
    pub currency: String,
    /// Ledger account holding the cash balances, e.g. `Assets:Investments:Cash`.
    pub cash_root: Option<String>,
    /// YAML file with the asset classes, their targets and the stock links.
    pub allocation_path: PathBuf,
    /// YAML file with security quantities and account balances.
    pub ledger_path: PathBuf,
    pub price_db_path: Option<PathBuf>,
    #[serde(default)]
    pub rate_policy: RatePolicy,
    #[serde(default)]
    pub prices: PricesConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "asset-allocation")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    /// Location of the price database, the configured one or the platform data dir.
    pub fn price_db_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.price_db_path {
            return Ok(custom_path.clone());
        }
        let proj_dirs = ProjectDirs::from("", "", "asset-allocation")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().join("prices"))
    }

    pub fn yahoo(&self) -> YahooProviderConfig {
        self.providers.yahoo.clone().unwrap_or_default()
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        // Relative data paths are resolved against the config file's directory.
        if let Some(dir) = path.as_ref().parent() {
            config.allocation_path = dir.join(&config.allocation_path);
            config.ledger_path = dir.join(&config.ledger_path);
            config.price_db_path = config.price_db_path.map(|p| dir.join(p));
        }
        debug!("Successfully loaded config");
        Ok(config)
    }
}
