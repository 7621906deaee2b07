//! Bank configuration
//!
//! Tunables read once at startup: tab prices and limits, log capacities,
//! rank ladder bounds, the quota rollover period and logging options.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete guild bank configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    pub bank: BankSection,
    pub logs: LogSection,
    pub ranks: RankSection,
    pub quota: QuotaSection,
    pub logging: LoggingConfig,
}

/// Tab limits and prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankSection {
    /// Tabs a guild can own
    pub max_tabs: u8,
    /// Slots in every tab
    pub slots_per_tab: u16,
    /// Tabs a new guild starts with
    pub initial_tabs: u8,
    /// Price (copper) of tab n at index n; zero makes a tab unpurchasable
    pub tab_prices: Vec<u64>,
}

impl Default for BankSection {
    fn default() -> Self {
        Self {
            max_tabs: 6,
            slots_per_tab: 98,
            initial_tabs: 0,
            tab_prices: vec![
                1_000_000, 2_500_000, 5_000_000, 10_000_000, 25_000_000, 50_000_000,
            ],
        }
    }
}

/// Log capacities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Capacity of the roster event log
    pub event_log_capacity: u32,
    /// Capacity of each bank tab log and of the money log
    pub bank_log_capacity: u32,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            event_log_capacity: 100,
            bank_log_capacity: 25,
        }
    }
}

/// Rank ladder bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankSection {
    pub min_ranks: u8,
    pub max_ranks: u8,
}

impl Default for RankSection {
    fn default() -> Self {
        Self {
            min_ranks: 5,
            max_ranks: 10,
        }
    }
}

/// Withdrawal quota rollover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSection {
    pub rollover_period_secs: u64,
}

impl Default for QuotaSection {
    fn default() -> Self {
        Self {
            rollover_period_secs: 86_400,
        }
    }
}

/// Logging options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl BankConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: BankConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_toml_str(&contents)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bank = &self.bank;
        if bank.slots_per_tab == 0 || bank.slots_per_tab > crate::MAX_SLOTS_PER_TAB {
            return Err(ConfigError::Invalid(format!(
                "slots_per_tab must be between 1 and {}",
                crate::MAX_SLOTS_PER_TAB
            )));
        }
        if bank.initial_tabs > bank.max_tabs {
            return Err(ConfigError::Invalid(
                "initial_tabs cannot exceed max_tabs".into(),
            ));
        }
        if self.logs.event_log_capacity == 0 || self.logs.bank_log_capacity == 0 {
            return Err(ConfigError::Invalid("log capacities must be non-zero".into()));
        }
        if self.ranks.min_ranks == 0 || self.ranks.min_ranks > self.ranks.max_ranks {
            return Err(ConfigError::Invalid(
                "min_ranks must be non-zero and not exceed max_ranks".into(),
            ));
        }
        if self.quota.rollover_period_secs == 0 {
            return Err(ConfigError::Invalid(
                "rollover_period_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Price of tab `tab`, or `None` if it cannot be bought
    pub fn tab_price(&self, tab: u8) -> Option<u64> {
        self.bank
            .tab_prices
            .get(tab as usize)
            .copied()
            .filter(|price| *price > 0)
    }

    pub fn rollover_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.quota.rollover_period_secs)
    }
}
