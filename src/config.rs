// Configuration management for the grid backtester

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Grid midprice: a fixed price, or the string `"dynamic"` to re-center the
/// grid on the moving average every bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Midprice {
    Static(f64),
    Dynamic(String),
}

impl Midprice {
    pub fn dynamic() -> Self {
        Midprice::Dynamic("dynamic".to_string())
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Midprice::Dynamic(_))
    }

    /// The fixed midprice, if this grid is not dynamic.
    pub fn static_value(&self) -> Option<f64> {
        match self {
            Midprice::Static(price) => Some(*price),
            Midprice::Dynamic(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub midprice: Midprice,
    /// Price interval between adjacent grid levels.
    pub grid_distance: f64,
    /// Total span covered on each side of the midprice.
    pub grid_range: f64,
    /// Cap on the total level count; wider spacing is substituted when exceeded.
    pub max_level_count: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            midprice: Midprice::Static(210.0),
            grid_distance: 5.0,
            grid_range: 50.0,
            max_level_count: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Stop distance in ATR units.
    pub atr_multiplier: f64,
    /// Take-profit distance as a fraction of the stop distance.
    pub tp_sl_ratio: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            atr_multiplier: 1.5,
            tp_sl_ratio: 0.6,
        }
    }
}

/// How position size is derived at entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SizePolicy {
    /// Every position holds this many units.
    FixedUnits(f64),
    /// Position units = current equity * fraction / entry price.
    CapitalFraction(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Maximum number of simultaneously open positions.
    pub max_trades: usize,
    /// Units per position (maps to `SizePolicy::FixedUnits`).
    pub position_size: f64,
    pub atr_period: usize,
    pub ma_period: usize,
    pub grid: GridConfig,
    pub risk: RiskConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            max_trades: 5,
            position_size: 100.0,
            atr_period: 14,
            ma_period: 20,
            grid: GridConfig::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl BacktestConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: BacktestConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            println!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    pub fn size_policy(&self) -> SizePolicy {
        SizePolicy::FixedUnits(self.position_size)
    }

    /// The minimum number of bars required before any signal can fire.
    pub fn warmup_bars(&self) -> usize {
        if self.grid.midprice.is_dynamic() {
            self.atr_period.max(self.ma_period)
        } else {
            self.atr_period
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.grid.midprice {
            Midprice::Static(price) => {
                if !price.is_finite() || *price <= 0.0 {
                    return Err(ConfigError::Validation("midprice must be a positive price".to_string()));
                }
            }
            Midprice::Dynamic(tag) => {
                if tag != "dynamic" {
                    return Err(ConfigError::Validation(format!(
                        "midprice must be a number or \"dynamic\", got \"{}\"",
                        tag
                    )));
                }
            }
        }

        if self.grid.grid_distance <= 0.0 {
            return Err(ConfigError::Validation("grid_distance must be positive".to_string()));
        }

        if self.grid.grid_range < 2.0 * self.grid.grid_distance {
            return Err(ConfigError::Validation(
                "grid_range must be at least twice grid_distance".to_string(),
            ));
        }

        if self.grid.max_level_count == 0 {
            return Err(ConfigError::Validation("max_level_count must be at least 1".to_string()));
        }

        if self.risk.atr_multiplier <= 0.0 {
            return Err(ConfigError::Validation("atr_multiplier must be positive".to_string()));
        }

        if self.risk.tp_sl_ratio <= 0.0 {
            return Err(ConfigError::Validation("tp_sl_ratio must be positive".to_string()));
        }

        if self.initial_capital <= 0.0 {
            return Err(ConfigError::Validation("initial_capital must be positive".to_string()));
        }

        if self.max_trades == 0 {
            return Err(ConfigError::Validation("max_trades must be at least 1".to_string()));
        }

        if self.position_size <= 0.0 {
            return Err(ConfigError::Validation("position_size must be positive".to_string()));
        }

        if self.atr_period == 0 {
            return Err(ConfigError::Validation("atr_period must be at least 1".to_string()));
        }

        if self.ma_period == 0 {
            return Err(ConfigError::Validation("ma_period must be at least 1".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
