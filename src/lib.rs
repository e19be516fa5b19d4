// Grid Backtester Library
//
// A deterministic bar-by-bar backtester for symmetric grid trading strategies
// with ATR-based exits and parallel parameter sweeps

pub mod backtest;
pub mod config;
pub mod core;
pub mod data; // CSV ingestion and indicator columns
pub mod error; // Unified error handling
pub mod progress;
pub mod types;

// Re-export core grid types
pub use core::{Grid, GridBuilder, GridLevel, LevelOccupancy, Position, PositionManager, RiskCalculator, SignalDetector, Trade};

// Re-export error types
pub use error::BacktestError;

// Re-export configuration
pub use config::{BacktestConfig, ConfigError, GridConfig, Midprice, RiskConfig, SizePolicy};

// Re-export bar and signal types
pub use types::{Bar, ExitReason, PositionStatus, Side, Signal, TradeDirection};

// Re-export backtesting components
pub use backtest::{
    AbortFlag, BacktestResult, EquityPoint,
    engine::{BacktestBuilder, BacktestEngine},
    metrics::{MetricsCalculator, PerformanceReport},
    sweep::{ParameterGrid, SweepOutcome, rank_by_return, run_sweep, run_sweep_with_progress},
};

// Re-export data helpers
pub use data::{attach_indicators, load_bars, load_bars_with_indicators, validate_bars};
