// Bar-by-bar simulation: engine, performance metrics, parameter sweeps.

pub mod engine;
pub mod metrics;
pub mod sweep;

pub use engine::{BacktestBuilder, BacktestEngine};
pub use metrics::{MetricsCalculator, PerformanceReport};
pub use sweep::{run_sweep, run_sweep_with_progress, ParameterGrid, SweepOutcome};

use crate::core::position::Trade;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One equity mark per processed bar. Cash carries realized PnL, the
/// mark-to-market value is the net unrealized PnL of open positions at the
/// bar close, and drawdown is measured against the running equity peak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub cash: f64,
    pub market_value: f64,
    pub equity: f64,
    /// `equity / peak_so_far - 1`; zero at a fresh peak, negative below it.
    pub drawdown: f64,
}

/// Everything a single run produces: the aggregated report, the append-only
/// trade ledger and the bar-by-bar equity curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub report: PerformanceReport,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub bars_processed: usize,
    /// Bars skipped because a required indicator was still warming up.
    pub warmup_skipped: usize,
    /// False when the run was cut short by the abort flag.
    pub completed: bool,
}

/// Cooperative cancellation handle shared between a caller and running
/// backtests. Cheap to clone; checked between bars and between sweep runs.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
