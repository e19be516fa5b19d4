// Backtesting engine: drives the per-bar simulation loop over historical
// bars and produces the trade ledger, equity curve and performance report.

use crate::backtest::metrics::MetricsCalculator;
use crate::backtest::{AbortFlag, BacktestResult, EquityPoint};
use crate::config::{BacktestConfig, GridConfig, Midprice, RiskConfig, SizePolicy};
use crate::core::grid::{Grid, GridBuilder};
use crate::core::position::{PositionManager, Trade};
use crate::core::risk::RiskCalculator;
use crate::core::signal::SignalDetector;
use crate::data::validate_bars;
use crate::error::BacktestError;
use crate::types::Bar;
use tracing::{debug, info, warn};

/// Runs grid-strategy backtests over a prepared bar sequence.
///
/// Construction validates the whole configuration eagerly, so a run can only
/// fail on bad bar data — never after the first trade.
pub struct BacktestEngine {
    config: BacktestConfig,
    size_policy: SizePolicy,
    risk: RiskCalculator,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Result<Self, BacktestError> {
        config.validate()?;
        let size_policy = config.size_policy();
        let risk = RiskCalculator::new(config.risk.clone())?;
        Ok(Self {
            config,
            size_policy,
            risk,
        })
    }

    pub fn with_size_policy(mut self, policy: SizePolicy) -> Self {
        self.size_policy = policy;
        self
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run a full backtest. Bars must be sorted ascending with unique
    /// timestamps and at least as many bars as the indicator warm-up window.
    pub fn run(&self, bars: &[Bar]) -> Result<BacktestResult, BacktestError> {
        self.run_with_abort(bars, &AbortFlag::new())
    }

    /// Run a backtest that checks `abort` between bars. An aborted run
    /// liquidates at the last processed close and returns the partial
    /// ledger/equity curve with `completed = false`.
    pub fn run_with_abort(
        &self,
        bars: &[Bar],
        abort: &AbortFlag,
    ) -> Result<BacktestResult, BacktestError> {
        validate_bars(bars)?;

        let warmup = self.config.warmup_bars();
        if bars.len() < warmup {
            return Err(BacktestError::InsufficientData(format!(
                "need at least {} bars for indicator warm-up, got {}",
                warmup,
                bars.len()
            )));
        }

        let dynamic = self.config.grid.midprice.is_dynamic();
        // Static grids are built once; a dynamic grid is re-derived each bar.
        let mut grid: Option<Grid> = if dynamic {
            None
        } else {
            Some(GridBuilder::build(&self.config.grid)?)
        };

        info!(
            "🚀 Grid backtest: {} bars, capital {:.2}, {} midprice",
            bars.len(),
            self.config.initial_capital,
            if dynamic { "dynamic" } else { "static" }
        );

        let mut manager = PositionManager::new(self.config.max_trades);
        let mut cash = self.config.initial_capital;
        let mut peak = self.config.initial_capital;
        let mut trades: Vec<Trade> = Vec::new();
        let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(bars.len());
        let mut previous_close: Option<f64> = None;
        let mut warmup_skipped = 0usize;
        let mut bars_processed = 0usize;
        let mut aborted = false;

        for bar in bars {
            if abort.is_aborted() {
                aborted = true;
                break;
            }

            // 1. Re-center a dynamic grid on the current moving average.
            if dynamic {
                if let Some(ma) = bar.moving_average {
                    grid = Some(GridBuilder::build_at(ma, &self.config.grid)?);
                }
            }

            // 2. Exits before any same-bar entry.
            for trade in manager.evaluate_exits(bar) {
                cash += trade.pnl;
                trades.push(trade);
            }

            // 3–4. Crossing signals, opened nearest-first within capacity.
            // An ATR that has not warmed up (or a missing moving average on
            // a dynamic grid) makes the bar non-tradable, never an error.
            let atr = bar.atr.filter(|a| *a > 0.0);
            match (previous_close, atr, grid.as_ref()) {
                (Some(reference), Some(atr), Some(grid)) => {
                    for signal in SignalDetector::detect(reference, bar, grid, &manager) {
                        if !manager.has_capacity() {
                            break;
                        }
                        let side = signal.direction.side();
                        let (stop_loss, take_profit) =
                            self.risk.stops(signal.level_price, side, atr);
                        let size = self.position_size(cash, &manager, signal.level_price);
                        if size > 0.0 {
                            manager.try_open(&signal, size, stop_loss, take_profit);
                        }
                    }
                }
                (Some(_), _, _) => {
                    warmup_skipped += 1;
                    debug!("Indicators not ready at {}, bar skipped", bar.timestamp);
                }
                (None, _, _) => {
                    if bar.atr.is_none() || (dynamic && bar.moving_average.is_none()) {
                        warmup_skipped += 1;
                    }
                    debug!("No reference close yet at {}, seeding", bar.timestamp);
                }
            }

            // 5. Mark equity at the bar close.
            let market_value = manager.unrealized_pnl(bar.close);
            let equity = cash + market_value;
            peak = peak.max(equity);
            equity_curve.push(EquityPoint {
                timestamp: bar.timestamp,
                cash,
                market_value,
                equity,
                drawdown: equity / peak - 1.0,
            });

            previous_close = Some(bar.close);
            bars_processed += 1;
        }

        // Forced liquidation at the last processed close. Exiting at the
        // marking price leaves the final equity point intact.
        if bars_processed > 0 && manager.open_count() > 0 {
            let last = &bars[bars_processed - 1];
            for trade in manager.close_all(last.close, last.timestamp) {
                cash += trade.pnl;
                trades.push(trade);
            }
            debug!("Liquidated remaining positions at {:.4}", last.close);
        }

        if aborted {
            warn!(
                "⚠️  Run aborted after {} of {} bars; returning partial result",
                bars_processed,
                bars.len()
            );
        }

        if warmup_skipped > 0 {
            info!("{} bar(s) skipped during indicator warm-up", warmup_skipped);
        }

        let report =
            MetricsCalculator::summarize(&trades, &equity_curve, self.config.initial_capital);
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.config.initial_capital);

        info!(
            "✅ Backtest complete: {} trades, {:.2}% return, {:.2}% max drawdown",
            report.total_trades, report.total_return_pct, report.max_drawdown_pct
        );

        Ok(BacktestResult {
            report,
            trades,
            equity_curve,
            initial_capital: self.config.initial_capital,
            final_equity,
            bars_processed,
            warmup_skipped,
            completed: !aborted,
        })
    }

    fn position_size(&self, cash: f64, manager: &PositionManager, entry_price: f64) -> f64 {
        match self.size_policy {
            SizePolicy::FixedUnits(units) => units,
            SizePolicy::CapitalFraction(fraction) => {
                let equity = cash + manager.unrealized_pnl(entry_price);
                (equity * fraction / entry_price).max(0.0)
            }
        }
    }
}

/// Fluent construction for backtest engines.
pub struct BacktestBuilder {
    config: BacktestConfig,
    size_policy: Option<SizePolicy>,
}

impl BacktestBuilder {
    pub fn new() -> Self {
        Self {
            config: BacktestConfig::default(),
            size_policy: None,
        }
    }

    pub fn with_config(mut self, config: BacktestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_initial_capital(mut self, capital: f64) -> Self {
        self.config.initial_capital = capital;
        self
    }

    pub fn with_max_trades(mut self, max_trades: usize) -> Self {
        self.config.max_trades = max_trades;
        self
    }

    pub fn with_position_size(mut self, size: f64) -> Self {
        self.config.position_size = size;
        self
    }

    pub fn with_grid(mut self, grid: GridConfig) -> Self {
        self.config.grid = grid;
        self
    }

    pub fn with_midprice(mut self, midprice: f64) -> Self {
        self.config.grid.midprice = Midprice::Static(midprice);
        self
    }

    pub fn with_dynamic_midprice(mut self) -> Self {
        self.config.grid.midprice = Midprice::dynamic();
        self
    }

    pub fn with_grid_distance(mut self, distance: f64) -> Self {
        self.config.grid.grid_distance = distance;
        self
    }

    pub fn with_grid_range(mut self, range: f64) -> Self {
        self.config.grid.grid_range = range;
        self
    }

    pub fn with_risk(mut self, risk: RiskConfig) -> Self {
        self.config.risk = risk;
        self
    }

    pub fn with_atr_multiplier(mut self, multiplier: f64) -> Self {
        self.config.risk.atr_multiplier = multiplier;
        self
    }

    pub fn with_tp_sl_ratio(mut self, ratio: f64) -> Self {
        self.config.risk.tp_sl_ratio = ratio;
        self
    }

    pub fn with_size_policy(mut self, policy: SizePolicy) -> Self {
        self.size_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<BacktestEngine, BacktestError> {
        let engine = BacktestEngine::new(self.config)?;
        Ok(match self.size_policy {
            Some(policy) => engine.with_size_policy(policy),
            None => engine,
        })
    }
}

impl Default for BacktestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_produces_validated_engine() {
        let engine = BacktestBuilder::new()
            .with_initial_capital(5_000.0)
            .with_midprice(100.0)
            .with_grid_distance(2.0)
            .with_grid_range(10.0)
            .with_max_trades(3)
            .build()
            .unwrap();

        assert_eq!(engine.config().initial_capital, 5_000.0);
        assert_eq!(engine.config().max_trades, 3);
    }

    #[test]
    fn test_builder_rejects_invalid_grid() {
        let result = BacktestBuilder::new()
            .with_grid_distance(-1.0)
            .build();
        assert!(matches!(result, Err(BacktestError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_risk() {
        let result = BacktestBuilder::new()
            .with_atr_multiplier(0.0)
            .build();
        assert!(matches!(result, Err(BacktestError::Config(_))));
    }

    #[test]
    fn test_insufficient_bars_fail_fast() {
        let engine = BacktestBuilder::new().build().unwrap();
        // Default warm-up is the 14-bar ATR period
        let bars: Vec<Bar> = Vec::new();
        assert!(matches!(
            engine.run(&bars),
            Err(BacktestError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_size_policy_override() {
        let engine = BacktestBuilder::new()
            .with_size_policy(SizePolicy::CapitalFraction(0.1))
            .build()
            .unwrap();

        let manager = PositionManager::new(1);
        // 10% of 10_000 at price 100 buys 10 units
        assert_eq!(engine.position_size(10_000.0, &manager, 100.0), 10.0);
    }
}
