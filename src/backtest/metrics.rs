// Performance metrics: pure reductions over the trade ledger and equity
// curve, never a re-simulation.

use crate::backtest::EquityPoint;
use crate::core::position::Trade;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub total_return_pct: f64,
    /// Compounded from the explicit first-to-last period length.
    pub annualized_return_pct: f64,
    /// Minimum of the running drawdown series; zero or negative.
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    /// Gross profit over gross loss; `f64::INFINITY` for a loss-free ledger
    /// with gains, `0.0` when there are no gains either.
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
}

pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Reduce a finished run to its performance report.
    pub fn summarize(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
    ) -> PerformanceReport {
        if equity_curve.is_empty() {
            return Self::empty_report();
        }

        let final_equity = equity_curve[equity_curve.len() - 1].equity;
        let total_return_pct = (final_equity / initial_capital - 1.0) * 100.0;

        let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count();
        let losing_trades = trades.iter().filter(|t| t.pnl < 0.0).count();
        let win_rate_pct = if trades.is_empty() {
            0.0
        } else {
            winning_trades as f64 / trades.len() as f64 * 100.0
        };

        let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
        let gross_loss: f64 = trades
            .iter()
            .filter(|t| t.pnl < 0.0)
            .map(|t| t.pnl.abs())
            .sum();
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let max_drawdown_pct = equity_curve
            .iter()
            .map(|p| p.drawdown)
            .fold(0.0, f64::min)
            * 100.0;

        PerformanceReport {
            total_return_pct,
            annualized_return_pct: Self::annualized_return_pct(
                equity_curve,
                initial_capital,
                final_equity,
                total_return_pct,
            ),
            max_drawdown_pct,
            win_rate_pct,
            profit_factor,
            sharpe_ratio: Self::sharpe_ratio(equity_curve),
            total_trades: trades.len(),
            winning_trades,
            losing_trades,
        }
    }

    pub fn empty_report() -> PerformanceReport {
        PerformanceReport {
            total_return_pct: 0.0,
            annualized_return_pct: 0.0,
            max_drawdown_pct: 0.0,
            win_rate_pct: 0.0,
            profit_factor: 0.0,
            sharpe_ratio: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
        }
    }

    fn annualized_return_pct(
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        final_equity: f64,
        total_return_pct: f64,
    ) -> f64 {
        let first = equity_curve[0].timestamp;
        let last = equity_curve[equity_curve.len() - 1].timestamp;
        let years = (last - first).num_seconds() as f64 / SECONDS_PER_YEAR;

        if years <= 0.0 {
            return total_return_pct;
        }
        if final_equity <= 0.0 {
            return -100.0;
        }
        ((final_equity / initial_capital).powf(1.0 / years) - 1.0) * 100.0
    }

    /// Annualized Sharpe over per-bar equity returns, with the bar interval
    /// inferred from the curve's own timestamps.
    fn sharpe_ratio(equity_curve: &[EquityPoint]) -> f64 {
        if equity_curve.len() < 3 {
            return 0.0;
        }

        let returns: Array1<f64> = equity_curve
            .windows(2)
            .map(|pair| {
                if pair[0].equity > 0.0 {
                    pair[1].equity / pair[0].equity - 1.0
                } else {
                    0.0
                }
            })
            .collect();

        let mean = match returns.mean() {
            Some(m) => m,
            None => return 0.0,
        };
        let std = returns.std(1.0);
        if std <= 0.0 {
            return 0.0;
        }

        let span_seconds = (equity_curve[equity_curve.len() - 1].timestamp
            - equity_curve[0].timestamp)
            .num_seconds() as f64;
        if span_seconds <= 0.0 {
            return 0.0;
        }
        let bar_seconds = span_seconds / (equity_curve.len() - 1) as f64;
        let bars_per_year = SECONDS_PER_YEAR / bar_seconds;

        mean / std * bars_per_year.sqrt()
    }
}
