// Parameter sweeps: independent backtests over a cartesian parameter grid,
// fanned out across a rayon worker pool.

use crate::backtest::engine::BacktestEngine;
use crate::backtest::metrics::PerformanceReport;
use crate::backtest::AbortFlag;
use crate::config::BacktestConfig;
use crate::progress::SweepProgress;
use crate::types::Bar;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Value lists for the swept parameters. An empty list keeps the base
/// config's value for that dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterGrid {
    pub grid_distances: Vec<f64>,
    pub grid_ranges: Vec<f64>,
    pub atr_multipliers: Vec<f64>,
    pub tp_sl_ratios: Vec<f64>,
}

impl ParameterGrid {
    /// Expand into concrete configs, cartesian order: distances outermost,
    /// ratios innermost. Deterministic, so sweep output order is too.
    pub fn expand(&self, base: &BacktestConfig) -> Vec<BacktestConfig> {
        let distances = Self::axis(&self.grid_distances, base.grid.grid_distance);
        let ranges = Self::axis(&self.grid_ranges, base.grid.grid_range);
        let multipliers = Self::axis(&self.atr_multipliers, base.risk.atr_multiplier);
        let ratios = Self::axis(&self.tp_sl_ratios, base.risk.tp_sl_ratio);

        let mut configs =
            Vec::with_capacity(distances.len() * ranges.len() * multipliers.len() * ratios.len());
        for &distance in &distances {
            for &range in &ranges {
                for &multiplier in &multipliers {
                    for &ratio in &ratios {
                        let mut config = base.clone();
                        config.grid.grid_distance = distance;
                        config.grid.grid_range = range;
                        config.risk.atr_multiplier = multiplier;
                        config.risk.tp_sl_ratio = ratio;
                        configs.push(config);
                    }
                }
            }
        }
        configs
    }

    /// A seeded random subsample of the expansion, for cheap exploration of
    /// large grids. The same seed always picks the same combinations.
    pub fn expand_sampled(
        &self,
        base: &BacktestConfig,
        max_runs: usize,
        seed: u64,
    ) -> Vec<BacktestConfig> {
        let configs = self.expand(base);
        if configs.len() <= max_runs {
            return configs;
        }
        let mut rng = StdRng::seed_from_u64(seed);
        configs
            .choose_multiple(&mut rng, max_runs)
            .cloned()
            .collect()
    }

    pub fn combination_count(&self) -> usize {
        self.grid_distances.len().max(1)
            * self.grid_ranges.len().max(1)
            * self.atr_multipliers.len().max(1)
            * self.tp_sl_ratios.len().max(1)
    }

    fn axis(values: &[f64], base: f64) -> Vec<f64> {
        if values.is_empty() {
            vec![base]
        } else {
            values.to_vec()
        }
    }
}

/// One sweep entry: the parameter combination plus its report, or the error
/// that stopped it. Aborted-before-start runs carry an "aborted" error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub grid_distance: f64,
    pub grid_range: f64,
    pub atr_multiplier: f64,
    pub tp_sl_ratio: f64,
    pub report: Option<PerformanceReport>,
    pub error: Option<String>,
    pub completed: bool,
}

impl SweepOutcome {
    fn from_config(config: &BacktestConfig) -> Self {
        Self {
            grid_distance: config.grid.grid_distance,
            grid_range: config.grid.grid_range,
            atr_multiplier: config.risk.atr_multiplier,
            tp_sl_ratio: config.risk.tp_sl_ratio,
            report: None,
            error: None,
            completed: false,
        }
    }
}

/// Run every config against the same bars in parallel. Results come back in
/// input order; each worker owns its run state, so no synchronization beyond
/// the collect. The abort flag short-circuits both queued and running
/// backtests.
pub fn run_sweep(
    bars: &[Bar],
    configs: &[BacktestConfig],
    abort: &AbortFlag,
) -> Vec<SweepOutcome> {
    info!("🧮 Sweeping {} parameter combinations", configs.len());

    configs
        .par_iter()
        .map(|config| run_one(bars, config, abort))
        .collect()
}

/// `run_sweep` with an indicatif bar ticking as runs finish.
pub fn run_sweep_with_progress(
    bars: &[Bar],
    configs: &[BacktestConfig],
    abort: &AbortFlag,
    progress: &SweepProgress,
) -> Vec<SweepOutcome> {
    let outcomes: Vec<SweepOutcome> = configs
        .par_iter()
        .map(|config| {
            let outcome = run_one(bars, config, abort);
            progress.record(&outcome);
            outcome
        })
        .collect();

    progress.finish(&outcomes);
    outcomes
}

fn run_one(bars: &[Bar], config: &BacktestConfig, abort: &AbortFlag) -> SweepOutcome {
    let mut outcome = SweepOutcome::from_config(config);

    if abort.is_aborted() {
        outcome.error = Some("aborted".to_string());
        return outcome;
    }

    let engine = match BacktestEngine::new(config.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            outcome.error = Some(e.to_string());
            return outcome;
        }
    };

    match engine.run_with_abort(bars, abort) {
        Ok(result) => {
            outcome.completed = result.completed;
            outcome.report = Some(result.report);
        }
        Err(e) => outcome.error = Some(e.to_string()),
    }

    outcome
}

/// Sort best-first by total return; failed runs sink to the bottom.
pub fn rank_by_return(outcomes: &mut [SweepOutcome]) {
    outcomes.sort_by(|a, b| {
        let ra = a.report.as_ref().map(|r| r.total_return_pct);
        let rb = b.report.as_ref().map(|r| r.total_return_pct);
        match (ra, rb) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expansion_cardinality_and_order() {
        let grid = ParameterGrid {
            grid_distances: vec![2.0, 4.0],
            grid_ranges: vec![20.0],
            atr_multipliers: vec![1.0, 1.5],
            tp_sl_ratios: vec![],
        };
        let base = BacktestConfig::default();

        let configs = grid.expand(&base);
        assert_eq!(configs.len(), 4);
        assert_eq!(configs.len(), grid.combination_count());

        // Distances outermost, multipliers inner
        assert_eq!(configs[0].grid.grid_distance, 2.0);
        assert_eq!(configs[0].risk.atr_multiplier, 1.0);
        assert_eq!(configs[1].risk.atr_multiplier, 1.5);
        assert_eq!(configs[2].grid.grid_distance, 4.0);

        // Empty axis keeps the base value
        assert!(configs.iter().all(|c| c.risk.tp_sl_ratio == base.risk.tp_sl_ratio));
        assert!(configs.iter().all(|c| c.grid.grid_range == 20.0));
    }

    #[test]
    fn test_sampled_expansion_is_seed_stable() {
        let grid = ParameterGrid {
            grid_distances: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            grid_ranges: vec![10.0, 20.0, 30.0],
            atr_multipliers: vec![1.0, 2.0],
            tp_sl_ratios: vec![0.5, 1.0],
        };
        let base = BacktestConfig::default();

        let a = grid.expand_sampled(&base, 10, 42);
        let b = grid.expand_sampled(&base, 10, 42);
        assert_eq!(a.len(), 10);
        assert_eq!(a, b);

        let c = grid.expand_sampled(&base, 10, 43);
        assert_eq!(c.len(), 10);
        // A different seed picks a different subset (with 60 combinations the
        // chance of an identical draw is negligible)
        assert_ne!(a, c);
    }

    #[test]
    fn test_small_grids_not_sampled() {
        let grid = ParameterGrid {
            grid_distances: vec![1.0, 2.0],
            ..Default::default()
        };
        let base = BacktestConfig::default();
        assert_eq!(grid.expand_sampled(&base, 10, 7).len(), 2);
    }

    #[test]
    fn test_rank_by_return_sinks_failures() {
        let base = BacktestConfig::default();
        let mut outcomes = vec![
            SweepOutcome {
                error: Some("boom".to_string()),
                ..SweepOutcome::from_config(&base)
            },
            SweepOutcome {
                report: Some(crate::backtest::MetricsCalculator::empty_report()),
                completed: true,
                ..SweepOutcome::from_config(&base)
            },
        ];

        rank_by_return(&mut outcomes);
        assert!(outcomes[0].report.is_some());
        assert!(outcomes[1].error.is_some());
    }
}
