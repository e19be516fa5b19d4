// Integration tests for parameter sweeps

mod common;

use common::{create_test_config, generate_random_bars};
use grid_backtester::{
    attach_indicators, rank_by_return, run_sweep, AbortFlag, MetricsCalculator, ParameterGrid,
    SweepOutcome,
};

fn sample_grid() -> ParameterGrid {
    ParameterGrid {
        grid_distances: vec![2.0, 5.0],
        grid_ranges: vec![20.0, 50.0],
        atr_multipliers: vec![1.5],
        tp_sl_ratios: vec![0.5, 1.0],
    }
}

#[test]
fn test_expansion_is_cartesian_and_ordered() {
    let base = create_test_config();
    let grid = sample_grid();

    assert_eq!(grid.combination_count(), 8);
    let configs = grid.expand(&base);
    assert_eq!(configs.len(), 8);

    // Distances vary slowest, ratios fastest.
    assert_eq!(configs[0].grid.grid_distance, 2.0);
    assert_eq!(configs[0].grid.grid_range, 20.0);
    assert_eq!(configs[0].risk.tp_sl_ratio, 0.5);
    assert_eq!(configs[1].risk.tp_sl_ratio, 1.0);
    assert_eq!(configs[2].grid.grid_range, 50.0);
    assert_eq!(configs[4].grid.grid_distance, 5.0);

    // Untouched axes come from the base config.
    assert_eq!(configs[0].initial_capital, base.initial_capital);
    assert_eq!(configs[0].max_trades, base.max_trades);
}

#[test]
fn test_empty_axes_fall_back_to_base() {
    let base = create_test_config();
    let configs = ParameterGrid::default().expand(&base);

    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0], base);
}

#[test]
fn test_sampled_expansion_is_seeded() {
    let base = create_test_config();
    let grid = ParameterGrid {
        grid_distances: vec![1.0, 2.0, 3.0],
        grid_ranges: vec![10.0, 20.0, 30.0],
        atr_multipliers: vec![1.0, 2.0],
        tp_sl_ratios: vec![0.5, 1.0],
    };
    assert_eq!(grid.combination_count(), 36);

    let first = grid.expand_sampled(&base, 10, 7);
    let second = grid.expand_sampled(&base, 10, 7);
    assert_eq!(first.len(), 10);
    assert_eq!(first, second, "the same seed must pick the same subset");

    // Asking for more runs than exist returns the full expansion.
    let all = grid.expand_sampled(&base, 100, 7);
    assert_eq!(all.len(), 36);
}

#[test]
fn test_sweep_preserves_input_order() {
    let mut bars = generate_random_bars(210.0, 120, 0.02);
    attach_indicators(&mut bars, 2, 2);

    let base = create_test_config();
    let configs = sample_grid().expand(&base);
    let outcomes = run_sweep(&bars, &configs, &AbortFlag::new());

    assert_eq!(outcomes.len(), configs.len());
    for (outcome, config) in outcomes.iter().zip(&configs) {
        assert_eq!(outcome.grid_distance, config.grid.grid_distance);
        assert_eq!(outcome.grid_range, config.grid.grid_range);
        assert_eq!(outcome.tp_sl_ratio, config.risk.tp_sl_ratio);
        assert!(outcome.completed, "run should finish: {:?}", outcome.error);
        assert!(outcome.report.is_some());
    }
}

#[test]
fn test_aborted_sweep_marks_runs() {
    let mut bars = generate_random_bars(210.0, 60, 0.02);
    attach_indicators(&mut bars, 2, 2);

    let base = create_test_config();
    let configs = sample_grid().expand(&base);

    let abort = AbortFlag::new();
    abort.abort();
    let outcomes = run_sweep(&bars, &configs, &abort);

    assert_eq!(outcomes.len(), configs.len());
    for outcome in &outcomes {
        assert!(!outcome.completed);
        assert_eq!(outcome.error.as_deref(), Some("aborted"));
        assert!(outcome.report.is_none());
    }
}

#[test]
fn test_ranking_puts_failures_last() {
    let make = |return_pct: f64| {
        let mut report = MetricsCalculator::empty_report();
        report.total_return_pct = return_pct;
        SweepOutcome {
            grid_distance: 5.0,
            grid_range: 50.0,
            atr_multiplier: 1.5,
            tp_sl_ratio: 0.5,
            report: Some(report),
            error: None,
            completed: true,
        }
    };

    let mut outcomes = vec![
        make(2.0),
        SweepOutcome {
            grid_distance: 1.0,
            grid_range: 10.0,
            atr_multiplier: 1.5,
            tp_sl_ratio: 0.5,
            report: None,
            error: Some("bad config".to_string()),
            completed: false,
        },
        make(11.5),
        make(-4.0),
    ];

    rank_by_return(&mut outcomes);

    assert_eq!(outcomes[0].report.as_ref().unwrap().total_return_pct, 11.5);
    assert_eq!(outcomes[1].report.as_ref().unwrap().total_return_pct, 2.0);
    assert_eq!(outcomes[2].report.as_ref().unwrap().total_return_pct, -4.0);
    assert!(outcomes[3].report.is_none(), "failed run sinks to the bottom");
}
