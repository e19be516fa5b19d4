//! Progress bar utilities for long-running operations
//!
//! Provides visual feedback during parameter sweeps using the indicatif
//! crate.

use crate::backtest::sweep::SweepOutcome;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for parameter sweeps. Safe to tick from rayon workers.
pub struct SweepProgress {
    pub progress: ProgressBar,
}

impl SweepProgress {
    /// Create a new sweep progress bar
    pub fn new(total_runs: usize) -> Self {
        let progress = ProgressBar::new(total_runs as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})\n{msg}")
                .unwrap()
                .progress_chars("#>-")
        );

        Self { progress }
    }

    /// Record one finished run
    pub fn record(&self, outcome: &SweepOutcome) {
        self.progress.inc(1);
        match (&outcome.report, &outcome.error) {
            (Some(report), _) => self.progress.set_message(format!(
                "📊 distance={:.2} range={:.2} -> {:.2}% return",
                outcome.grid_distance, outcome.grid_range, report.total_return_pct
            )),
            (None, Some(error)) => self.progress.set_message(format!("❌ {}", error)),
            (None, None) => {}
        }
    }

    /// Finish with the best observed return
    pub fn finish(&self, outcomes: &[SweepOutcome]) {
        let best = outcomes
            .iter()
            .filter_map(|o| o.report.as_ref().map(|r| r.total_return_pct))
            .fold(f64::NEG_INFINITY, f64::max);

        if best.is_finite() {
            self.progress
                .finish_with_message(format!("✅ Sweep complete! Best return: {:.2}%", best));
        } else {
            self.progress
                .finish_with_message("⚠️  Sweep complete, no successful runs".to_string());
        }
    }
}
