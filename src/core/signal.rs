// Crossing detection: turns a bar's traversal of grid levels into ordered
// BUY/SELL signals.

use crate::core::grid::Grid;
use crate::types::{Bar, Signal, TradeDirection};
use std::cmp::Ordering;
use tracing::trace;

/// Capability for asking whether a grid level currently holds an open
/// position. Owned by PositionManager; the detector never caches it.
pub trait LevelOccupancy {
    fn occupied(&self, level_price: f64) -> bool;
}

impl LevelOccupancy for crate::core::position::PositionManager {
    fn occupied(&self, level_price: f64) -> bool {
        self.is_level_occupied(level_price)
    }
}

/// Stateless crossing detector. All per-run state (occupancy) lives behind
/// the `LevelOccupancy` capability.
pub struct SignalDetector;

impl SignalDetector {
    /// Detect every level crossed between `previous_close` and the bar's
    /// high/low range.
    ///
    /// A SELL fires when price moves from below a level to at/above it
    /// (`previous_close < level <= high`), a BUY when it moves from above to
    /// at/below (`previous_close > level >= low`). Intrabar traversal counts:
    /// the high/low are used, not just the close, so a gap bar emits one
    /// signal per level it spans. Signals are ordered
    /// nearest-to-previous-close first; on an exact distance tie the lower
    /// level comes first. Levels holding an open position are suppressed.
    pub fn detect<O: LevelOccupancy>(
        previous_close: f64,
        bar: &Bar,
        grid: &Grid,
        occupancy: &O,
    ) -> Vec<Signal> {
        let mut signals: Vec<Signal> = Vec::new();

        for level in &grid.levels {
            let direction = if previous_close < level.price && bar.high >= level.price {
                TradeDirection::Sell
            } else if previous_close > level.price && bar.low <= level.price {
                TradeDirection::Buy
            } else {
                continue;
            };

            if occupancy.occupied(level.price) {
                trace!("Level {:.4} crossed but occupied, suppressed", level.price);
                continue;
            }

            signals.push(Signal {
                timestamp: bar.timestamp,
                direction,
                level_price: level.price,
                level_offset: level.offset,
                reference_price: previous_close,
            });
        }

        signals.sort_by(|a, b| {
            let da = (a.level_price - previous_close).abs();
            let db = (b.level_price - previous_close).abs();
            da.partial_cmp(&db)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    a.level_price
                        .partial_cmp(&b.level_price)
                        .unwrap_or(Ordering::Equal)
                })
        });

        if !signals.is_empty() {
            trace!(
                "{} crossing(s) from reference {:.4} on bar {}",
                signals.len(),
                previous_close,
                bar.timestamp
            );
        }

        signals
    }
}
