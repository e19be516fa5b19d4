// Grid construction: symmetric price levels around a midprice

use crate::config::GridConfig;
use crate::error::BacktestError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One price line of the grid. Offset 0 is the midprice itself; negative
/// offsets sit below (support), positive above (resistance).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    pub price: f64,
    pub offset: i32,
}

/// A fully constructed grid. Levels are strictly ascending, unique and
/// symmetric around the midprice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub midprice: f64,
    /// Effective spacing between adjacent levels. Wider than the configured
    /// `grid_distance` when the level-count cap forced an adjustment.
    pub distance: f64,
    pub levels: Vec<GridLevel>,
}

impl Grid {
    pub fn levels_per_side(&self) -> usize {
        self.levels.len() / 2
    }

    /// Lowest and highest grid prices.
    pub fn span(&self) -> (f64, f64) {
        // build_at always emits at least three levels
        (self.levels[0].price, self.levels[self.levels.len() - 1].price)
    }

    pub fn prices(&self) -> Vec<f64> {
        self.levels.iter().map(|l| l.price).collect()
    }
}

/// Builds grids from configuration. Stateless; when the midprice is dynamic
/// the engine calls `build_at` fresh every bar with the current moving
/// average, so there is never a mutable shared grid.
pub struct GridBuilder;

impl GridBuilder {
    /// Build a grid from a static-midprice configuration.
    pub fn build(config: &GridConfig) -> Result<Grid, BacktestError> {
        let midprice = config.midprice.static_value().ok_or_else(|| {
            BacktestError::InvalidGridConfig(
                "midprice is dynamic; a concrete price is needed to build a standalone grid"
                    .to_string(),
            )
        })?;
        Self::build_at(midprice, config)
    }

    /// Build a grid centered on an explicit midprice. This is the pure
    /// per-bar form used for dynamic grids.
    pub fn build_at(midprice: f64, config: &GridConfig) -> Result<Grid, BacktestError> {
        if !midprice.is_finite() || midprice <= 0.0 {
            return Err(BacktestError::InvalidGridConfig(format!(
                "midprice must be a positive price, got {}",
                midprice
            )));
        }

        if config.grid_distance <= 0.0 {
            return Err(BacktestError::InvalidGridConfig(format!(
                "grid_distance must be positive, got {}",
                config.grid_distance
            )));
        }

        if config.grid_range < 2.0 * config.grid_distance {
            return Err(BacktestError::InvalidGridConfig(format!(
                "grid_range {} leaves no room for a level on each side (needs at least {})",
                config.grid_range,
                2.0 * config.grid_distance
            )));
        }

        let per_side = (config.grid_range / (2.0 * config.grid_distance)).floor() as usize;
        let (distance, per_side) = Self::apply_level_cap(config, per_side);

        let mut levels = Vec::with_capacity(2 * per_side + 1);
        for offset in -(per_side as i32)..=(per_side as i32) {
            levels.push(GridLevel {
                price: midprice + offset as f64 * distance,
                offset,
            });
        }

        debug!(
            "Grid built: {} levels around {:.4}, spacing {:.4}",
            levels.len(),
            midprice,
            distance
        );

        Ok(Grid {
            midprice,
            distance,
            levels,
        })
    }

    /// Enforce `max_level_count` by widening the spacing to the smallest
    /// integer multiple of the configured distance that fits. Widened levels
    /// stay on the original lattice, so this matches symmetric pruning.
    fn apply_level_cap(config: &GridConfig, per_side: usize) -> (f64, usize) {
        let unconstrained = 2 * per_side + 1;
        if unconstrained <= config.max_level_count {
            return (config.grid_distance, per_side);
        }

        let allowed_per_side = (config.max_level_count.saturating_sub(1) / 2).max(1);
        let factor = per_side.div_ceil(allowed_per_side);
        let widened = config.grid_distance * factor as f64;
        let capped_per_side = ((config.grid_range / (2.0 * widened)).floor() as usize).max(1);

        warn!(
            "⚠️  Grid would have {} levels (cap {}); widening spacing {:.4} -> {:.4}",
            unconstrained, config.max_level_count, config.grid_distance, widened
        );

        (widened, capped_per_side)
    }
}
