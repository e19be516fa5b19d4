// Core strategy logic: grid construction, risk sizing, signal detection,
// position lifecycle.

pub mod grid;
pub mod position;
pub mod risk;
pub mod signal;

// Re-export commonly used types
pub use grid::{Grid, GridBuilder, GridLevel};
pub use position::{Position, PositionManager, Trade};
pub use risk::RiskCalculator;
pub use signal::{LevelOccupancy, SignalDetector};
