// Common types shared across the grid backtester

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar with its precomputed indicator columns.
///
/// Bars are immutable once ingested; indicator fields are `None` during the
/// warm-up window and the engine treats such bars as non-tradable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Average True Range at this bar, `None` until the warm-up window fills.
    #[serde(default)]
    pub atr: Option<f64>,
    /// Simple moving average of closes, `None` until the warm-up window fills.
    #[serde(default)]
    pub moving_average: Option<f64>,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            atr: None,
            moving_average: None,
        }
    }

    /// True range against the previous close.
    pub fn true_range(&self, previous_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - previous_close).abs();
        let lc = (self.low - previous_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Which way a crossing signal points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    /// The position side a signal of this direction opens.
    pub fn side(&self) -> Side {
        match self {
            TradeDirection::Buy => Side::Long,
            TradeDirection::Sell => Side::Short,
        }
    }
}

/// Position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// A grid-level crossing event, consumed within the bar that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: DateTime<Utc>,
    pub direction: TradeDirection,
    /// Price of the grid level that was crossed.
    pub level_price: f64,
    /// Signed offset of the level from the grid midprice.
    pub level_offset: i32,
    /// Close of the bar preceding the crossing.
    pub reference_price: f64,
}

/// Lifecycle of a position. OPEN transitions to exactly one closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    ClosedStop,
    ClosedTarget,
    ClosedManual,
}

/// Why a closed trade exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    /// End-of-run (or cancelled-run) forced liquidation at the last close.
    Liquidation,
}

impl ExitReason {
    pub fn status(&self) -> PositionStatus {
        match self {
            ExitReason::StopLoss => PositionStatus::ClosedStop,
            ExitReason::TakeProfit => PositionStatus::ClosedTarget,
            ExitReason::Liquidation => PositionStatus::ClosedManual,
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop-loss"),
            ExitReason::TakeProfit => write!(f, "take-profit"),
            ExitReason::Liquidation => write!(f, "liquidation"),
        }
    }
}
