// Position lifecycle management: capacity-bounded open book, intrabar
// stop/target resolution, forced liquidation.

use crate::types::{Bar, ExitReason, PositionStatus, Side, Signal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An open or closed grid position. Entry, stop and target are fixed at open
/// time; only status and exit fields change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Grid level this position was opened at. At most one open position per
    /// level; compared by exact price, both sides originate from GridBuilder.
    pub level_price: f64,
    pub status: PositionStatus,
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// PnL if the position were closed at `price`.
    pub fn pnl_at(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => (price - self.entry_price) * self.size,
            Side::Short => (self.entry_price - price) * self.size,
        }
    }

    fn close(&mut self, exit_price: f64, exit_time: DateTime<Utc>, reason: ExitReason) -> Trade {
        assert!(self.is_open(), "position {} closed twice", self.id);
        self.status = reason.status();
        self.exit_price = Some(exit_price);
        self.exit_time = Some(exit_time);

        Trade {
            position_id: self.id,
            side: self.side,
            entry_price: self.entry_price,
            entry_time: self.entry_time,
            exit_price,
            exit_time,
            size: self.size,
            pnl: self.pnl_at(exit_price),
            exit_reason: reason,
        }
    }
}

/// Closed-position projection appended to the trade ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub position_id: u64,
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub size: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

/// Owns all open positions for a single run. Enforces the capacity limit and
/// the one-open-position-per-level rule; ids are sequential so a run replays
/// identically.
#[derive(Debug, Clone)]
pub struct PositionManager {
    open: Vec<Position>,
    max_trades: usize,
    next_id: u64,
}

impl PositionManager {
    pub fn new(max_trades: usize) -> Self {
        debug_assert!(max_trades >= 1);
        Self {
            open: Vec::with_capacity(max_trades),
            max_trades,
            next_id: 1,
        }
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.open.len() < self.max_trades
    }

    pub fn open_positions(&self) -> &[Position] {
        &self.open
    }

    /// Whether an open position already sits at this grid level.
    pub fn is_level_occupied(&self, level_price: f64) -> bool {
        self.open.iter().any(|p| p.level_price == level_price)
    }

    /// Open a position for a signal, filling at the crossed level. Returns
    /// `None` without error when capacity is exhausted or the level is
    /// already occupied; both rejections are expected no-ops.
    pub fn try_open(
        &mut self,
        signal: &Signal,
        size: f64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Option<&Position> {
        if !self.has_capacity() {
            debug!(
                "Signal at {:.4} rejected: {} of {} positions open",
                signal.level_price, self.open.len(), self.max_trades
            );
            return None;
        }

        if self.is_level_occupied(signal.level_price) {
            debug!("Signal at {:.4} rejected: level occupied", signal.level_price);
            return None;
        }

        let position = Position {
            id: self.next_id,
            side: signal.direction.side(),
            entry_price: signal.level_price,
            entry_time: signal.timestamp,
            size,
            stop_loss,
            take_profit,
            level_price: signal.level_price,
            status: PositionStatus::Open,
            exit_price: None,
            exit_time: None,
        };
        self.next_id += 1;

        debug!(
            "Opened {} #{} at {:.4} (stop {:.4}, target {:.4})",
            position.side, position.id, position.entry_price, stop_loss, take_profit
        );

        self.open.push(position);
        self.open.last()
    }

    /// Check every open position against the bar's range and close the ones
    /// whose stop or target was touched. Runs before any same-bar entry so a
    /// freshly opened position can never exit on its own entry bar.
    pub fn evaluate_exits(&mut self, bar: &Bar) -> Vec<Trade> {
        let mut closed = Vec::new();
        let mut remaining = Vec::with_capacity(self.open.len());

        for mut position in self.open.drain(..) {
            match resolve_intrabar_exit(&position, bar) {
                Some((reason, exit_price)) => {
                    debug!(
                        "Closed {} #{} at {:.4} ({})",
                        position.side, position.id, exit_price, reason
                    );
                    closed.push(position.close(exit_price, bar.timestamp, reason));
                }
                None => remaining.push(position),
            }
        }

        self.open = remaining;
        closed
    }

    /// Force-close every open position at `price` (end of run or abort).
    pub fn close_all(&mut self, price: f64, time: DateTime<Utc>) -> Vec<Trade> {
        let mut closed = Vec::with_capacity(self.open.len());
        for mut position in self.open.drain(..) {
            closed.push(position.close(price, time, ExitReason::Liquidation));
        }
        closed
    }

    /// Net unrealized PnL of all open positions marked at `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.open.iter().map(|p| p.pnl_at(price)).sum()
    }
}

/// Decide whether a bar closes a position, and at what price.
///
/// When the bar touches both thresholds the stop is deemed hit first
/// (conservative estimate), unless the bar opened strictly beyond the target,
/// in which case the target must have filled before price could reach back to
/// the stop. Fixed policy, part of the reproducible contract.
fn resolve_intrabar_exit(position: &Position, bar: &Bar) -> Option<(ExitReason, f64)> {
    let (stop_hit, target_hit) = match position.side {
        Side::Long => (
            bar.low <= position.stop_loss,
            bar.high >= position.take_profit,
        ),
        Side::Short => (
            bar.high >= position.stop_loss,
            bar.low <= position.take_profit,
        ),
    };

    match (stop_hit, target_hit) {
        (false, false) => None,
        (true, false) => Some((ExitReason::StopLoss, position.stop_loss)),
        (false, true) => Some((ExitReason::TakeProfit, position.take_profit)),
        (true, true) => {
            let opened_beyond_target = match position.side {
                Side::Long => bar.open > position.take_profit,
                Side::Short => bar.open < position.take_profit,
            };
            if opened_beyond_target {
                Some((ExitReason::TakeProfit, position.take_profit))
            } else {
                Some((ExitReason::StopLoss, position.stop_loss))
            }
        }
    }
}
