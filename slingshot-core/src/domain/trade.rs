//! Trade — a closed position with its realized result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::signal::{Metadata, Side};

/// Why a position was closed.
///
/// Variants are listed in evaluation priority: when several conditions hold on
/// the same bar, the earliest one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Bar reached the intent's forced-exit timestamp.
    ForcedExit,
    /// Bar reached the end of the entry session (force-close policy).
    SessionClose,
    StopLoss,
    TakeProfit,
    TrailingStop,
    MaxHold,
}

impl ExitReason {
    /// Evaluation rank; lower is checked first.
    pub fn priority(&self) -> u8 {
        match self {
            ExitReason::ForcedExit | ExitReason::SessionClose => 1,
            ExitReason::StopLoss => 2,
            ExitReason::TakeProfit => 3,
            ExitReason::TrailingStop => 4,
            ExitReason::MaxHold => 5,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::ForcedExit => "forced_exit",
            ExitReason::SessionClose => "session_close",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::MaxHold => "max_hold",
        };
        f.write_str(s)
    }
}

/// A complete round trip. Append-only output of a replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub strategy: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,

    pub entry_bar: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    pub exit_bar: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    /// (exit - entry) * sign * quantity * point value.
    pub gross_pnl: f64,
    pub commission: f64,
    pub slippage: f64,
    /// Realized P&L net of commission and slippage.
    pub net_pnl: f64,

    pub bars_held: usize,
    /// Maximum adverse excursion in points (<= 0).
    pub mae: f64,
    /// Maximum favorable excursion in points (>= 0).
    pub mfe: f64,

    /// Metadata of the originating signal.
    pub metadata: Metadata,
}

impl Trade {
    /// Points captured per unit, before costs.
    pub fn points(&self) -> f64 {
        (self.exit_price - self.entry_price) * self.side.sign()
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }
}
