//! Replay output and its determinism fingerprint.

use serde::{Deserialize, Serialize};

use super::execution::{ExpiredOrder, PendingOrder, RejectedSignal};
use crate::domain::{Position, Trade};

/// Everything a replay produced, including state left unresolved at end of data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    pub strategy: String,
    pub bar_count: usize,
    /// Intents the strategy emitted, accepted or not.
    pub signal_count: usize,
    pub trades: Vec<Trade>,
    pub open_position: Option<Position>,
    pub pending_order: Option<PendingOrder>,
    pub rejected: Vec<RejectedSignal>,
    pub expired_orders: Vec<ExpiredOrder>,
}

impl ReplayResult {
    /// Stable hash of the trade sequence.
    ///
    /// Two replays over identical inputs and configuration yield the same
    /// fingerprint.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::json!(&self.trades);
        let hash_bytes = blake3::hash(canonical.to_string().as_bytes());
        hash_bytes.to_hex().to_string()
    }

    /// Sum of realized net P&L.
    pub fn net_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.net_pnl).sum()
    }

    pub fn is_flat(&self) -> bool {
        self.open_position.is_none() && self.pending_order.is_none()
    }
}
