//! SignalIntent — the fully specified order intent a strategy emits.
//!
//! Intents are immutable once emitted. The execution state machine validates
//! them before they can become a pending order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form audit metadata. Ordered so serialized trades are byte-stable.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => f.write_str("long"),
            Side::Short => f.write_str("short"),
        }
    }
}

/// How the entry should be filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Fill at the intent price on the bar that emitted it.
    Market,
    /// Rest at the intent price until touched or timed out.
    Limit,
}

/// Trailing-stop parameters, in price points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingSpec {
    /// Favorable excursion required before the trail arms.
    pub activation: f64,
    /// Distance kept between the high-water mark and the stop.
    pub offset: f64,
}

impl TrailingSpec {
    pub fn new(activation: f64, offset: f64) -> Self {
        Self { activation, offset }
    }

    pub fn is_valid(&self) -> bool {
        self.activation.is_finite()
            && self.offset.is_finite()
            && self.activation >= 0.0
            && self.offset > 0.0
    }
}

/// Strategy output: everything needed to open and manage a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalIntent {
    pub strategy: String,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub entry: EntryKind,
    pub price: f64,
    pub stop: f64,
    pub target: f64,
    pub trailing: Option<TrailingSpec>,
    pub quantity: Option<f64>,
    pub forced_exit_at: Option<DateTime<Utc>>,
    pub max_hold_bars: Option<usize>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SignalIntent {
    /// Market intent with the given levels; optional fields start empty.
    pub fn market(
        strategy: impl Into<String>,
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        side: Side,
        price: f64,
        stop: f64,
        target: f64,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            symbol: symbol.into(),
            timestamp,
            side,
            entry: EntryKind::Market,
            price,
            stop,
            target,
            trailing: None,
            quantity: None,
            forced_exit_at: None,
            max_hold_bars: None,
            metadata: Metadata::new(),
        }
    }

    /// Limit intent resting at `price`.
    pub fn limit(
        strategy: impl Into<String>,
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        side: Side,
        price: f64,
        stop: f64,
        target: f64,
    ) -> Self {
        Self {
            entry: EntryKind::Limit,
            ..Self::market(strategy, symbol, timestamp, side, price, stop, target)
        }
    }

    pub fn with_entry(mut self, entry: EntryKind) -> Self {
        self.entry = entry;
        self
    }

    pub fn with_trailing(mut self, trailing: Option<TrailingSpec>) -> Self {
        self.trailing = trailing;
        self
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_forced_exit(mut self, at: DateTime<Utc>) -> Self {
        self.forced_exit_at = Some(at);
        self
    }

    pub fn with_max_hold(mut self, bars: usize) -> Self {
        self.max_hold_bars = Some(bars);
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Distance between entry and stop, in points.
    pub fn risk(&self) -> f64 {
        (self.price - self.stop) * self.side.sign()
    }

    /// Distance between entry and target, in points.
    pub fn reward(&self) -> f64 {
        (self.target - self.price) * self.side.sign()
    }
}
