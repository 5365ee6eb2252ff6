//! Auxiliary market-data snapshots.
//!
//! Each auxiliary series is sampled independently of the bars (options levels
//! every 15 minutes, book imbalance every minute, ...). All four variants share
//! the [`Snapshot`] trait so the fusion layer can treat them uniformly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which auxiliary series a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    OptionsLevels,
    Imbalance,
    LiquidityLevels,
    Flow,
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeriesKind::OptionsLevels => "options_levels",
            SeriesKind::Imbalance => "imbalance",
            SeriesKind::LiquidityLevels => "liquidity_levels",
            SeriesKind::Flow => "flow",
        };
        f.write_str(name)
    }
}

/// Common shape of every auxiliary snapshot: a timestamp plus a payload.
pub trait Snapshot {
    const KIND: SeriesKind;

    fn timestamp(&self) -> DateTime<Utc>;
}

/// Prevailing dealer-positioning regime. Opaque to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Positive,
    Negative,
    Neutral,
    #[serde(other)]
    Unknown,
}

/// Identity of a price level, used as a detector key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelSource {
    GammaFlip,
    CallWall,
    PutWall,
    /// 0-based index into the snapshot's support list.
    Support(usize),
    Resistance(usize),
    Liquidity(usize),
    SwingHigh,
    SwingLow,
}

impl fmt::Display for LevelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelSource::GammaFlip => write!(f, "gamma_flip"),
            LevelSource::CallWall => write!(f, "call_wall"),
            LevelSource::PutWall => write!(f, "put_wall"),
            LevelSource::Support(i) => write!(f, "support_{}", i + 1),
            LevelSource::Resistance(i) => write!(f, "resistance_{}", i + 1),
            LevelSource::Liquidity(i) => write!(f, "lt_{i}"),
            LevelSource::SwingHigh => write!(f, "swing_high"),
            LevelSource::SwingLow => write!(f, "swing_low"),
        }
    }
}

/// Options-derived (gamma exposure) level snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsLevelSnapshot {
    pub timestamp: DateTime<Utc>,
    pub gamma_flip: Option<f64>,
    pub call_wall: Option<f64>,
    pub put_wall: Option<f64>,
    /// Nearest first.
    #[serde(default)]
    pub support: Vec<f64>,
    /// Nearest first.
    #[serde(default)]
    pub resistance: Vec<f64>,
    pub regime: Regime,
    /// Aggregate gamma exposure.
    pub total_exposure: f64,
}

impl OptionsLevelSnapshot {
    /// Support level by 0-based index.
    pub fn support_level(&self, index: usize) -> Option<f64> {
        self.support.get(index).copied()
    }

    /// Resistance level by 0-based index.
    pub fn resistance_level(&self, index: usize) -> Option<f64> {
        self.resistance.get(index).copied()
    }

    /// Every defined level with its identity, walls first.
    pub fn named_levels(&self) -> Vec<(LevelSource, f64)> {
        let mut levels = Vec::with_capacity(3 + self.support.len() + self.resistance.len());
        if let Some(p) = self.put_wall {
            levels.push((LevelSource::PutWall, p));
        }
        if let Some(c) = self.call_wall {
            levels.push((LevelSource::CallWall, c));
        }
        if let Some(g) = self.gamma_flip {
            levels.push((LevelSource::GammaFlip, g));
        }
        for (i, &s) in self.support.iter().enumerate() {
            levels.push((LevelSource::Support(i), s));
        }
        for (i, &r) in self.resistance.iter().enumerate() {
            levels.push((LevelSource::Resistance(i), r));
        }
        levels
    }
}

impl Snapshot for OptionsLevelSnapshot {
    const KIND: SeriesKind = SeriesKind::OptionsLevels;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Order-book imbalance snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceSnapshot {
    pub timestamp: DateTime<Utc>,
    pub bid_size: f64,
    pub ask_size: f64,
    /// (bid - ask) / (bid + ask), in [-1, 1].
    pub imbalance: f64,
    pub updates: u32,
}

impl ImbalanceSnapshot {
    pub fn favors_bids(&self, threshold: f64) -> bool {
        self.imbalance >= threshold
    }

    pub fn favors_asks(&self, threshold: f64) -> bool {
        self.imbalance <= -threshold
    }
}

impl Snapshot for ImbalanceSnapshot {
    const KIND: SeriesKind = SeriesKind::Imbalance;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Sentiment label attached to a liquidity-trigger snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
    #[serde(other)]
    Unknown,
}

/// How a snapshot's liquidity levels are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelOrdering {
    Ascending,
    Descending,
    Mixed,
}

/// Maximum number of liquidity levels carried by one snapshot.
pub const MAX_LIQUIDITY_LEVELS: usize = 5;

/// Liquidity-trigger level snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityLevelSnapshot {
    pub timestamp: DateTime<Utc>,
    pub sentiment: Sentiment,
    /// Up to [`MAX_LIQUIDITY_LEVELS`] prices, in the order published.
    pub levels: Vec<f64>,
}

impl LiquidityLevelSnapshot {
    /// Number of levels strictly below `price`.
    pub fn count_below(&self, price: f64) -> usize {
        self.levels.iter().filter(|&&l| l < price).count()
    }

    /// Number of levels strictly above `price`.
    pub fn count_above(&self, price: f64) -> usize {
        self.levels.iter().filter(|&&l| l > price).count()
    }

    pub fn ordering(&self) -> LevelOrdering {
        let ascending = self.levels.windows(2).all(|w| w[0] <= w[1]);
        let descending = self.levels.windows(2).all(|w| w[0] >= w[1]);
        match (ascending, descending) {
            (true, false) => LevelOrdering::Ascending,
            (false, true) => LevelOrdering::Descending,
            _ => LevelOrdering::Mixed,
        }
    }

    pub fn named_levels(&self) -> Vec<(LevelSource, f64)> {
        self.levels
            .iter()
            .take(MAX_LIQUIDITY_LEVELS)
            .enumerate()
            .map(|(i, &l)| (LevelSource::Liquidity(i), l))
            .collect()
    }
}

impl Snapshot for LiquidityLevelSnapshot {
    const KIND: SeriesKind = SeriesKind::LiquidityLevels;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Trade-derived cumulative volume delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cumulative_delta: f64,
}

impl Snapshot for FlowSnapshot {
    const KIND: SeriesKind = SeriesKind::Flow;

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
