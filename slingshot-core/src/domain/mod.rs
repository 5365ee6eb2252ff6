//! Domain types for the replay engine.

pub mod bar;
pub mod position;
pub mod signal;
pub mod snapshot;
pub mod trade;

pub use bar::{Bar, Timeframe};
pub use position::{Position, TrailingState};
pub use signal::{EntryKind, Metadata, Side, SignalIntent, TrailingSpec};
pub use snapshot::{
    FlowSnapshot, ImbalanceSnapshot, LevelOrdering, LevelSource, LiquidityLevelSnapshot,
    OptionsLevelSnapshot, Regime, Sentiment, SeriesKind, Snapshot, MAX_LIQUIDITY_LEVELS,
};
pub use trade::{ExitReason, Trade};
