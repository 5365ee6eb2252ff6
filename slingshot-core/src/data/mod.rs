//! Time-aligned data fusion.
//!
//! Bars drive the replay; auxiliary series are joined to each bar "as of" its
//! timestamp. Nothing stamped after the bar is ever visible.

pub mod series;
pub mod view;

pub use series::{snapshot_as_of, SeriesError, SnapshotSeries};
pub use view::{FusionError, MarketFeed, MarketView};
