//! Per-bar fusion of the auxiliary feeds into a read-only market view.
//!
//! The feed owns every auxiliary series for a replay. For each bar the driver
//! asks for a [`MarketView`], which borrows the bar and the latest as-of
//! snapshot of each series. Borrowing ties the view to a single iteration, so
//! strategies cannot keep it past the call that received it.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::series::{snapshot_as_of, SnapshotSeries};
use crate::domain::{
    Bar, FlowSnapshot, ImbalanceSnapshot, LiquidityLevelSnapshot, OptionsLevelSnapshot,
    SeriesKind, Snapshot,
};

/// Fatal fusion failure: a snapshot newer than the query reached the view.
#[derive(Debug, Error, PartialEq)]
pub enum FusionError {
    #[error("lookahead: {kind} snapshot at {snapshot} is newer than bar at {query}")]
    Lookahead {
        kind: SeriesKind,
        snapshot: DateTime<Utc>,
        query: DateTime<Utc>,
    },
}

/// Every auxiliary series available to a replay. Any of them may be absent.
#[derive(Debug, Clone, Default)]
pub struct MarketFeed {
    pub options: Option<SnapshotSeries<OptionsLevelSnapshot>>,
    pub imbalance: Option<SnapshotSeries<ImbalanceSnapshot>>,
    pub liquidity: Option<SnapshotSeries<LiquidityLevelSnapshot>>,
    pub flow: Option<SnapshotSeries<FlowSnapshot>>,
}

impl MarketFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, series: SnapshotSeries<OptionsLevelSnapshot>) -> Self {
        self.options = Some(series);
        self
    }

    pub fn with_imbalance(mut self, series: SnapshotSeries<ImbalanceSnapshot>) -> Self {
        self.imbalance = Some(series);
        self
    }

    pub fn with_liquidity(mut self, series: SnapshotSeries<LiquidityLevelSnapshot>) -> Self {
        self.liquidity = Some(series);
        self
    }

    pub fn with_flow(mut self, series: SnapshotSeries<FlowSnapshot>) -> Self {
        self.flow = Some(series);
        self
    }

    /// Fuse the feed at `bar.timestamp`.
    pub fn view_at<'a>(
        &'a self,
        bar: &'a Bar,
        previous: Option<&'a Bar>,
    ) -> Result<MarketView<'a>, FusionError> {
        let at = bar.timestamp;
        Ok(MarketView {
            bar,
            previous,
            options: checked(snapshot_as_of(self.options.as_ref(), at), at)?,
            imbalance: checked(snapshot_as_of(self.imbalance.as_ref(), at), at)?,
            liquidity: checked(snapshot_as_of(self.liquidity.as_ref(), at), at)?,
            flow: checked(snapshot_as_of(self.flow.as_ref(), at), at)?,
        })
    }
}

/// Refuse any snapshot stamped after the query time.
fn checked<T: Snapshot>(snap: Option<&T>, at: DateTime<Utc>) -> Result<Option<&T>, FusionError> {
    match snap {
        Some(s) if s.timestamp() > at => Err(FusionError::Lookahead {
            kind: T::KIND,
            snapshot: s.timestamp(),
            query: at,
        }),
        other => Ok(other),
    }
}

/// Read-only bundle handed to strategies for one bar.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    pub bar: &'a Bar,
    pub previous: Option<&'a Bar>,
    pub options: Option<&'a OptionsLevelSnapshot>,
    pub imbalance: Option<&'a ImbalanceSnapshot>,
    pub liquidity: Option<&'a LiquidityLevelSnapshot>,
    pub flow: Option<&'a FlowSnapshot>,
}

impl<'a> MarketView<'a> {
    /// View with no auxiliary data, mostly for tests and bar-only strategies.
    pub fn bars_only(bar: &'a Bar, previous: Option<&'a Bar>) -> Self {
        Self {
            bar,
            previous,
            options: None,
            imbalance: None,
            liquidity: None,
            flow: None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.bar.timestamp
    }
}
