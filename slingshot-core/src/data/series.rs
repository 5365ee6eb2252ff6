//! Timestamp-ordered auxiliary series with as-of lookup.
//!
//! A series is validated once at construction (non-decreasing timestamps), so
//! every lookup afterwards is a single binary search.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{SeriesKind, Snapshot};

/// Input contract violations detected while building a series.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("{kind} series is out of order at index {index}: {current} precedes {previous}")]
    OutOfOrder {
        kind: SeriesKind,
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}

/// An immutable, ascending sequence of snapshots for one auxiliary feed.
#[derive(Debug, Clone)]
pub struct SnapshotSeries<T> {
    items: Vec<T>,
}

impl<T: Snapshot> SnapshotSeries<T> {
    /// Build a series, refusing any timestamp that goes backwards.
    ///
    /// Equal timestamps are allowed; the last one published wins on lookup.
    pub fn new(items: Vec<T>) -> Result<Self, SeriesError> {
        for (index, pair) in items.windows(2).enumerate() {
            let previous = pair[0].timestamp();
            let current = pair[1].timestamp();
            if current < previous {
                return Err(SeriesError::OutOfOrder {
                    kind: T::KIND,
                    index: index + 1,
                    previous,
                    current,
                });
            }
        }
        Ok(Self { items })
    }

    /// Latest snapshot with `timestamp <= at`, or `None` if the series has not
    /// started yet. O(log n).
    pub fn as_of(&self, at: DateTime<Utc>) -> Option<&T> {
        let visible = self.items.partition_point(|s| s.timestamp() <= at);
        if visible == 0 {
            return None;
        }
        let snap = &self.items[visible - 1];
        debug_assert!(snap.timestamp() <= at, "as-of lookup returned a future snapshot");
        Some(snap)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.items.first().map(Snapshot::timestamp)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

/// As-of lookup over an optional series. An absent series yields `None`.
pub fn snapshot_as_of<T: Snapshot>(
    series: Option<&SnapshotSeries<T>>,
    at: DateTime<Utc>,
) -> Option<&T> {
    series.and_then(|s| s.as_of(at))
}
