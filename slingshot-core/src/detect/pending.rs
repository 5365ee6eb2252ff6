//! Keyed in-flight observations that expire after a bar horizon.
//!
//! Detectors record "condition A seen at bar k, waiting for B" as a
//! [`PendingEvent`] under a key that identifies the watched feature (a price
//! level, a zone). Each bar they run one [`PendingEvents::step`]:
//!
//! 1. expire events older than the horizon,
//! 2. let live events fold the bar into their payload,
//! 3. pull out events whose completion condition holds.
//!
//! A key can only be opened again once its previous event is gone, so the
//! same level is never detected twice while a watch is in flight. Storage is
//! a `BTreeMap`, so expiry and completion order follow key order and replays
//! stay deterministic.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One in-flight observation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent<T> {
    pub payload: T,
    pub created_bar: usize,
    pub created_at: DateTime<Utc>,
}

impl<T> PendingEvent<T> {
    /// Bars elapsed since creation.
    pub fn age(&self, bar_index: usize) -> usize {
        bar_index.saturating_sub(self.created_bar)
    }
}

/// What one [`PendingEvents::step`] removed.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome<K, T> {
    pub expired: Vec<(K, PendingEvent<T>)>,
    pub completed: Vec<(K, PendingEvent<T>)>,
}

impl<K, T> Default for StepOutcome<K, T> {
    fn default() -> Self {
        Self {
            expired: Vec::new(),
            completed: Vec::new(),
        }
    }
}

/// Keyed map of pending events with a shared expiry horizon.
#[derive(Debug, Clone)]
pub struct PendingEvents<K, T> {
    events: BTreeMap<K, PendingEvent<T>>,
    /// Maximum age in bars. An event with `age > horizon` is dropped.
    horizon: usize,
    /// Optional cap on simultaneous events.
    capacity: Option<usize>,
}

impl<K: Ord + Clone, T> PendingEvents<K, T> {
    pub fn new(horizon: usize) -> Self {
        Self {
            events: BTreeMap::new(),
            horizon,
            capacity: None,
        }
    }

    /// Map that refuses new keys once `capacity` events are in flight.
    pub fn bounded(horizon: usize, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(horizon)
        }
    }

    /// Watcher for at most one event at a time.
    pub fn single(horizon: usize) -> Self {
        Self::bounded(horizon, 1)
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.events.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&PendingEvent<T>> {
        self.events.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &PendingEvent<T>)> {
        self.events.iter()
    }

    fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.events.len() >= cap)
    }

    /// Open a new event unless one is already in flight for `key` or the map
    /// is at capacity. Returns true if the event was inserted.
    pub fn open(&mut self, key: K, payload: T, bar_index: usize, at: DateTime<Utc>) -> bool {
        if self.events.contains_key(&key) || self.is_full() {
            return false;
        }
        self.events.insert(
            key,
            PendingEvent {
                payload,
                created_bar: bar_index,
                created_at: at,
            },
        );
        true
    }

    /// Drop every event older than the horizon at `bar_index`.
    pub fn expire(&mut self, bar_index: usize) -> Vec<(K, PendingEvent<T>)> {
        let horizon = self.horizon;
        self.remove_where(|_, ev| ev.age(bar_index) > horizon)
    }

    /// Let each live event fold the current bar into its payload.
    pub fn update<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut T),
    {
        for (key, ev) in self.events.iter_mut() {
            f(key, &mut ev.payload);
        }
    }

    /// Remove and return every event whose completion condition holds.
    pub fn take_completed<F>(&mut self, mut done: F) -> Vec<(K, PendingEvent<T>)>
    where
        F: FnMut(&K, &PendingEvent<T>) -> bool,
    {
        self.remove_where(|k, ev| done(k, ev))
    }

    /// Expire, update, then complete, in that order.
    pub fn step<U, C>(&mut self, bar_index: usize, update: U, done: C) -> StepOutcome<K, T>
    where
        U: FnMut(&K, &mut T),
        C: FnMut(&K, &PendingEvent<T>) -> bool,
    {
        let expired = self.expire(bar_index);
        self.update(update);
        let completed = self.take_completed(done);
        StepOutcome { expired, completed }
    }

    pub fn remove(&mut self, key: &K) -> Option<PendingEvent<T>> {
        self.events.remove(key)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn remove_where<F>(&mut self, mut pred: F) -> Vec<(K, PendingEvent<T>)>
    where
        F: FnMut(&K, &PendingEvent<T>) -> bool,
    {
        let keys: Vec<K> = self
            .events
            .iter()
            .filter(|(k, ev)| pred(k, ev))
            .map(|(k, _)| k.clone())
            .collect();
        keys.into_iter()
            .filter_map(|k| self.events.remove_entry(&k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(bar: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 14, 30, 0).unwrap() + Duration::minutes(15 * bar as i64)
    }

    /// Payload tracking the lowest low of a hunt below a level.
    #[derive(Debug, Clone, PartialEq)]
    struct Hunt {
        level: f64,
        extreme: f64,
    }

    #[test]
    fn event_expires_one_bar_after_horizon() {
        let mut events: PendingEvents<u32, Hunt> = PendingEvents::new(5);
        assert!(events.open(7, Hunt { level: 100.0, extreme: 98.0 }, 10, at(10)));

        for bar in 11..=15 {
            let out = events.step(bar, |_, _| {}, |_, _| false);
            assert!(out.expired.is_empty(), "bar {bar} should keep the event");
            assert!(out.completed.is_empty());
        }
        let out = events.step(16, |_, _| {}, |_, _| false);
        assert_eq!(out.expired.len(), 1);
        assert!(out.completed.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn duplicate_key_is_not_reopened() {
        let mut events: PendingEvents<&str, f64> = PendingEvents::new(3);
        assert!(events.open("put_wall", 1.0, 0, at(0)));
        assert!(!events.open("put_wall", 2.0, 1, at(1)));
        assert_eq!(events.get(&"put_wall").unwrap().payload, 1.0);
        assert_eq!(events.get(&"put_wall").unwrap().created_bar, 0);
    }

    #[test]
    fn key_can_reopen_after_expiry() {
        let mut events: PendingEvents<&str, f64> = PendingEvents::new(1);
        events.open("lt_1", 1.0, 0, at(0));
        events.expire(2);
        assert!(events.open("lt_1", 2.0, 2, at(2)));
    }

    #[test]
    fn update_runs_before_completion() {
        let mut events: PendingEvents<u32, Hunt> = PendingEvents::new(10);
        events.open(1, Hunt { level: 100.0, extreme: 99.0 }, 0, at(0));

        let low = 97.0;
        let close = 101.0;
        let out = events.step(
            1,
            |_, h| h.extreme = h.extreme.min(low),
            |_, ev| close > ev.payload.level,
        );
        assert_eq!(out.completed.len(), 1);
        assert_eq!(out.completed[0].1.payload.extreme, 97.0);
        assert!(events.is_empty());
    }

    #[test]
    fn single_watcher_holds_one_zone() {
        let mut events: PendingEvents<usize, (f64, f64)> = PendingEvents::single(4);
        assert!(events.open(3, (10.0, 12.0), 3, at(3)));
        assert!(!events.open(5, (20.0, 22.0), 5, at(5)));
        assert_eq!(events.len(), 1);
        events.remove(&3);
        assert!(events.open(5, (20.0, 22.0), 5, at(5)));
    }

    #[test]
    fn completion_order_follows_keys() {
        let mut events: PendingEvents<u32, ()> = PendingEvents::new(10);
        events.open(9, (), 0, at(0));
        events.open(2, (), 0, at(0));
        events.open(5, (), 0, at(0));
        let done = events.take_completed(|_, _| true);
        let keys: Vec<u32> = done.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![2, 5, 9]);
    }

    #[test]
    fn clear_wipes_everything() {
        let mut events: PendingEvents<u32, ()> = PendingEvents::new(10);
        events.open(1, (), 0, at(0));
        events.clear();
        assert!(events.is_empty());
        assert!(!events.contains(&1));
    }
}
