//! Position — a filled entry being managed toward an exit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bar::Bar;
use super::signal::{Metadata, Side, TrailingSpec};

/// Trailing-stop bookkeeping for an open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingState {
    pub spec: TrailingSpec,
    /// True once the favorable excursion reached `spec.activation`.
    pub armed: bool,
    /// Best price seen since entry (highest for longs, lowest for shorts).
    pub high_water: f64,
}

impl TrailingState {
    pub fn new(spec: TrailingSpec, entry_price: f64) -> Self {
        Self {
            spec,
            armed: false,
            high_water: entry_price,
        }
    }

    /// Stop level the trail currently asks for, if armed.
    pub fn proposed_stop(&self, side: Side) -> Option<f64> {
        if !self.armed {
            return None;
        }
        Some(match side {
            Side::Long => self.high_water - self.spec.offset,
            Side::Short => self.high_water + self.spec.offset,
        })
    }
}

/// An accepted, filled order. At most one exists per replay at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub strategy: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_bar: usize,
    /// Stop as emitted by the strategy. Never changes.
    pub initial_stop: f64,
    /// Current stop. Moves only in the favorable direction.
    pub stop: f64,
    pub target: f64,
    pub trailing: Option<TrailingState>,
    /// Wall-clock deadline carried by the intent.
    pub forced_exit_at: Option<DateTime<Utc>>,
    /// End of the entry session, under the force-close-at-session-end policy.
    pub session_close_at: Option<DateTime<Utc>>,
    /// Bar index at which the position times out at the close.
    pub max_hold_until: Option<usize>,
    /// Most favorable price seen while open.
    pub best_price: f64,
    /// Most adverse price seen while open.
    pub worst_price: f64,
    pub metadata: Metadata,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }

    /// Unrealized P&L in points per unit at `price`.
    pub fn points_at(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.side.sign()
    }

    /// Favorable extreme of a bar for this side.
    pub fn favorable_extreme(&self, bar: &Bar) -> f64 {
        match self.side {
            Side::Long => bar.high,
            Side::Short => bar.low,
        }
    }

    /// Adverse extreme of a bar for this side.
    pub fn adverse_extreme(&self, bar: &Bar) -> f64 {
        match self.side {
            Side::Long => bar.low,
            Side::Short => bar.high,
        }
    }

    /// Fold a bar into the excursion trackers.
    pub fn track_excursion(&mut self, bar: &Bar) {
        let fav = self.favorable_extreme(bar);
        let adv = self.adverse_extreme(bar);
        match self.side {
            Side::Long => {
                self.best_price = self.best_price.max(fav);
                self.worst_price = self.worst_price.min(adv);
            }
            Side::Short => {
                self.best_price = self.best_price.min(fav);
                self.worst_price = self.worst_price.max(adv);
            }
        }
    }

    /// Maximum favorable excursion in points (>= 0).
    pub fn mfe(&self) -> f64 {
        self.points_at(self.best_price).max(0.0)
    }

    /// Maximum adverse excursion in points (<= 0).
    pub fn mae(&self) -> f64 {
        self.points_at(self.worst_price).min(0.0)
    }

    /// True once the trailing stop has tightened past the initial stop.
    pub fn stop_has_trailed(&self) -> bool {
        match self.side {
            Side::Long => self.stop > self.initial_stop,
            Side::Short => self.stop < self.initial_stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Timeframe;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 7, 15, 0, 0).unwrap()
    }

    fn long_position() -> Position {
        Position {
            strategy: "test".into(),
            symbol: "NQ".into(),
            side: Side::Long,
            quantity: 1.0,
            entry_price: 100.0,
            entry_time: ts(),
            entry_bar: 0,
            initial_stop: 95.0,
            stop: 95.0,
            target: 110.0,
            trailing: None,
            forced_exit_at: None,
            session_close_at: None,
            max_hold_until: None,
            best_price: 100.0,
            worst_price: 100.0,
            metadata: Metadata::new(),
        }
    }

    fn bar(high: f64, low: f64) -> Bar {
        Bar {
            symbol: "NQ".into(),
            timestamp: ts(),
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
            volume: 100.0,
            timeframe: Timeframe::M15,
        }
    }

    #[test]
    fn excursion_tracking_long() {
        let mut pos = long_position();
        pos.track_excursion(&bar(104.0, 98.0));
        pos.track_excursion(&bar(103.0, 97.0));
        assert_eq!(pos.mfe(), 4.0);
        assert_eq!(pos.mae(), -3.0);
    }

    #[test]
    fn excursion_tracking_short() {
        let mut pos = long_position();
        pos.side = Side::Short;
        pos.track_excursion(&bar(102.0, 96.0));
        assert_eq!(pos.mfe(), 4.0);
        assert_eq!(pos.mae(), -2.0);
    }

    #[test]
    fn trailing_proposes_only_when_armed() {
        let mut trail = TrailingState::new(TrailingSpec::new(15.0, 10.0), 100.0);
        assert_eq!(trail.proposed_stop(Side::Long), None);
        trail.armed = true;
        trail.high_water = 120.0;
        assert_eq!(trail.proposed_stop(Side::Long), Some(110.0));
        trail.high_water = 80.0;
        assert_eq!(trail.proposed_stop(Side::Short), Some(90.0));
    }

    #[test]
    fn stop_has_trailed_detects_tightening() {
        let mut pos = long_position();
        assert!(!pos.stop_has_trailed());
        pos.stop = 101.0;
        assert!(pos.stop_has_trailed());
    }
}
