//! Swing high/low detection with lagged confirmation.
//!
//! A bar is a swing high when its high is strictly above the highs of the
//! `strength` bars on either side (mirror for lows). The right-hand bars have
//! to exist before the swing can be confirmed, so a swing at bar `i` is only
//! reported while processing bar `i + strength`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwingKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub kind: SwingKind,
    pub price: f64,
    /// Index of the bar that formed the swing.
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    /// Index of the bar whose arrival confirmed it.
    pub confirmed_at: usize,
}

#[derive(Debug, Clone, Copy)]
struct Pivot {
    bar_index: usize,
    timestamp: DateTime<Utc>,
    high: f64,
    low: f64,
}

#[derive(Debug, Clone)]
pub struct SwingTracker {
    strength: usize,
    keep: usize,
    window: VecDeque<Pivot>,
    highs: VecDeque<SwingPoint>,
    lows: VecDeque<SwingPoint>,
}

impl SwingTracker {
    /// `strength` bars on each side; the latest `keep` swings of each kind are retained.
    pub fn new(strength: usize, keep: usize) -> Self {
        let strength = strength.max(1);
        Self {
            strength,
            keep: keep.max(1),
            window: VecDeque::with_capacity(2 * strength + 1),
            highs: VecDeque::new(),
            lows: VecDeque::new(),
        }
    }

    pub fn strength(&self) -> usize {
        self.strength
    }

    /// Feed the next bar. Returns swings confirmed by this bar.
    pub fn push(&mut self, bar_index: usize, bar: &Bar) -> Vec<SwingPoint> {
        self.window.push_back(Pivot {
            bar_index,
            timestamp: bar.timestamp,
            high: bar.high,
            low: bar.low,
        });
        let span = 2 * self.strength + 1;
        if self.window.len() > span {
            self.window.pop_front();
        }
        if self.window.len() < span {
            return Vec::new();
        }

        let center = self.window[self.strength];
        let others = self
            .window
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.strength)
            .map(|(_, p)| p);

        let mut is_high = true;
        let mut is_low = true;
        for p in others {
            is_high &= center.high > p.high;
            is_low &= center.low < p.low;
        }

        let mut confirmed = Vec::new();
        if is_high {
            let point = self.point(SwingKind::High, center.high, center, bar_index);
            Self::remember(&mut self.highs, point, self.keep);
            confirmed.push(point);
        }
        if is_low {
            let point = self.point(SwingKind::Low, center.low, center, bar_index);
            Self::remember(&mut self.lows, point, self.keep);
            confirmed.push(point);
        }
        confirmed
    }

    fn point(&self, kind: SwingKind, price: f64, pivot: Pivot, confirmed_at: usize) -> SwingPoint {
        SwingPoint {
            kind,
            price,
            bar_index: pivot.bar_index,
            timestamp: pivot.timestamp,
            confirmed_at,
        }
    }

    fn remember(list: &mut VecDeque<SwingPoint>, point: SwingPoint, keep: usize) {
        list.push_back(point);
        while list.len() > keep {
            list.pop_front();
        }
    }

    pub fn highs(&self) -> impl Iterator<Item = &SwingPoint> {
        self.highs.iter()
    }

    pub fn lows(&self) -> impl Iterator<Item = &SwingPoint> {
        self.lows.iter()
    }

    pub fn latest_high(&self) -> Option<&SwingPoint> {
        self.highs.back()
    }

    pub fn latest_low(&self) -> Option<&SwingPoint> {
        self.lows.back()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.highs.clear();
        self.lows.clear();
    }
}
