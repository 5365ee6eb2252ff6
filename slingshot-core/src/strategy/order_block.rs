//! Order-block retest.
//!
//! A displacement bar (body at least `displacement_factor` times the mean
//! range of the lookback window) marks the opposite-colored bar before it as
//! an order block. One zone is watched at a time. The signal fires when a
//! later bar trades back into the zone and closes out of it in the
//! displacement direction.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Confirmation, Cooldown, EvalOptions, Strategy};
use crate::data::MarketView;
use crate::detect::{PendingEvents, RollingWindow};
use crate::domain::{Bar, Side, SignalIntent, TrailingSpec};
use crate::engine::config::{
    ensure_cooldown, ensure_count, ensure_non_negative, ensure_positive, ConfigError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBlockParams {
    /// Bars in the mean-range window.
    pub lookback: usize,
    pub displacement_factor: f64,
    /// Bars a zone is watched before it is abandoned.
    pub expiry_bars: usize,
    /// Points beyond the zone for the stop.
    pub stop_buffer: f64,
    /// Target as a multiple of the entry-to-stop risk.
    pub reward_ratio: f64,
    pub trailing: Option<TrailingSpec>,
    pub max_hold_bars: Option<usize>,
    pub cooldown_secs: u64,
    pub confirmation: Confirmation,
}

impl Default for OrderBlockParams {
    fn default() -> Self {
        Self {
            lookback: 10,
            displacement_factor: 2.0,
            expiry_bars: 10,
            stop_buffer: 1.0,
            reward_ratio: 2.0,
            trailing: None,
            max_hold_bars: None,
            cooldown_secs: 900,
            confirmation: Confirmation::default(),
        }
    }
}

impl OrderBlockParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_count("order_block.lookback", self.lookback)?;
        ensure_positive("order_block.displacement_factor", self.displacement_factor)?;
        ensure_count("order_block.expiry_bars", self.expiry_bars)?;
        ensure_non_negative("order_block.stop_buffer", self.stop_buffer)?;
        ensure_positive("order_block.reward_ratio", self.reward_ratio)?;
        ensure_cooldown("order_block.cooldown_secs", self.cooldown_secs)?;
        if let Some(m) = self.max_hold_bars {
            ensure_count("order_block.max_hold_bars", m)?;
        }
        if let Some(t) = self.trailing {
            if !t.is_valid() {
                return Err(ConfigError::InvalidTrailing {
                    activation: t.activation,
                    offset: t.offset,
                });
            }
        }
        Ok(())
    }
}

/// Watched order-block zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    /// Direction of the displacement that created the zone.
    pub side: Side,
    pub top: f64,
    pub bottom: f64,
    /// Set once a bar has traded into the zone.
    pub touched: bool,
}

impl Zone {
    fn overlaps(&self, bar: &Bar) -> bool {
        bar.low <= self.top && bar.high >= self.bottom
    }

    fn closed_out(&self, bar: &Bar) -> bool {
        match self.side {
            Side::Long => bar.close > self.top,
            Side::Short => bar.close < self.bottom,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderBlock {
    params: OrderBlockParams,
    /// Keyed by the order-block bar index.
    zone: PendingEvents<usize, Zone>,
    ranges: RollingWindow,
    cooldown: Cooldown,
}

impl OrderBlock {
    pub fn new(params: OrderBlockParams) -> Self {
        Self {
            zone: PendingEvents::single(params.expiry_bars),
            ranges: RollingWindow::new(params.lookback),
            cooldown: Cooldown::from_secs(params.cooldown_secs),
            params,
        }
    }

    pub fn watched_zone(&self) -> Option<Zone> {
        self.zone.iter().next().map(|(_, ev)| ev.payload)
    }

    fn displacement(&self, bar: &Bar, prev: &Bar) -> Option<Zone> {
        if !self.ranges.is_full() {
            return None;
        }
        let mean = self.ranges.mean()?;
        if mean <= 0.0 || bar.body() < self.params.displacement_factor * mean {
            return None;
        }
        let side = if bar.is_bullish() && prev.is_bearish() {
            Side::Long
        } else if bar.is_bearish() && prev.is_bullish() {
            Side::Short
        } else {
            return None;
        };
        Some(Zone {
            side,
            top: prev.high,
            bottom: prev.low,
            touched: false,
        })
    }
}

impl Strategy for OrderBlock {
    fn name(&self) -> &str {
        "order_block"
    }

    fn evaluate_signal(
        &mut self,
        bar: &Bar,
        previous: Option<&Bar>,
        view: &MarketView<'_>,
        options: &EvalOptions<'_>,
    ) -> Option<SignalIntent> {
        let index = options.bar_index;
        let outcome = self.zone.step(
            index,
            |_, zone| zone.touched |= zone.overlaps(bar),
            |_, ev| ev.payload.touched && ev.payload.closed_out(bar),
        );
        for (ob_bar, _) in &outcome.expired {
            debug!(ob_bar, "order block expired without retest");
        }

        let mut signal = None;
        if let Some((ob_bar, ev)) = outcome.completed.first() {
            let zone = ev.payload;
            let (stop, side) = match zone.side {
                Side::Long => (zone.bottom - self.params.stop_buffer, Side::Long),
                Side::Short => (zone.top + self.params.stop_buffer, Side::Short),
            };
            let risk = (bar.close - stop) * side.sign();
            let target = bar.close + side.sign() * risk * self.params.reward_ratio;
            if !self.cooldown.is_ready(bar.timestamp) {
                debug!(ob_bar, "order block retest during cooldown");
            } else if risk > 0.0 && self.params.confirmation.confirms(side, view) {
                let mut intent = SignalIntent::market(
                    self.name(),
                    bar.symbol.clone(),
                    bar.timestamp,
                    side,
                    bar.close,
                    stop,
                    target,
                )
                .with_trailing(self.params.trailing)
                .with_meta("zone_top", zone.top)
                .with_meta("zone_bottom", zone.bottom)
                .with_meta("order_block_bar", *ob_bar)
                .with_meta("risk_points", risk);
                if let Some(m) = self.params.max_hold_bars {
                    intent = intent.with_max_hold(m);
                }
                self.cooldown.mark(bar.timestamp);
                signal = Some(intent);
            }
        }

        if let (Some(prev), Some(ob_bar)) = (previous, index.checked_sub(1)) {
            if let Some(zone) = self.displacement(bar, prev) {
                if self.zone.open(ob_bar, zone, index, bar.timestamp) {
                    debug!(ob_bar, side = %zone.side, top = zone.top, bottom = zone.bottom, "order block marked");
                }
            }
        }
        self.ranges.push(bar.range());
        signal
    }

    fn reset(&mut self) {
        self.zone.clear();
        self.ranges.clear();
        self.cooldown.reset();
    }
}
