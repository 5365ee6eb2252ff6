//! Stop-hunt reversal detector.
//!
//! A bar that pierces a known level by at least `min_penetration` opens a
//! pending hunt keyed by the level's identity and side. While in flight the
//! hunt tracks its extension extreme. A later close back through the level
//! completes it and the strategy fades the hunt: long after a run below a
//! level, short after a run above one. Hunts that do not reverse within
//! `expiry_bars` are dropped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Confirmation, Cooldown, EvalOptions, Strategy};
use crate::data::MarketView;
use crate::detect::{PendingEvent, PendingEvents, RollingWindow, SwingTracker};
use crate::domain::{Bar, LevelSource, Side, SignalIntent, TrailingSpec};
use crate::engine::config::{
    ensure_cooldown, ensure_count, ensure_non_negative, ensure_positive, ConfigError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopHuntParams {
    /// Minimum distance beyond the level for a bar to count as a hunt.
    pub min_penetration: f64,
    /// Bars a hunt may stay open waiting for the reversal.
    pub expiry_bars: usize,
    /// Bars in the rolling mean-volume window.
    pub volume_window: usize,
    /// Minimum hunt-bar volume relative to the rolling mean.
    pub min_volume_ratio: Option<f64>,
    /// Points beyond the hunt extreme for the stop.
    pub stop_buffer: f64,
    pub target_points: f64,
    pub use_liquidity_levels: bool,
    /// Add confirmed swing highs/lows with this strength as levels.
    pub swing_strength: Option<usize>,
    pub trailing: Option<TrailingSpec>,
    pub max_hold_bars: Option<usize>,
    pub cooldown_secs: u64,
    pub confirmation: Confirmation,
}

impl Default for StopHuntParams {
    fn default() -> Self {
        Self {
            min_penetration: 2.0,
            expiry_bars: 4,
            volume_window: 20,
            min_volume_ratio: None,
            stop_buffer: 2.0,
            target_points: 20.0,
            use_liquidity_levels: true,
            swing_strength: None,
            trailing: None,
            max_hold_bars: None,
            cooldown_secs: 900,
            confirmation: Confirmation::default(),
        }
    }
}

impl StopHuntParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("stop_hunt.min_penetration", self.min_penetration)?;
        ensure_count("stop_hunt.expiry_bars", self.expiry_bars)?;
        ensure_count("stop_hunt.volume_window", self.volume_window)?;
        ensure_non_negative("stop_hunt.stop_buffer", self.stop_buffer)?;
        ensure_positive("stop_hunt.target_points", self.target_points)?;
        ensure_cooldown("stop_hunt.cooldown_secs", self.cooldown_secs)?;
        if let Some(r) = self.min_volume_ratio {
            ensure_positive("stop_hunt.min_volume_ratio", r)?;
        }
        if let Some(s) = self.swing_strength {
            ensure_count("stop_hunt.swing_strength", s)?;
        }
        if let Some(m) = self.max_hold_bars {
            ensure_count("stop_hunt.max_hold_bars", m)?;
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

/// Which side of the level the hunt ran to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HuntSide {
    Below,
    Above,
}

/// In-flight hunt state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hunt {
    pub level: f64,
    /// Lowest low (below) or highest high (above) since the hunt opened.
    pub extreme: f64,
    /// Hunt-bar volume over the rolling mean before it.
    pub volume_ratio: f64,
}

type HuntKey = (LevelSource, HuntSide);

#[derive(Debug, Clone)]
pub struct StopHunt {
    params: StopHuntParams,
    hunts: PendingEvents<HuntKey, Hunt>,
    volume: RollingWindow,
    swings: Option<SwingTracker>,
    cooldown: Cooldown,
}

impl StopHunt {
    pub fn new(params: StopHuntParams) -> Self {
        Self {
            hunts: PendingEvents::new(params.expiry_bars),
            volume: RollingWindow::new(params.volume_window),
            swings: params.swing_strength.map(|s| SwingTracker::new(s, 3)),
            cooldown: Cooldown::from_secs(params.cooldown_secs),
            params,
        }
    }

    /// Number of hunts currently in flight.
    pub fn pending(&self) -> usize {
        self.hunts.len()
    }

    fn levels(&self, view: &MarketView<'_>) -> Vec<(LevelSource, f64)> {
        let mut levels = view.options.map(|o| o.named_levels()).unwrap_or_default();
        if self.params.use_liquidity_levels {
            if let Some(lt) = view.liquidity {
                levels.extend(lt.named_levels());
            }
        }
        if let Some(swings) = &self.swings {
            if let Some(h) = swings.latest_high() {
                levels.push((LevelSource::SwingHigh, h.price));
            }
            if let Some(l) = swings.latest_low() {
                levels.push((LevelSource::SwingLow, l.price));
            }
        }
        levels
    }

    fn intent_for(
        &self,
        bar: &Bar,
        key: HuntKey,
        event: &PendingEvent<Hunt>,
        bar_index: usize,
    ) -> SignalIntent {
        let (source, side) = key;
        let hunt = event.payload;
        let (trade_side, stop, target) = match side {
            HuntSide::Below => (
                Side::Long,
                hunt.extreme - self.params.stop_buffer,
                bar.close + self.params.target_points,
            ),
            HuntSide::Above => (
                Side::Short,
                hunt.extreme + self.params.stop_buffer,
                bar.close - self.params.target_points,
            ),
        };
        let mut intent = SignalIntent::market(
            self.name(),
            bar.symbol.clone(),
            bar.timestamp,
            trade_side,
            bar.close,
            stop,
            target,
        )
        .with_trailing(self.params.trailing)
        .with_meta("hunted_level", hunt.level)
        .with_meta("level_source", source.to_string())
        .with_meta("hunt_extreme", hunt.extreme)
        .with_meta("volume_ratio", hunt.volume_ratio)
        .with_meta("bars_to_reverse", event.age(bar_index));
        if let Some(m) = self.params.max_hold_bars {
            intent = intent.with_max_hold(m);
        }
        intent
    }
}

impl Strategy for StopHunt {
    fn name(&self) -> &str {
        "stop_hunt"
    }

    fn evaluate_signal(
        &mut self,
        bar: &Bar,
        previous: Option<&Bar>,
        view: &MarketView<'_>,
        options: &EvalOptions<'_>,
    ) -> Option<SignalIntent> {
        let index = options.bar_index;
        let levels = self.levels(view);
        let volume_ratio = match self.volume.mean() {
            Some(mean) if mean > 0.0 => bar.volume / mean,
            _ => 1.0,
        };

        let outcome = self.hunts.step(
            index,
            |(_, side), hunt| match side {
                HuntSide::Below => hunt.extreme = hunt.extreme.min(bar.low),
                HuntSide::Above => hunt.extreme = hunt.extreme.max(bar.high),
            },
            |(_, side), ev| match side {
                HuntSide::Below => bar.close > ev.payload.level,
                HuntSide::Above => bar.close < ev.payload.level,
            },
        );
        for (key, ev) in &outcome.expired {
            debug!(source = %key.0, side = ?key.1, level = ev.payload.level, "hunt expired without reversal");
        }

        let mut signal = None;
        if self.cooldown.is_ready(bar.timestamp) {
            for (key, ev) in &outcome.completed {
                if let Some(min) = self.params.min_volume_ratio {
                    if ev.payload.volume_ratio < min {
                        debug!(source = %key.0, ratio = ev.payload.volume_ratio, "hunt volume too thin");
                        continue;
                    }
                }
                let intent = self.intent_for(bar, *key, ev, index);
                if !self.params.confirmation.confirms(intent.side, view) {
                    continue;
                }
                signal = Some(intent);
                break;
            }
        }

        // New hunts open after completion so a hunt never reverses on its own bar.
        if let Some(prev) = previous {
            let pen = self.params.min_penetration;
            for (source, level) in levels {
                if prev.close >= level && bar.low <= level - pen {
                    let hunt = Hunt { level, extreme: bar.low, volume_ratio };
                    if self.hunts.open((source, HuntSide::Below), hunt, index, bar.timestamp) {
                        debug!(%source, level, extreme = bar.low, "hunt below level opened");
                    }
                }
                if prev.close <= level && bar.high >= level + pen {
                    let hunt = Hunt { level, extreme: bar.high, volume_ratio };
                    if self.hunts.open((source, HuntSide::Above), hunt, index, bar.timestamp) {
                        debug!(%source, level, extreme = bar.high, "hunt above level opened");
                    }
                }
            }
        }

        if let Some(swings) = self.swings.as_mut() {
            swings.push(index, bar);
        }
        self.volume.push(bar.volume);

        if let Some(intent) = &signal {
            self.cooldown.mark(intent.timestamp);
        }
        signal
    }

    fn reset(&mut self) {
        self.hunts.clear();
        self.volume.clear();
        if let Some(s) = self.swings.as_mut() {
            s.reset();
        }
        self.cooldown.reset();
    }
}
