//! Strategy contract and shared helpers.
//!
//! The engine calls [`Strategy::evaluate_signal`] once per bar with the fused
//! [`MarketView`] and gets back either nothing or a complete [`SignalIntent`].
//! Strategies own whatever history they need (rolling windows, detector maps,
//! last-signal times) and must drop all of it in [`Strategy::reset`].
//!
//! # Architecture invariant
//! A strategy never sees position or order state. Whether an intent is
//! accepted is the execution state machine's decision.

pub mod factory;
pub mod gex_recoil;
pub mod order_block;
pub mod overnight;
pub mod stop_hunt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{Session, SessionCalendar};
use crate::data::MarketView;
use crate::domain::{Bar, Side, SignalIntent};
use crate::engine::config::cooldown_duration;

pub use factory::StrategyConfig;
pub use gex_recoil::{GexRecoil, GexRecoilParams};
pub use order_block::{OrderBlock, OrderBlockParams};
pub use overnight::{OvernightDrift, OvernightDriftParams};
pub use stop_hunt::{StopHunt, StopHuntParams};

/// Per-bar context the driver passes alongside the market view.
#[derive(Debug, Clone, Copy)]
pub struct EvalOptions<'a> {
    pub bar_index: usize,
    pub session: Session,
    pub trading_day: bool,
    pub calendar: &'a SessionCalendar,
}

/// Polymorphic signal source.
pub trait Strategy: Send {
    /// Human-readable name (e.g., "gex_recoil").
    fn name(&self) -> &str;

    /// Evaluate the current bar. Must only use `bar`, `previous`, `view` and
    /// state accumulated from earlier calls.
    fn evaluate_signal(
        &mut self,
        bar: &Bar,
        previous: Option<&Bar>,
        view: &MarketView<'_>,
        options: &EvalOptions<'_>,
    ) -> Option<SignalIntent>;

    /// Wipe all internal state.
    fn reset(&mut self);
}

/// Minimum spacing between signals from one strategy instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Cooldown {
    duration: Duration,
    last: Option<DateTime<Utc>>,
}

impl Cooldown {
    pub fn new(duration: Duration) -> Self {
        Self { duration, last: None }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(cooldown_duration(secs))
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Time since the last signal, or `None` before the first one.
    pub fn elapsed_since(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last.map(|last| now - last)
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_since(now).map_or(true, |e| e >= self.duration)
    }

    pub fn mark(&mut self, at: DateTime<Utc>) {
        self.last = Some(at);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Optional order-flow agreement required before a strategy may fire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Confirmation {
    /// Minimum imbalance ratio in the trade direction.
    pub min_imbalance: Option<f64>,
    /// Require the cumulative delta sign to match the trade direction.
    pub require_flow: bool,
}

impl Confirmation {
    /// True when every enabled check agrees with `side`. A missing snapshot
    /// fails an enabled check.
    pub fn confirms(&self, side: Side, view: &MarketView<'_>) -> bool {
        if let Some(threshold) = self.min_imbalance {
            let agrees = view.imbalance.is_some_and(|snap| match side {
                Side::Long => snap.favors_bids(threshold),
                Side::Short => snap.favors_asks(threshold),
            });
            if !agrees {
                return false;
            }
        }
        if self.require_flow {
            let agrees = view
                .flow
                .is_some_and(|snap| snap.cumulative_delta * side.sign() > 0.0);
            if !agrees {
                return false;
            }
        }
        true
    }

    pub fn is_valid(&self) -> bool {
        self.min_imbalance
            .map_or(true, |t| t.is_finite() && (0.0..=1.0).contains(&t))
    }
}
