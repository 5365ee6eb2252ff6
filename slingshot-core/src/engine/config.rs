//! Engine configuration and setup-time validation.
//!
//! Every option is checked by [`EngineConfig::validate`] before the first bar
//! is processed. A bad value never surfaces halfway through a replay.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use super::cost::CostModel;
use crate::calendar::{CalendarError, Session, SessionBounds, SessionCalendar, DEFAULT_TIMEZONE};
use crate::domain::TrailingSpec;

/// Setup-time configuration errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },

    #[error("allowed_sessions must not be empty")]
    NoSessions,

    #[error("invalid trailing stop: activation {activation}, offset {offset}")]
    InvalidTrailing { activation: f64, offset: f64 },

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

pub(crate) fn ensure_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

pub(crate) fn ensure_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

pub(crate) fn ensure_count(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(ConfigError::ZeroCount { field })
    }
}

/// Longest cooldown validation accepts: one leap year.
pub const MAX_COOLDOWN_SECS: u64 = 366 * 24 * 60 * 60;

pub(crate) fn ensure_cooldown(field: &'static str, secs: u64) -> Result<(), ConfigError> {
    ensure_positive(field, secs as f64)?;
    if secs > MAX_COOLDOWN_SECS {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{secs} s exceeds the maximum of {MAX_COOLDOWN_SECS} s"),
        });
    }
    Ok(())
}

/// Cooldown seconds as a duration. Saturates instead of overflowing.
pub(crate) fn cooldown_duration(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or_else(Duration::max_value)
}

/// Reference timezone and session boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub timezone: String,
    pub sessions: SessionBounds,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            sessions: SessionBounds::default(),
        }
    }
}

impl CalendarConfig {
    pub fn build(&self) -> Result<SessionCalendar, CalendarError> {
        SessionCalendar::new(&self.timezone, self.sessions)
    }
}

/// Everything the execution state machine and replay driver need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum spacing between accepted signals, in seconds.
    pub cooldown_secs: u64,
    /// Bars a limit order rests before it is discarded.
    pub limit_fill_timeout_bars: usize,
    /// Applied when an intent carries no max-hold of its own.
    pub max_hold_bars: Option<usize>,
    /// Applied when an intent carries no trailing spec of its own.
    pub trailing: Option<TrailingSpec>,
    /// Close positions at the end of the session they were entered in.
    pub force_close_at_session_end: bool,
    /// Signals emitted outside these sessions are rejected.
    pub allowed_sessions: BTreeSet<Session>,
    pub costs: CostModel,
    /// Currency value of one point per unit.
    pub point_value: f64,
    /// Applied when an intent carries no quantity.
    pub default_quantity: f64,
    pub calendar: CalendarConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 900,
            limit_fill_timeout_bars: 3,
            max_hold_bars: None,
            trailing: None,
            force_close_at_session_end: false,
            allowed_sessions: Session::ALL.into_iter().collect(),
            costs: CostModel::default(),
            point_value: 1.0,
            default_quantity: 1.0,
            calendar: CalendarConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Fail fast on any option that would make the replay meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_cooldown("cooldown_secs", self.cooldown_secs)?;
        ensure_count("limit_fill_timeout_bars", self.limit_fill_timeout_bars)?;
        if let Some(bars) = self.max_hold_bars {
            ensure_count("max_hold_bars", bars)?;
        }
        if let Some(t) = self.trailing {
            if !t.is_valid() {
                return Err(ConfigError::InvalidTrailing {
                    activation: t.activation,
                    offset: t.offset,
                });
            }
        }
        if self.allowed_sessions.is_empty() {
            return Err(ConfigError::NoSessions);
        }
        ensure_non_negative("costs.commission_per_unit", self.costs.commission_per_unit)?;
        ensure_non_negative("costs.slippage_points", self.costs.slippage_points)?;
        ensure_positive("point_value", self.point_value)?;
        ensure_positive("default_quantity", self.default_quantity)?;
        self.calendar.build()?;
        Ok(())
    }

    pub fn build_calendar(&self) -> Result<SessionCalendar, ConfigError> {
        Ok(self.calendar.build()?)
    }
}
