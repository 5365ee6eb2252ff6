//! Overnight drift: hold long through the overnight session when dealers are
//! long gamma and price sits above the flip, flat by a fixed local hour.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Confirmation, Cooldown, EvalOptions, Strategy};
use crate::calendar::{ExitDay, Session};
use crate::data::MarketView;
use crate::domain::{Bar, Regime, Side, SignalIntent, TrailingSpec};
use crate::engine::config::{ensure_cooldown, ensure_positive, ConfigError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OvernightDriftParams {
    /// Local hour of the forced exit.
    pub exit_hour: u32,
    pub exit_day: ExitDay,
    pub require_positive_regime: bool,
    pub require_above_flip: bool,
    pub stop_points: f64,
    pub target_points: f64,
    pub trailing: Option<TrailingSpec>,
    pub cooldown_secs: u64,
    pub confirmation: Confirmation,
}

impl Default for OvernightDriftParams {
    fn default() -> Self {
        Self {
            exit_hour: 9,
            exit_day: ExitDay::NextDay,
            require_positive_regime: true,
            require_above_flip: true,
            stop_points: 30.0,
            target_points: 40.0,
            trailing: None,
            cooldown_secs: 3600,
            confirmation: Confirmation::default(),
        }
    }
}

impl OvernightDriftParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exit_hour > 23 {
            return Err(ConfigError::Invalid {
                field: "overnight_drift.exit_hour",
                reason: format!("{} is not an hour of the day", self.exit_hour),
            });
        }
        ensure_positive("overnight_drift.stop_points", self.stop_points)?;
        ensure_positive("overnight_drift.target_points", self.target_points)?;
        ensure_cooldown("overnight_drift.cooldown_secs", self.cooldown_secs)?;
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

#[derive(Debug, Clone)]
pub struct OvernightDrift {
    params: OvernightDriftParams,
    /// Local date of the last evening session already evaluated.
    last_evening: Option<NaiveDate>,
    cooldown: Cooldown,
}

impl OvernightDrift {
    pub fn new(params: OvernightDriftParams) -> Self {
        let cooldown = Cooldown::from_secs(params.cooldown_secs);
        Self {
            params,
            last_evening: None,
            cooldown,
        }
    }
}

impl Strategy for OvernightDrift {
    fn name(&self) -> &str {
        "overnight_drift"
    }

    fn evaluate_signal(
        &mut self,
        bar: &Bar,
        _previous: Option<&Bar>,
        view: &MarketView<'_>,
        options: &EvalOptions<'_>,
    ) -> Option<SignalIntent> {
        if options.session != Session::Overnight || !options.trading_day {
            return None;
        }
        let calendar = options.calendar;
        let local = calendar.local(bar.timestamp);
        // Only the evening half of the session opens a new trading night.
        if local.time() < calendar.bounds().overnight.start {
            return None;
        }
        if self.last_evening == Some(local.date()) {
            return None;
        }
        self.last_evening = Some(local.date());

        if !self.cooldown.is_ready(bar.timestamp) {
            return None;
        }
        let gex = view.options?;
        if self.params.require_positive_regime && gex.regime != Regime::Positive {
            debug!(regime = ?gex.regime, "overnight skipped: regime not positive");
            return None;
        }
        if self.params.require_above_flip {
            match gex.gamma_flip {
                Some(flip) if bar.close > flip => {}
                _ => {
                    debug!(close = bar.close, flip = ?gex.gamma_flip, "overnight skipped: below flip");
                    return None;
                }
            }
        }
        if !self.params.confirmation.confirms(Side::Long, view) {
            return None;
        }

        let exit_at = match calendar.force_exit_timestamp(
            bar.timestamp,
            self.params.exit_hour,
            self.params.exit_day,
        ) {
            Ok(t) => t,
            Err(err) => {
                debug!(%err, "overnight skipped: no exit deadline");
                return None;
            }
        };

        self.cooldown.mark(bar.timestamp);
        Some(
            SignalIntent::market(
                self.name(),
                bar.symbol.clone(),
                bar.timestamp,
                Side::Long,
                bar.close,
                bar.close - self.params.stop_points,
                bar.close + self.params.target_points,
            )
            .with_trailing(self.params.trailing)
            .with_forced_exit(exit_at)
            .with_meta("gamma_flip", gex.gamma_flip)
            .with_meta("exit_deadline", exit_at.to_rfc3339()),
        )
    }

    fn reset(&mut self) {
        self.last_evening = None;
        self.cooldown.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::SessionCalendar;
    use crate::domain::{OptionsLevelSnapshot, Timeframe};
    use chrono::{DateTime, TimeZone, Utc};

    fn bar_at(ts: DateTime<Utc>, close: f64) -> Bar {
        Bar {
            symbol: "ES".into(),
            timestamp: ts,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 500.0,
            timeframe: Timeframe::M15,
        }
    }

    fn gex(regime: Regime, flip: f64) -> OptionsLevelSnapshot {
        OptionsLevelSnapshot {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 6, 20, 0, 0).unwrap(),
            gamma_flip: Some(flip),
            call_wall: None,
            put_wall: None,
            support: vec![],
            resistance: vec![],
            regime,
            total_exposure: 0.0,
        }
    }

    fn eval(s: &mut OvernightDrift, b: &Bar, snap: &OptionsLevelSnapshot) -> Option<SignalIntent> {
        let cal = SessionCalendar::new_york();
        let mut view = MarketView::bars_only(b, None);
        view.options = Some(snap);
        let opts = EvalOptions {
            bar_index: 0,
            session: cal.classify(b.timestamp),
            trading_day: cal.is_trading_day(b.timestamp),
            calendar: &cal,
        };
        s.evaluate_signal(b, None, &view, &opts)
    }

    #[test]
    fn first_evening_bar_goes_long_with_next_morning_exit() {
        let mut s = OvernightDrift::new(OvernightDriftParams::default());
        // Monday 18:00 EST
        let b = bar_at(Utc.with_ymd_and_hms(2025, 1, 6, 23, 0, 0).unwrap(), 6000.0);
        let intent = eval(&mut s, &b, &gex(Regime::Positive, 5950.0)).unwrap();
        assert_eq!(intent.side, Side::Long);
        assert_eq!(
            intent.forced_exit_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 7, 14, 0, 0).unwrap())
        );
        assert_eq!(intent.stop, 5970.0);

        let later = bar_at(Utc.with_ymd_and_hms(2025, 1, 6, 23, 15, 0).unwrap(), 6001.0);
        assert!(eval(&mut s, &later, &gex(Regime::Positive, 5950.0)).is_none());
    }

    #[test]
    fn negative_regime_or_below_flip_skips() {
        let b = bar_at(Utc.with_ymd_and_hms(2025, 1, 6, 23, 0, 0).unwrap(), 6000.0);
        let mut s = OvernightDrift::new(OvernightDriftParams::default());
        assert!(eval(&mut s, &b, &gex(Regime::Negative, 5950.0)).is_none());
        let mut s = OvernightDrift::new(OvernightDriftParams::default());
        assert!(eval(&mut s, &b, &gex(Regime::Positive, 6050.0)).is_none());
    }

    #[test]
    fn after_midnight_bars_do_not_open_new_night() {
        let mut s = OvernightDrift::new(OvernightDriftParams::default());
        // Tuesday 01:00 EST, still overnight but past midnight
        let b = bar_at(Utc.with_ymd_and_hms(2025, 1, 7, 6, 0, 0).unwrap(), 6000.0);
        assert!(eval(&mut s, &b, &gex(Regime::Positive, 5950.0)).is_none());
    }

    #[test]
    fn regular_session_is_ignored() {
        let mut s = OvernightDrift::new(OvernightDriftParams::default());
        let b = bar_at(Utc.with_ymd_and_hms(2025, 1, 6, 15, 0, 0).unwrap(), 6000.0);
        assert!(eval(&mut s, &b, &gex(Regime::Positive, 5950.0)).is_none());
    }

    #[test]
    fn next_trading_day_exit_crosses_dst() {
        let params = OvernightDriftParams {
            exit_day: ExitDay::NextTradingDay,
            ..Default::default()
        };
        let mut s = OvernightDrift::new(params);
        // Friday 2025-03-07 18:00 EST; Monday 09:00 is already EDT
        let b = bar_at(Utc.with_ymd_and_hms(2025, 3, 7, 23, 0, 0).unwrap(), 6000.0);
        let intent = eval(&mut s, &b, &gex(Regime::Positive, 5950.0)).unwrap();
        assert_eq!(
            intent.forced_exit_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap())
        );
    }

    #[test]
    fn invalid_exit_hour_fails_validation() {
        let p = OvernightDriftParams {
            exit_hour: 24,
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }
}
