//! Session classification and wall-clock deadlines in a reference timezone.
//!
//! All clock arithmetic goes through `chrono-tz`, so deadlines computed across
//! a daylight-saving change land on the intended local hour. A fixed UTC
//! offset would drift by an hour on either side of the transition.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default reference timezone for US index futures.
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

#[derive(Debug, Error, PartialEq)]
pub enum CalendarError {
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("local hour {0} is out of range (0-23)")]
    InvalidHour(u32),

    #[error("local time {0} cannot be resolved in {1}")]
    Unresolvable(NaiveDateTime, String),
}

/// Trading session of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Session {
    Overnight,
    Premarket,
    Regular,
    Afterhours,
}

impl Session {
    pub const ALL: [Session; 4] = [
        Session::Overnight,
        Session::Premarket,
        Session::Regular,
        Session::Afterhours,
    ];
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Session::Overnight => "overnight",
            Session::Premarket => "premarket",
            Session::Regular => "regular",
            Session::Afterhours => "afterhours",
        };
        f.write_str(s)
    }
}

/// Half-open local-clock window `[start, end)`. Wraps midnight when `end <= start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SessionWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    fn hm(start: (u32, u32), end: (u32, u32)) -> Self {
        Self {
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.wraps_midnight() {
            t >= self.start || t < self.end
        } else {
            t >= self.start && t < self.end
        }
    }
}

/// The four configurable boundary pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBounds {
    pub overnight: SessionWindow,
    pub premarket: SessionWindow,
    pub regular: SessionWindow,
    pub afterhours: SessionWindow,
}

impl Default for SessionBounds {
    fn default() -> Self {
        Self {
            overnight: SessionWindow::hm((18, 0), (4, 0)),
            premarket: SessionWindow::hm((4, 0), (9, 30)),
            regular: SessionWindow::hm((9, 30), (16, 0)),
            afterhours: SessionWindow::hm((16, 0), (18, 0)),
        }
    }
}

impl SessionBounds {
    pub fn window(&self, session: Session) -> SessionWindow {
        match session {
            Session::Overnight => self.overnight,
            Session::Premarket => self.premarket,
            Session::Regular => self.regular,
            Session::Afterhours => self.afterhours,
        }
    }
}

/// Which local calendar day a forced-exit deadline falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitDay {
    SameDay,
    NextDay,
    /// Next weekday after the entry's local date.
    NextTradingDay,
}

/// Session classifier bound to one reference timezone.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCalendar {
    tz: Tz,
    bounds: SessionBounds,
}

impl SessionCalendar {
    pub fn new(timezone: &str, bounds: SessionBounds) -> Result<Self, CalendarError> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| CalendarError::UnknownTimezone(timezone.to_string()))?;
        Ok(Self { tz, bounds })
    }

    /// New York clock with the default session boundaries.
    pub fn new_york() -> Self {
        Self {
            tz: chrono_tz::America::New_York,
            bounds: SessionBounds::default(),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn bounds(&self) -> &SessionBounds {
        &self.bounds
    }

    /// Local wall-clock time of `ts`.
    pub fn local(&self, ts: DateTime<Utc>) -> NaiveDateTime {
        ts.with_timezone(&self.tz).naive_local()
    }

    /// Session containing `ts`. Times outside every window count as overnight.
    pub fn classify(&self, ts: DateTime<Utc>) -> Session {
        let t = self.local(ts).time();
        [Session::Regular, Session::Premarket, Session::Afterhours, Session::Overnight]
            .into_iter()
            .find(|s| self.bounds.window(*s).contains(t))
            .unwrap_or(Session::Overnight)
    }

    /// False on local Saturdays and Sundays.
    pub fn is_trading_day(&self, ts: DateTime<Utc>) -> bool {
        is_weekday(self.local(ts).date())
    }

    /// Deadline at `hour:00` local time on the requested day relative to entry.
    pub fn force_exit_timestamp(
        &self,
        entry: DateTime<Utc>,
        hour: u32,
        day: ExitDay,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let time = NaiveTime::from_hms_opt(hour, 0, 0).ok_or(CalendarError::InvalidHour(hour))?;
        self.force_exit_at(entry, time, day)
    }

    /// Deadline at an arbitrary local time on the requested day relative to entry.
    pub fn force_exit_at(
        &self,
        entry: DateTime<Utc>,
        time: NaiveTime,
        day: ExitDay,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let entry_date = self.local(entry).date();
        let date = match day {
            ExitDay::SameDay => entry_date,
            ExitDay::NextDay => next_day(entry_date),
            ExitDay::NextTradingDay => {
                let mut d = next_day(entry_date);
                while !is_weekday(d) {
                    d = next_day(d);
                }
                d
            }
        };
        self.resolve(date.and_time(time))
    }

    /// Instant at which the session containing `ts` ends.
    pub fn session_end_after(&self, ts: DateTime<Utc>) -> Result<DateTime<Utc>, CalendarError> {
        let local = self.local(ts);
        let window = self.bounds.window(self.classify(ts));
        let date = if window.end > local.time() {
            local.date()
        } else {
            next_day(local.date())
        };
        self.resolve(date.and_time(window.end))
    }

    /// Map a local wall-clock time to UTC.
    ///
    /// Ambiguous times (fall-back hour) take the earlier instant. Times inside
    /// the spring-forward gap move to the first valid instant an hour later.
    fn resolve(&self, local: NaiveDateTime) -> Result<DateTime<Utc>, CalendarError> {
        if let Some(t) = self.tz.from_local_datetime(&local).earliest() {
            return Ok(t.with_timezone(&Utc));
        }
        let shifted = local + Duration::hours(1);
        self.tz
            .from_local_datetime(&shifted)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| CalendarError::Unresolvable(local, self.tz.name().to_string()))
    }
}

impl Default for SessionCalendar {
    fn default() -> Self {
        Self::new_york()
    }
}

fn next_day(d: NaiveDate) -> NaiveDate {
    d.succ_opt().unwrap_or(d)
}

fn is_weekday(d: NaiveDate) -> bool {
    !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)
}
