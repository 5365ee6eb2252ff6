//! Trading-session classification in a reference timezone.

pub mod session;

pub use session::{
    CalendarError, ExitDay, Session, SessionBounds, SessionCalendar, SessionWindow,
    DEFAULT_TIMEZONE,
};
