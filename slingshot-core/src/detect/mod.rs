//! Building blocks for multi-bar pattern detectors.

pub mod pending;
pub mod rolling;
pub mod swing;

pub use pending::{PendingEvent, PendingEvents, StepOutcome};
pub use rolling::RollingWindow;
pub use swing::{SwingKind, SwingPoint, SwingTracker};
