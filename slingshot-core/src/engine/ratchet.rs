//! Ratchet invariant enforcement
//!
//! **Core Rule:** Stops may tighten, never loosen.
//!
//! The trailing stop proposes `high_water - offset` (long) or
//! `high_water + offset` (short) once armed. The proposal only replaces the
//! current stop when it is tighter.

use crate::domain::{Bar, Position, Side};

/// Apply the ratchet rule to a proposed stop.
///
/// - Long positions: stop can only rise (max of current and proposed)
/// - Short positions: stop can only fall (min of current and proposed)
///
/// # Example
/// ```
/// use slingshot_core::domain::Side;
/// use slingshot_core::engine::ratchet::tighten;
///
/// assert_eq!(tighten(Side::Long, 95.0, 100.0), 100.0);
/// assert_eq!(tighten(Side::Long, 100.0, 90.0), 100.0);
/// assert_eq!(tighten(Side::Short, 105.0, 110.0), 105.0);
/// ```
pub fn tighten(side: Side, current: f64, proposed: f64) -> f64 {
    if !proposed.is_finite() {
        return current;
    }
    match side {
        Side::Long => current.max(proposed),
        Side::Short => current.min(proposed),
    }
}

/// Fold a completed bar into the trailing state and ratchet the stop for the
/// next bar. Returns true if the stop moved.
pub fn advance_trailing(position: &mut Position, bar: &Bar) -> bool {
    let side = position.side;
    let entry = position.entry_price;
    let favorable = position.favorable_extreme(bar);
    let Some(trail) = position.trailing.as_mut() else {
        return false;
    };

    trail.high_water = match side {
        Side::Long => trail.high_water.max(favorable),
        Side::Short => trail.high_water.min(favorable),
    };
    if !trail.armed && (trail.high_water - entry) * side.sign() >= trail.spec.activation {
        trail.armed = true;
    }

    let Some(proposed) = trail.proposed_stop(side) else {
        return false;
    };
    let previous = position.stop;
    position.stop = tighten(side, previous, proposed);
    debug_assert!(
        (position.stop - previous) * side.sign() >= 0.0,
        "ratchet violation: stop loosened from {previous} to {}",
        position.stop
    );
    position.stop != previous
}
