//! Cost model: slippage and commission per side.
//!
//! Fills are recorded at raw prices. Friction is charged in the trade's P&L:
//! slippage is a fixed number of adverse points on each fill, commission a
//! fixed amount per unit on each fill.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    /// Commission per unit per side, in currency.
    pub commission_per_unit: f64,
    /// Adverse slippage per side, in points.
    pub slippage_points: f64,
}

/// Friction charged on a round trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundTripCost {
    pub commission: f64,
    pub slippage: f64,
}

impl RoundTripCost {
    pub fn total(&self) -> f64 {
        self.commission + self.slippage
    }
}

impl CostModel {
    pub fn new(commission_per_unit: f64, slippage_points: f64) -> Self {
        Self {
            commission_per_unit,
            slippage_points,
        }
    }

    pub fn frictionless() -> Self {
        Self::default()
    }

    /// Commission and slippage for entry plus exit, in currency.
    pub fn round_trip(&self, quantity: f64, point_value: f64) -> RoundTripCost {
        RoundTripCost {
            commission: 2.0 * self.commission_per_unit * quantity,
            slippage: 2.0 * self.slippage_points * quantity * point_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frictionless_costs_nothing() {
        let cost = CostModel::frictionless().round_trip(3.0, 20.0);
        assert_eq!(cost.total(), 0.0);
    }

    #[test]
    fn round_trip_charges_both_sides() {
        let cost = CostModel::new(2.5, 0.25).round_trip(2.0, 20.0);
        assert!((cost.commission - 10.0).abs() < 1e-12);
        // 0.25 pt * 2 sides * 2 units * $20
        assert!((cost.slippage - 20.0).abs() < 1e-12);
        assert!((cost.total() - 30.0).abs() < 1e-12);
    }
}
