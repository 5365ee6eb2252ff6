//! Execution state machine and replay driver.

pub mod config;
pub mod cost;
pub mod execution;
pub mod ratchet;
pub mod replay;
pub mod result;

pub use config::{CalendarConfig, ConfigError, EngineConfig, MAX_COOLDOWN_SECS};
pub use cost::{CostModel, RoundTripCost};
pub use execution::{
    validate_intent, Execution, ExecutionOutcome, ExecutionState, ExpiredOrder, PendingOrder,
    RejectedSignal, RejectionReason,
};
pub use replay::{replay, Replay, ReplayError};
pub use result::ReplayResult;
