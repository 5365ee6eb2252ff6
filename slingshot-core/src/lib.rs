//! Slingshot Core — bar-by-bar replay of level-driven futures strategies.
//!
//! This crate contains the replay engine:
//! - Domain types (bars, auxiliary snapshots, signal intents, positions, trades)
//! - As-of fusion of irregularly sampled auxiliary feeds, with no lookahead
//! - Session classification in a DST-aware reference timezone
//! - Pending-event primitive shared by multi-bar detectors
//! - Strategy trait and the concrete strategies
//! - Execution state machine with the ratchet invariant on stops
//! - Replay driver and run fingerprinting

pub mod calendar;
pub mod data;
pub mod detect;
pub mod domain;
pub mod engine;
pub mod strategy;

pub use engine::{replay, EngineConfig, Replay, ReplayError, ReplayResult};
pub use strategy::{Strategy, StrategyConfig};
