//! Slingshot Runner — batch orchestration on top of `slingshot-core`.
//!
//! This crate provides:
//! - TOML batch files describing many independent replay runs
//! - Logging setup (pretty, compact or json) for the core's tracing events
//! - Parallel execution of a batch over shared bars and auxiliary feeds
//! - JSON export of run outcomes with content-hashed run ids
//! - CSV trade tapes per run

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;

pub use batch::{Batch, RunOutcome, RunSummary};
pub use config::{BatchConfig, RunId, RunSpec};
pub use error::RunnerError;
pub use export::{
    export_json, export_trades_csv, import_json, load_batch, save_batch, BatchExport,
    SCHEMA_VERSION,
};
pub use logging::{init_logging, LogConfig, LogFormat};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn run_types_are_send_sync() {
        assert_send::<RunSpec>();
        assert_sync::<RunSpec>();
        assert_send::<RunOutcome>();
        assert_sync::<RunOutcome>();
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
    }

    #[test]
    fn batch_is_shareable_across_workers() {
        assert_sync::<Batch<'static>>();
        assert_send::<RunnerError>();
        assert_sync::<RunnerError>();
    }
}
