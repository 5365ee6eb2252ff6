//! Runner error type.

use std::path::PathBuf;

use slingshot_core::engine::{ConfigError, ReplayError};
use thiserror::Error;

/// Errors from loading batch files, running batches and installing logging.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid batch file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("batch contains no runs")]
    EmptyBatch,

    #[error("run name '{0}' appears more than once")]
    DuplicateRun(String),

    #[error("runs '{first}' and '{second}' would both write artifacts named '{stem}'")]
    FileStemClash {
        first: String,
        second: String,
        stem: String,
    },

    #[error("run '{run}': {source}")]
    Config {
        run: String,
        #[source]
        source: ConfigError,
    },

    #[error("run '{run}' failed: {source}")]
    Replay {
        run: String,
        #[source]
        source: ReplayError,
    },

    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl RunnerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunnerError::Io {
            path: path.into(),
            source,
        }
    }
}
