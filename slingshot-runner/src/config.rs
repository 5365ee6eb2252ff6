//! Batch configuration loaded from TOML.
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "compact"
//!
//! [[runs]]
//! name = "recoil-default"
//!
//! [[runs]]
//! name = "hunt-tight"
//! [runs.engine]
//! cooldown_secs = 600
//! [runs.strategy]
//! type = "stop_hunt"
//! min_penetration = 3.0
//! ```
//!
//! Omitted `engine` and `strategy` tables fall back to their defaults.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use slingshot_core::engine::EngineConfig;
use slingshot_core::strategy::StrategyConfig;

use crate::error::RunnerError;
use crate::logging::LogConfig;

/// Content hash identifying a run configuration.
pub type RunId = String;

/// One replay to perform: engine settings plus a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub name: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

impl RunSpec {
    pub fn new(name: impl Into<String>, engine: EngineConfig, strategy: StrategyConfig) -> Self {
        Self {
            name: name.into(),
            engine,
            strategy,
        }
    }

    /// Deterministic hash of engine and strategy settings.
    ///
    /// The run name is excluded, so two differently named runs with the same
    /// settings share an id.
    pub fn run_id(&self) -> Result<RunId, RunnerError> {
        let json = serde_json::to_vec(&(&self.engine, &self.strategy))?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }

    /// File-name-safe form of the run name, used for per-run artifacts.
    pub fn file_stem(&self) -> String {
        file_stem(&self.name)
    }

    /// Check engine and strategy settings, tagging any error with the run name.
    pub fn validate(&self) -> Result<(), RunnerError> {
        let tag = |source| RunnerError::Config {
            run: self.name.clone(),
            source,
        };
        self.engine.validate().map_err(tag)?;
        self.strategy.validate().map_err(tag)
    }
}

/// A batch file: logging settings and the runs to execute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub runs: Vec<RunSpec>,
}

impl BatchConfig {
    /// Parse and validate a batch from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, RunnerError> {
        let config: BatchConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a batch file.
    pub fn load(path: &Path) -> Result<Self, RunnerError> {
        let text = std::fs::read_to_string(path).map_err(|e| RunnerError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Fails on an empty batch, duplicate run names, names that share an
    /// artifact file name, or any invalid run.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.runs.is_empty() {
            return Err(RunnerError::EmptyBatch);
        }
        ensure_distinct_stems(self.runs.iter().map(|r| r.name.as_str()))?;
        for run in &self.runs {
            run.validate()?;
        }
        Ok(())
    }
}

/// Run name made safe for use as a file name.
pub(crate) fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Every run name must be unique and map to its own file stem.
pub(crate) fn ensure_distinct_stems<'a>(
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), RunnerError> {
    let mut stems: BTreeMap<String, &str> = BTreeMap::new();
    for name in names {
        if let Some(first) = stems.insert(file_stem(name), name) {
            if first == name {
                return Err(RunnerError::DuplicateRun(name.to_string()));
            }
            return Err(RunnerError::FileStemClash {
                first: first.to_string(),
                second: name.to_string(),
                stem: file_stem(name),
            });
        }
    }
    Ok(())
}
