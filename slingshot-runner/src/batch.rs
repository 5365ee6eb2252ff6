//! Parallel batches of independent replays.
//!
//! Every run in a batch replays the same bars and auxiliary feeds with its own
//! engine settings and a freshly built strategy instance. Runs share nothing
//! mutable, so they fan out over a rayon pool; results come back in the
//! order the runs were listed.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use slingshot_core::data::MarketFeed;
use slingshot_core::domain::Bar;
use slingshot_core::engine::{replay, ReplayResult};
use tracing::info;

use crate::config::{RunId, RunSpec};
use crate::error::RunnerError;

/// One finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub name: String,
    pub run_id: RunId,
    pub spec: RunSpec,
    pub result: ReplayResult,
}

impl RunOutcome {
    pub fn summary(&self) -> RunSummary {
        let trades = &self.result.trades;
        let wins = trades.iter().filter(|t| t.net_pnl > 0.0).count();
        RunSummary {
            name: self.name.clone(),
            run_id: self.run_id.clone(),
            strategy: self.result.strategy.clone(),
            bars: self.result.bar_count,
            signals: self.result.signal_count,
            trades: trades.len(),
            wins,
            losses: trades.len() - wins,
            win_rate: if trades.is_empty() {
                0.0
            } else {
                wins as f64 / trades.len() as f64
            },
            net_pnl: self.result.net_pnl(),
            rejected: self.result.rejected.len(),
            expired_orders: self.result.expired_orders.len(),
            open_at_end: !self.result.is_flat(),
            fingerprint: self.result.fingerprint(),
        }
    }
}

/// Headline numbers for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub name: String,
    pub run_id: RunId,
    pub strategy: String,
    pub bars: usize,
    pub signals: usize,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub net_pnl: f64,
    pub rejected: usize,
    pub expired_orders: usize,
    /// A position or limit order was still live at end of data.
    pub open_at_end: bool,
    pub fingerprint: String,
}

/// Shared market data for a batch.
pub struct Batch<'a> {
    bars: &'a [Bar],
    feed: &'a MarketFeed,
    parallel: bool,
}

impl<'a> Batch<'a> {
    pub fn new(bars: &'a [Bar], feed: &'a MarketFeed) -> Self {
        Self {
            bars,
            feed,
            parallel: true,
        }
    }

    /// Enable or disable parallel execution (default: enabled).
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Replay a single run.
    pub fn run_one(&self, spec: &RunSpec) -> Result<RunOutcome, RunnerError> {
        spec.validate()?;
        let strategy = spec.strategy.build().map_err(|source| RunnerError::Config {
            run: spec.name.clone(),
            source,
        })?;
        let result =
            replay(&spec.engine, self.feed, strategy, self.bars).map_err(|source| RunnerError::Replay {
                run: spec.name.clone(),
                source,
            })?;
        info!(
            run = %spec.name,
            trades = result.trades.len(),
            net_pnl = result.net_pnl(),
            "run complete"
        );
        Ok(RunOutcome {
            name: spec.name.clone(),
            run_id: spec.run_id()?,
            spec: spec.clone(),
            result,
        })
    }

    /// Replay every run. The first failing run aborts the batch.
    pub fn run(&self, specs: &[RunSpec]) -> Result<Vec<RunOutcome>, RunnerError> {
        self.run_with_progress(specs, |_, _, _| {})
    }

    /// Replay every run, calling `progress(index, total, outcome)` as each
    /// finishes. With parallelism on, calls arrive in completion order.
    pub fn run_with_progress<F>(
        &self,
        specs: &[RunSpec],
        progress: F,
    ) -> Result<Vec<RunOutcome>, RunnerError>
    where
        F: Fn(usize, usize, &RunOutcome) + Send + Sync,
    {
        let total = specs.len();
        info!(runs = total, bars = self.bars.len(), parallel = self.parallel, "batch started");
        let run = |(idx, spec): (usize, &RunSpec)| -> Result<RunOutcome, RunnerError> {
            let outcome = self.run_one(spec)?;
            progress(idx, total, &outcome);
            Ok(outcome)
        };
        if self.parallel {
            specs.par_iter().enumerate().map(run).collect()
        } else {
            specs.iter().enumerate().map(run).collect()
        }
    }
}
