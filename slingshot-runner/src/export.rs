//! Export of batch outcomes: JSON bundle and per-run CSV trade tapes.
//!
//! Persisted JSON carries a `schema_version`. Files written by a newer
//! version are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use slingshot_core::domain::Trade;

use crate::batch::{RunOutcome, RunSummary};
use crate::config::{ensure_distinct_stems, file_stem};

/// Current export schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// On-disk batch export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchExport {
    pub schema_version: u32,
    pub summaries: Vec<RunSummary>,
    pub runs: Vec<RunOutcome>,
}

impl BatchExport {
    pub fn new(runs: Vec<RunOutcome>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            summaries: runs.iter().map(RunOutcome::summary).collect(),
            runs,
        }
    }
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize outcomes to pretty JSON.
pub fn export_json(runs: &[RunOutcome]) -> Result<String> {
    serde_json::to_string_pretty(&BatchExport::new(runs.to_vec()))
        .context("failed to serialize batch export to JSON")
}

/// Deserialize an export, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BatchExport> {
    let export: BatchExport =
        serde_json::from_str(json).context("failed to deserialize batch export from JSON")?;
    if export.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            export.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(export)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a trade list as CSV.
///
/// Columns: strategy, symbol, side, entry_bar, entry_time, entry_price,
/// exit_bar, exit_time, exit_price, exit_reason, quantity, gross_pnl,
/// commission, slippage, net_pnl, bars_held, mae, mfe
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "strategy",
        "symbol",
        "side",
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "exit_reason",
        "quantity",
        "gross_pnl",
        "commission",
        "slippage",
        "net_pnl",
        "bars_held",
        "mae",
        "mfe",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.strategy,
            &t.symbol,
            &t.side.to_string(),
            &t.entry_bar.to_string(),
            &t.entry_time.to_rfc3339(),
            &format!("{:.6}", t.entry_price),
            &t.exit_bar.to_string(),
            &t.exit_time.to_rfc3339(),
            &format!("{:.6}", t.exit_price),
            &t.exit_reason.to_string(),
            &format!("{:.6}", t.quantity),
            &format!("{:.2}", t.gross_pnl),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.slippage),
            &format!("{:.2}", t.net_pnl),
            &t.bars_held.to_string(),
            &format!("{:.2}", t.mae),
            &format!("{:.2}", t.mfe),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for a batch under `output_dir`:
/// - `batch.json`: every outcome plus summaries
/// - `summary.json`: headline numbers only
/// - `trades/{run}.csv`: one trade tape per run
///
/// Returns the path of `batch.json`. Nothing is written when two run names
/// map to the same trade-tape file.
pub fn save_batch(runs: &[RunOutcome], output_dir: &Path) -> Result<PathBuf> {
    ensure_distinct_stems(runs.iter().map(|r| r.name.as_str()))
        .context("cannot save batch artifacts")?;

    let trades_dir = output_dir.join("trades");
    std::fs::create_dir_all(&trades_dir)
        .with_context(|| format!("failed to create artifact dir: {}", trades_dir.display()))?;

    let export = BatchExport::new(runs.to_vec());
    let batch_path = output_dir.join("batch.json");
    let json = serde_json::to_string_pretty(&export).context("failed to serialize batch export")?;
    std::fs::write(&batch_path, json)
        .with_context(|| format!("failed to write {}", batch_path.display()))?;

    let summary = serde_json::to_string_pretty(&export.summaries).context("failed to serialize summaries")?;
    std::fs::write(output_dir.join("summary.json"), summary)?;

    for run in runs {
        let csv = export_trades_csv(&run.result.trades)?;
        let path = trades_dir.join(format!("{}.csv", file_stem(&run.name)));
        std::fs::write(&path, csv).with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(batch_path)
}

/// Load a `batch.json` written by [`save_batch`].
pub fn load_batch(path: &Path) -> Result<BatchExport> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_schema_is_rejected() {
        let json = r#"{"schema_version": 99, "summaries": [], "runs": []}"#;
        let err = import_json(json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version 99"));
    }

    #[test]
    fn empty_export_loads() {
        let json = export_json(&[]).unwrap();
        let export = import_json(&json).unwrap();
        assert_eq!(export.schema_version, SCHEMA_VERSION);
        assert!(export.runs.is_empty());
    }

    #[test]
    fn empty_trade_tape_has_header_only() {
        let csv = export_trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("strategy,symbol,side,entry_bar"));
    }
}
