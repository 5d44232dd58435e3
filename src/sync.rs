//! Remote sheet synchronization.
//!
//! Mirrors a remote sheet into a local spreadsheet, rewriting the local
//! file only when the sheet's "Last Updated" watermark moved since the last
//! sync.
//!
//! ## Usage
//!
//! ```no_run
//! use payment_receipts::config::SyncSettings;
//! use payment_receipts::sync::{HttpSheetSource, run_sync};
//! use std::time::Duration;
//!
//! # fn example() -> payment_receipts::error::Result<()> {
//! let settings = SyncSettings::default();
//! let source = HttpSheetSource::new(&settings.endpoint, Duration::from_secs(settings.timeout_secs))?;
//! let outcome = run_sync(&source, &settings)?;
//! println!("{}", outcome.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## States
//!
//! - `InSync`: the remote watermark exists and equals the stored one.
//!   Nothing is written.
//! - `Stale`: anything else, including a sheet without watermarks. The
//!   local spreadsheet is replaced wholesale and the state file records
//!   the remote watermark, or the fetch time when there is none.

pub mod source;
pub mod state;

pub use source::{HttpSheetSource, RemoteSheet, SheetSource};
pub use state::SyncState;

use crate::config::SyncSettings;
use crate::error::{Result, ResultExt as _};
use crate::record::display_value;
use crate::sheet::save_table;
use chrono::Utc;
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Column carrying the per-row modification timestamp.
pub const LAST_UPDATED: &str = "Last Updated";

/// Latest non-empty "Last Updated" value, compared as text.
pub fn latest_watermark(headers: &[String], rows: &[Vec<Value>]) -> Option<String> {
    let idx = headers.iter().position(|h| h == LAST_UPDATED)?;
    rows.iter()
        .filter_map(|row| row.get(idx))
        .map(display_value)
        .filter(|value| !value.is_empty())
        .max()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    InSync,
    Stale,
}

impl SyncStatus {
    pub fn compare(remote: Option<&str>, local: Option<&str>) -> Self {
        match remote {
            Some(remote) if Some(remote) == local => Self::InSync,
            _ => Self::Stale,
        }
    }
}

/// What a sync run did.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    pub remote_watermark: Option<String>,
    /// Watermark written to the state file (`None` when nothing was written)
    pub recorded_watermark: Option<String>,
    pub rows_written: usize,
    pub output_path: PathBuf,
    pub duration: Duration,
}

impl SyncOutcome {
    pub fn summary(&self) -> String {
        match self.status {
            SyncStatus::InSync => "No new updates. Spreadsheet not changed.".to_owned(),
            SyncStatus::Stale => format!(
                "Spreadsheet updated from remote sheet: {} rows written to {} in {:.2}s",
                self.rows_written,
                self.output_path.display(),
                self.duration.as_secs_f64()
            ),
        }
    }
}

/// Fetch the remote sheet and refresh the local copy if it changed.
///
/// # Errors
///
/// Returns error if the fetch fails, the state file is unreadable, or the
/// spreadsheet or state cannot be written.
pub fn run_sync(source: &dyn SheetSource, settings: &SyncSettings) -> Result<SyncOutcome> {
    let start = Instant::now();
    tracing::info!("Fetching sheet from {}", source.describe());

    let sheet = source.fetch()?;
    let fetched_at = Utc::now();
    let remote_watermark = latest_watermark(&sheet.headers, &sheet.rows);
    let local_watermark = SyncState::load(&settings.state_path)?.and_then(|s| s.last_updated);

    let status = SyncStatus::compare(remote_watermark.as_deref(), local_watermark.as_deref());
    tracing::debug!(
        remote = ?remote_watermark,
        local = ?local_watermark,
        ?status,
        "Compared watermarks"
    );

    if status == SyncStatus::InSync {
        tracing::info!("No new updates since {}", local_watermark.unwrap_or_default());
        return Ok(SyncOutcome {
            status,
            remote_watermark,
            recorded_watermark: None,
            rows_written: 0,
            output_path: settings.output_path.clone(),
            duration: start.elapsed(),
        });
    }

    if let Some(parent) = settings.output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let rows_written = sheet.rows.len();
    save_table(&sheet.into_table(), &settings.output_path)?;

    let recorded = remote_watermark
        .clone()
        .unwrap_or_else(|| state::iso_timestamp(&fetched_at));
    SyncState::new(recorded.clone(), &Utc::now()).save(&settings.state_path)?;

    tracing::info!(
        rows = rows_written,
        watermark = %recorded,
        "Wrote {}",
        settings.output_path.display()
    );

    Ok(SyncOutcome {
        status,
        remote_watermark,
        recorded_watermark: Some(recorded),
        rows_written,
        output_path: settings.output_path.clone(),
        duration: start.elapsed(),
    })
}
