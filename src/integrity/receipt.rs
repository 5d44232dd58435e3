//! Sidecar data structures and persistence.
//!
//! A sidecar is the JSON twin of a rendered receipt. The verification page
//! fetches it by receipt id, recomputes the hash of `data` and compares it
//! with `hash`.

use crate::error::{Result, ResultExt as _};
use crate::integrity::hasher::{ReceiptIdentity, check_receipt_id};
use crate::record::RecipientRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Subdirectory of the output directory holding sidecars.
pub const SIDECAR_DIR: &str = "data";

/// Sidecar written next to every receipt. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarRecord {
    /// Receipt id, also the file stem
    pub id: String,

    /// The record exactly as it was hashed
    pub data: RecipientRecord,

    /// SHA-256 of the canonical JSON of `data`
    pub hash: String,

    /// Generation time
    pub timestamp: DateTime<Utc>,
}

impl SidecarRecord {
    pub fn new(identity: &ReceiptIdentity, record: &RecipientRecord) -> Self {
        Self {
            id: identity.receipt_id.clone(),
            data: record.clone(),
            hash: identity.integrity_hash.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Location of the sidecar for `receipt_id` under `output_dir`.
///
/// # Errors
///
/// Returns `InvalidPath` if the id would leave the sidecar directory.
pub fn sidecar_path(output_dir: &Path, receipt_id: &str) -> Result<PathBuf> {
    check_receipt_id(receipt_id)?;
    Ok(output_dir.join(SIDECAR_DIR).join(format!("{receipt_id}.json")))
}

/// Save a sidecar, replacing any previous one with the same id.
///
/// # Returns
///
/// Path to the saved sidecar file.
///
/// # Errors
///
/// Returns error if the id is not a plain file name, or the directory or
/// file cannot be written.
pub fn save_sidecar(sidecar: &SidecarRecord, output_dir: &Path) -> Result<PathBuf> {
    let path = sidecar_path(output_dir, &sidecar.id)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create sidecar directory {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(sidecar).context("Failed to serialize sidecar")?;

    fs::write(&path, json)
        .with_context(|| format!("Failed to write sidecar to {}", path.display()))?;

    tracing::debug!(receipt_id = %sidecar.id, "Sidecar written to {}", path.display());
    Ok(path)
}

/// Load a sidecar from disk.
///
/// # Errors
///
/// Returns error if the file cannot be read or is not a valid sidecar.
pub fn load_sidecar(path: &Path) -> Result<SidecarRecord> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sidecar {}", path.display()))?;

    serde_json::from_str(&json).context("Failed to parse sidecar JSON (file may be corrupted)")
}
