//! Sidecar verification logic.
//!
//! Recomputes the hash of a sidecar's record and compares it with the hash
//! stored at issuance, the same check the verification page performs.

use crate::error::Result;
use crate::integrity::hasher::{HASH_ALGORITHM, compute_record_hash};
use crate::integrity::receipt::{SidecarRecord, load_sidecar, sidecar_path};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Result of a sidecar verification.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    /// Whether the stored record still matches its hash
    pub passed: bool,

    /// Human-readable message describing the result
    pub message: String,

    /// Receipt id that was checked
    pub receipt_id: String,

    /// Hash recorded at issuance (if the sidecar was found)
    pub expected_hash: Option<String>,

    /// Hash recomputed from the stored record (if the sidecar was found)
    pub actual_hash: Option<String>,

    /// Issuance time (if the sidecar was found)
    pub timestamp: Option<DateTime<Utc>>,
}

impl VerificationResult {
    fn not_found(receipt_id: &str, path: &Path) -> Self {
        Self {
            passed: false,
            message: format!("Receipt not found: {}", path.display()),
            receipt_id: receipt_id.to_owned(),
            expected_hash: None,
            actual_hash: None,
            timestamp: None,
        }
    }

    fn compare(sidecar: SidecarRecord, actual: String) -> Self {
        let passed = actual == sidecar.hash;
        let message = if passed {
            "Receipt verified, record matches its hash".to_owned()
        } else {
            "Hash mismatch detected, the receipt data has been altered".to_owned()
        };

        Self {
            passed,
            message,
            receipt_id: sidecar.id,
            expected_hash: Some(sidecar.hash),
            actual_hash: Some(actual),
            timestamp: Some(sidecar.timestamp),
        }
    }

    /// Format verification result for CLI display.
    pub fn format_cli(&self) -> String {
        if self.passed {
            let hash = self.actual_hash.as_deref().unwrap_or_default();
            let short: String = hash.chars().take(16).collect();
            let issued = self
                .timestamp
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default();
            format!(
                "✓ PASS: {}\n  \
                Receipt: {}\n  \
                Hash: {short}... ({HASH_ALGORITHM})\n  \
                Issued: {issued}",
                self.message, self.receipt_id
            )
        } else {
            let mut output = format!("✗ FAIL: {}\n  Receipt: {}", self.message, self.receipt_id);
            if let Some(expected) = &self.expected_hash {
                output.push_str(&format!("\n  Expected: {expected}"));
            }
            if let Some(actual) = &self.actual_hash {
                output.push_str(&format!("\n  Actual:   {actual}"));
            }
            output
        }
    }
}

/// Verify a sidecar file.
///
/// # Errors
///
/// Returns error if the sidecar cannot be read or parsed, or its record
/// cannot be serialized. A missing file is a failed verification, not an
/// error.
pub fn verify_sidecar(path: &Path) -> Result<VerificationResult> {
    let fallback_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");

    if !path.exists() {
        return Ok(VerificationResult::not_found(fallback_id, path));
    }

    let sidecar = load_sidecar(path)?;
    let actual = compute_record_hash(&sidecar.data)?;
    let result = VerificationResult::compare(sidecar, actual);

    if result.passed {
        tracing::info!(receipt_id = %result.receipt_id, "Receipt verified");
    } else {
        tracing::warn!(receipt_id = %result.receipt_id, "Receipt hash mismatch");
    }
    Ok(result)
}

/// Verify the sidecar of `receipt_id` under `output_dir`.
///
/// # Errors
///
/// Returns `InvalidPath` for an id that is not a plain file name, otherwise
/// see [`verify_sidecar`].
pub fn verify_receipt_id(output_dir: &Path, receipt_id: &str) -> Result<VerificationResult> {
    verify_sidecar(&sidecar_path(output_dir, receipt_id)?)
}
