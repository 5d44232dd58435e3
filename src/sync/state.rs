//! Persisted watermark of the last successful sync.

use crate::error::{Result, ResultExt as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Contents of the sync state file.
///
/// ```json
/// {
///   "last_updated": "2024-01-01T09:00:00",
///   "synced_at": "2024-01-01T09:05:12.345678"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub synced_at: Option<String>,
}

/// Naive UTC ISO timestamp with microseconds.
pub fn iso_timestamp(at: &DateTime<Utc>) -> String {
    at.naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

impl SyncState {
    pub fn new(last_updated: impl Into<String>, synced_at: &DateTime<Utc>) -> Self {
        Self {
            last_updated: Some(last_updated.into()),
            synced_at: Some(iso_timestamp(synced_at)),
        }
    }

    /// Load the state file; `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sync state {}", path.display()))?;
        let state = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse sync state {}", path.display()))?;
        Ok(Some(state))
    }

    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize sync state")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write sync state {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;
    use tempfile::TempDir;

    #[test]
    fn test_missing_state_is_none() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(SyncState::load(&temp_dir.path().join("last_sync.json")).unwrap(), None);
    }

    #[test]
    fn test_state_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("last_sync.json");
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 5, 12).unwrap();

        let state = SyncState::new("2024-01-01T09:00:00", &at);
        state.save(&path).unwrap();

        let loaded = SyncState::load(&path).unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.synced_at.as_deref(), Some("2024-01-01T09:05:12.000000"));
    }

    #[test]
    fn test_reads_state_without_synced_at() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("last_sync.json");
        fs::write(&path, r#"{"last_updated": "2024-02-02"}"#).unwrap();

        let loaded = SyncState::load(&path).unwrap().unwrap();
        assert_eq!(loaded.last_updated.as_deref(), Some("2024-02-02"));
        assert_eq!(loaded.synced_at, None);
    }

    #[test]
    fn test_corrupt_state_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("last_sync.json");
        fs::write(&path, "not json").unwrap();

        assert!(SyncState::load(&path).is_err());
    }
}
