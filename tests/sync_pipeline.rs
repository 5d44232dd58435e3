//! Integration tests for the sync pipeline
//!
//! The remote sheet is replaced by an in-memory source whose contents can
//! change between runs.

use payment_receipts::config::SyncSettings;
use payment_receipts::error::Result;
use payment_receipts::sheet::load_table;
use payment_receipts::sync::{RemoteSheet, SheetSource, SyncState, SyncStatus, run_sync};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Serves whatever sheet was last published and counts fetches.
#[derive(Default)]
struct MemorySource {
    sheet: RefCell<RemoteSheet>,
    fetches: RefCell<usize>,
}

impl MemorySource {
    fn publish(&self, rows: Vec<Vec<Value>>) {
        *self.sheet.borrow_mut() = RemoteSheet {
            headers: ["Name", "Amount", "Last Updated"].map(str::to_owned).to_vec(),
            rows,
        };
    }
}

impl SheetSource for MemorySource {
    fn describe(&self) -> String {
        "memory".to_owned()
    }

    fn fetch(&self) -> Result<RemoteSheet> {
        *self.fetches.borrow_mut() += 1;
        Ok(self.sheet.borrow().clone())
    }
}

fn settings(dir: &Path) -> SyncSettings {
    SyncSettings {
        output_path: dir.join("recipients_data.xlsx"),
        state_path: dir.join("last_sync.json"),
        ..SyncSettings::default()
    }
}

#[test]
fn test_unchanged_sheet_leaves_file_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(temp_dir.path());
    let source = MemorySource::default();
    source.publish(vec![vec![json!("Alice"), json!(5000), json!("2024-01-01T09:00:00")]]);

    let first = run_sync(&source, &settings).unwrap();
    assert_eq!(first.status, SyncStatus::Stale);
    let before = fs::read(&settings.output_path).unwrap();
    let state_before = fs::read(&settings.state_path).unwrap();

    let second = run_sync(&source, &settings).unwrap();
    assert_eq!(second.status, SyncStatus::InSync);
    assert_eq!(second.rows_written, 0);
    assert_eq!(fs::read(&settings.output_path).unwrap(), before);
    assert_eq!(fs::read(&settings.state_path).unwrap(), state_before);
    assert_eq!(*source.fetches.borrow(), 2);
}

#[test]
fn test_newer_watermark_replaces_file() {
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(temp_dir.path());
    let source = MemorySource::default();
    source.publish(vec![vec![json!("Alice"), json!(5000), json!("2024-01-01T09:00:00")]]);
    run_sync(&source, &settings).unwrap();

    source.publish(vec![
        vec![json!("Alice"), json!(5000), json!("2024-01-01T09:00:00")],
        vec![json!("Bob"), json!(1200), json!("2024-01-02T10:30:00")],
    ]);
    let outcome = run_sync(&source, &settings).unwrap();

    assert_eq!(outcome.status, SyncStatus::Stale);
    assert_eq!(outcome.rows_written, 2);
    assert_eq!(outcome.remote_watermark.as_deref(), Some("2024-01-02T10:30:00"));

    let table = load_table(&settings.output_path).unwrap();
    assert_eq!(table.headers, ["Name", "Amount", "Last Updated"]);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[1][0], json!("Bob"));
    assert_eq!(table.rows[1][1], json!(1200));

    let state = SyncState::load(&settings.state_path).unwrap().unwrap();
    assert_eq!(state.last_updated.as_deref(), Some("2024-01-02T10:30:00"));
    assert!(state.synced_at.is_some());
}

#[test]
fn test_existing_state_matching_remote_skips_first_run() {
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(temp_dir.path());
    fs::write(
        &settings.state_path,
        r#"{"last_updated": "2024-01-01T09:00:00", "synced_at": "2024-01-01T09:05:00"}"#,
    )
    .unwrap();
    let source = MemorySource::default();
    source.publish(vec![vec![json!("Alice"), json!(5000), json!("2024-01-01T09:00:00")]]);

    let outcome = run_sync(&source, &settings).unwrap();

    assert_eq!(outcome.status, SyncStatus::InSync);
    assert!(!settings.output_path.exists());
}
