//! Receipt generation pipeline.
//!
//! Turns recipient records into locked receipt documents with sidecars.
//! For each record, in order:
//!
//! 1. derive the receipt id and integrity hash
//! 2. generate the QR code and barcode
//! 3. render `<out>/<Name>_temp.pdf`
//! 4. lock it into `<out>/<Name>_receipt.pdf` and delete the temp file
//! 5. write the sidecar `<out>/data/<id>.json`
//!
//! A failure at any step aborts the run. Receipts finished before the
//! failure stay on disk.

use crate::config::ReceiptSettings;
use crate::error::{ReceiptError, Result, ResultExt as _};
use crate::integrity::{ReceiptIdentity, SidecarRecord, save_sidecar};
use crate::lock::{LockPolicy, lock_document};
use crate::record::{NAME, RecipientRecord};
use crate::render::{PaymentStatus, RenderInput, VerificationCodes, render_receipt};
use crate::sheet::{load_table, resolve_recipient_source};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Characters replaced in the name part of a file name.
const UNSAFE_FILE_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// One finished receipt.
#[derive(Debug, Clone)]
pub struct GeneratedReceipt {
    pub receipt_id: String,
    pub name: String,
    pub integrity_hash: String,
    pub status: PaymentStatus,
    pub paid_display: String,
    pub document_path: PathBuf,
    pub sidecar_path: PathBuf,
}

/// Result of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub receipts: Vec<GeneratedReceipt>,

    /// Time taken for the whole batch
    pub duration: Duration,
}

impl BatchReport {
    pub fn count(&self, status: PaymentStatus) -> usize {
        self.receipts.iter().filter(|r| r.status == status).count()
    }

    /// Create a summary message
    pub fn summary(&self) -> String {
        format!(
            "Generated {} receipt{} ({} paid, {} due) in {:.2}s",
            self.receipts.len(),
            if self.receipts.len() == 1 { "" } else { "s" },
            self.count(PaymentStatus::Paid),
            self.count(PaymentStatus::Due),
            self.duration.as_secs_f64()
        )
    }
}

/// `name` with path separators and reserved characters replaced by `_`.
pub fn file_stem_for(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if UNSAFE_FILE_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect()
}

/// Generates receipts according to one set of settings.
#[derive(Debug, Clone)]
pub struct ReceiptGenerator {
    settings: ReceiptSettings,
    policy: LockPolicy,
}

impl ReceiptGenerator {
    pub fn new(settings: ReceiptSettings) -> Self {
        let policy = LockPolicy::new(settings.owner_password.clone());
        Self { settings, policy }
    }

    pub fn settings(&self) -> &ReceiptSettings {
        &self.settings
    }

    fn output_paths(&self, name: &str) -> (PathBuf, PathBuf) {
        let stem = file_stem_for(name);
        let dir = &self.settings.output_dir;
        (
            dir.join(format!("{stem}_temp.pdf")),
            dir.join(format!("{stem}_receipt.pdf")),
        )
    }

    /// Generate the receipt of one record.
    ///
    /// # Errors
    ///
    /// Returns error if a required field is missing, a code cannot be
    /// encoded, or any file cannot be read or written.
    pub fn generate(&self, record: &RecipientRecord) -> Result<GeneratedReceipt> {
        let identity = ReceiptIdentity::derive(record, &Local::now())?;
        self.issue(record, identity)
    }

    fn issue(
        &self,
        record: &RecipientRecord,
        identity: ReceiptIdentity,
    ) -> Result<GeneratedReceipt> {
        let name = record.require(NAME)?;
        let codes = VerificationCodes::generate(&self.settings.verify_base_url, &identity.receipt_id)?;

        let output_dir = &self.settings.output_dir;
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
        let (temp_path, final_path) = self.output_paths(&name);

        let rendered = render_receipt(
            &RenderInput {
                record,
                identity: &identity,
                codes: &codes,
                author_name: &self.settings.author_name,
                signature_path: &self.settings.signature_path,
                currency_symbol: &self.settings.currency_symbol,
            },
            &temp_path,
        )?;

        lock_document(&temp_path, &final_path, &self.policy)?;
        std::fs::remove_file(&temp_path)
            .with_context(|| format!("Failed to remove {}", temp_path.display()))?;

        let sidecar_path = save_sidecar(&SidecarRecord::new(&identity, record), output_dir)?;

        tracing::info!(
            receipt_id = %identity.receipt_id,
            status = %rendered.figures.status,
            "Generated {}",
            final_path.display()
        );

        Ok(GeneratedReceipt {
            receipt_id: identity.receipt_id,
            name,
            integrity_hash: identity.integrity_hash,
            status: rendered.figures.status,
            paid_display: rendered.figures.paid_display,
            document_path: final_path,
            sidecar_path,
        })
    }

    /// Generate receipts for `records` one after another.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first failure. A record whose receipt id
    /// was already issued earlier in the batch is a failure, and nothing
    /// is written for it.
    pub fn generate_batch(&self, records: &[RecipientRecord]) -> Result<BatchReport> {
        self.generate_batch_with_clock(records, Local::now)
    }

    fn generate_batch_with_clock<F>(
        &self,
        records: &[RecipientRecord],
        clock: F,
    ) -> Result<BatchReport>
    where
        F: Fn() -> DateTime<Local>,
    {
        let start = Instant::now();
        let mut receipts = Vec::with_capacity(records.len());
        let mut issued = HashSet::with_capacity(records.len());

        for (idx, record) in records.iter().enumerate() {
            let receipt = ReceiptIdentity::derive(record, &clock())
                .and_then(|identity| {
                    if issued.insert(identity.receipt_id.clone()) {
                        self.issue(record, identity)
                    } else {
                        Err(ReceiptError::DuplicateReceiptId(identity.receipt_id))
                    }
                })
                .with_context(|| format!("Receipt {} of {} failed", idx + 1, records.len()))?;
            receipts.push(receipt);
        }

        Ok(BatchReport {
            receipts,
            duration: start.elapsed(),
        })
    }

    /// Load recipients from the synced spreadsheet, or the fallback one.
    ///
    /// # Errors
    ///
    /// Returns error if the chosen spreadsheet cannot be loaded.
    pub fn load_recipients(&self) -> Result<(PathBuf, Vec<RecipientRecord>)> {
        let source = resolve_recipient_source(
            &self.settings.primary_input,
            &self.settings.fallback_input,
        );
        let records = load_table(&source)?.records();
        Ok((source, records))
    }
}
