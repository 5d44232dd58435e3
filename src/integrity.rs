//! Receipt integrity: hashing, sidecars and verification.
//!
//! Every receipt is bound to the record it was generated from by a SHA-256
//! digest of that record. The digest is printed (truncated) on the document
//! and stored in full, with the record, in a JSON sidecar. Anyone holding
//! the sidecar can recompute the digest and detect later edits.
//!
//! ## Usage
//!
//! ```no_run
//! use payment_receipts::integrity;
//! use payment_receipts::record::RecipientRecord;
//! use std::path::Path;
//!
//! # fn example(record: RecipientRecord) -> payment_receipts::error::Result<()> {
//! let identity = integrity::ReceiptIdentity::derive(&record, &chrono::Local::now())?;
//! let sidecar = integrity::SidecarRecord::new(&identity, &record);
//! integrity::save_sidecar(&sidecar, Path::new("receipts"))?;
//!
//! let result = integrity::verify_receipt_id(Path::new("receipts"), &identity.receipt_id)?;
//! assert!(result.passed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Sidecar Format
//!
//! ```json
//! {
//!   "id": "R001",
//!   "data": { "Amount": "5000", "Name": "Alice", "...": "..." },
//!   "hash": "3f1c...",
//!   "timestamp": "2024-01-01T09:30:00.123456Z"
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`hasher`]: canonical JSON, digest and receipt id derivation
//! - [`receipt`]: sidecar structure and persistence
//! - [`verifier`]: recomputation and diagnostics

pub mod hasher;
pub mod receipt;
pub mod verifier;

pub use hasher::{ReceiptIdentity, canonical_json, check_receipt_id, compute_record_hash, timestamp_receipt_id};
pub use receipt::{SidecarRecord, load_sidecar, save_sidecar, sidecar_path};
pub use verifier::{VerificationResult, verify_receipt_id, verify_sidecar};
