//! # Payment Receipts
//!
//! Issues tamper-evident PDF payment receipts and keeps a local copy of the
//! remote recipient sheet up to date.
//!
//! ## Quick Start
//!
//! ```no_run
//! use payment_receipts::config::AppConfig;
//! use payment_receipts::pipeline::ReceiptGenerator;
//! use payment_receipts::record::{RecipientArgs, RecipientRecord};
//! use std::path::Path;
//!
//! # fn example() -> payment_receipts::error::Result<()> {
//! let config = AppConfig::load(Path::new("receipts.json"))?;
//! let generator = ReceiptGenerator::new(config.receipts);
//!
//! let record = RecipientRecord::from_args(RecipientArgs {
//!     name: "Alice".to_owned(),
//!     amount: "5000".to_owned(),
//!     due: None,
//!     date: "2024-01-01".to_owned(),
//!     description: "Rent".to_owned(),
//!     receipt_no: Some("R001".to_owned()),
//! });
//! let receipt = generator.generate(&record)?;
//! println!("{} -> {}", receipt.receipt_id, receipt.document_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`record`]: recipient records as sorted field maps
//! - [`integrity`]: record hashing, sidecars and verification
//! - [`render`]: amounts, verification codes and the page layout
//! - [`lock`]: permission restrictions on the finished document
//! - [`pipeline`]: the per-record receipt pipeline and batch runs
//! - [`sheet`]: spreadsheet input and output
//! - [`sync`]: remote sheet mirroring with a watermark
//! - [`config`], [`error`], [`logging`]: shared plumbing
//!
//! ## Output Layout
//!
//! ```text
//! receipts/
//! ├── Alice_receipt.pdf      locked receipt
//! └── data/
//!     └── R001.json          sidecar: record, hash, issuance time
//! ```
//!
//! The sidecar is what makes a receipt verifiable: its hash is recomputed
//! from its record and compared, see [`integrity::verify_sidecar`].

pub mod config;
pub mod error;
pub mod integrity;
pub mod lock;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod sheet;
pub mod sync;
