//! Centralized error handling for the receipt and sync pipelines.
//!
//! Every failure in this crate is fatal to the invoking command: nothing is
//! retried and no partial artifacts are cleaned up. The error type exists so
//! callers can tell *what kind* of thing went wrong when they report it.
//!
//! ## Context Extension Trait
//!
//! The `ResultExt` trait adds `.context()` to any `Result` whose error
//! converts into [`ReceiptError`]:
//!
//! ```no_run
//! use payment_receipts::error::ResultExt as _;
//! use std::fs;
//!
//! fn load_signature() -> payment_receipts::error::Result<Vec<u8>> {
//!     let bytes = fs::read("signature.png").context("Failed to read signature image")?;
//!     Ok(bytes)
//! }
//! ```

use thiserror::Error;

/// Main error type for receipt generation and sync operations.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// I/O errors (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document rendering or rewriting errors
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Image decoding/encoding errors (signature, code images)
    #[error("Image error: {0}")]
    Image(String),

    /// QR code encoding errors
    #[error("QR code error: {0}")]
    QrCode(String),

    /// Barcode encoding errors, usually unsupported characters in the payload
    #[error("Barcode error: {0}")]
    Barcode(String),

    /// Spreadsheet read/write errors
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// Network or HTTP status errors during sync
    #[error("HTTP error: {0}")]
    Http(String),

    /// A recipient record lacks a field the receipt needs
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Two records of one batch resolved to the same receipt id
    #[error("Receipt id {0} was already issued earlier in this batch")]
    DuplicateReceiptId(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid or conflicting path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for ReceiptError {
    fn from(err: lopdf::Error) -> Self {
        Self::Pdf(err.to_string())
    }
}

impl From<image::ImageError> for ReceiptError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

impl From<qrcode::types::QrError> for ReceiptError {
    fn from(err: qrcode::types::QrError) -> Self {
        Self::QrCode(err.to_string())
    }
}

impl From<calamine::Error> for ReceiptError {
    fn from(err: calamine::Error) -> Self {
        Self::Spreadsheet(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for ReceiptError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Spreadsheet(err.to_string())
    }
}

impl From<csv::Error> for ReceiptError {
    fn from(err: csv::Error) -> Self {
        Self::Spreadsheet(err.to_string())
    }
}

impl From<reqwest::Error> for ReceiptError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Result type alias for receipt operations.
pub type Result<T> = std::result::Result<T, ReceiptError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ReceiptError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: ReceiptError = e.into();
            ReceiptError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: ReceiptError = e.into();
            ReceiptError::Other(format!("{}: {}", f(), err))
        })
    }
}
