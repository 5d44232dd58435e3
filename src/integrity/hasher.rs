//! Record hashing and receipt identity derivation.
//!
//! The integrity hash is a SHA-256 digest over a canonical JSON rendering of
//! the recipient record. Canonical means: keys sorted by code point, `", "`
//! between items, `": "` between key and value, and every non-ASCII
//! character escaped as `\uXXXX`. This is the format the verification
//! portal recomputes for receipts already in circulation, so it must not
//! drift.

use crate::error::{ReceiptError, Result, ResultExt as _};
use crate::record::RecipientRecord;
use chrono::{DateTime, TimeZone};
use serde::Serialize as _;
use serde_json::ser::Formatter;
use sha2::{Digest as _, Sha256};
use std::fmt::Display;
use std::io;

/// Hash algorithm identifier used in sidecars and messages.
pub const HASH_ALGORITHM: &str = "SHA-256";

/// JSON formatter producing the canonical spacing and ASCII-only output.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }

        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                let mut buf = [0u8; 1];
                writer.write_all(ch.encode_utf8(&mut buf).as_bytes())?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Canonical JSON of a record, the exact bytes the integrity hash covers.
///
/// # Errors
///
/// Returns error if a field value cannot be serialized.
pub fn canonical_json(record: &RecipientRecord) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter);
    record
        .serialize(&mut serializer)
        .context("Failed to serialize recipient record")?;

    String::from_utf8(buf).map_err(|e| ReceiptError::Other(e.to_string()))
}

/// SHA-256 of the canonical JSON as a lowercase hex string (64 characters).
///
/// # Errors
///
/// Returns error if the record cannot be serialized.
pub fn compute_record_hash(record: &RecipientRecord) -> Result<String> {
    let canonical = canonical_json(record)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(format!("{digest:x}"))
}

/// Clock-derived receipt id, `R` followed by `YYYYMMDDhhmmss`.
pub fn timestamp_receipt_id<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("R{}", now.format("%Y%m%d%H%M%S"))
}

/// Check that `receipt_id` can name a sidecar file on its own.
///
/// # Errors
///
/// Returns `InvalidPath` if the id is empty, contains a path separator,
/// `..` or a control character.
pub fn check_receipt_id(receipt_id: &str) -> Result<()> {
    let bad_char = receipt_id
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control());
    if receipt_id.trim().is_empty() || bad_char || receipt_id.contains("..") {
        return Err(ReceiptError::InvalidPath(format!(
            "Receipt id {receipt_id:?} cannot be used as a file name"
        )));
    }
    Ok(())
}

/// The externally visible id of a receipt and the hash binding it to its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptIdentity {
    pub receipt_id: String,
    pub integrity_hash: String,
}

impl ReceiptIdentity {
    /// Derive the identity of a record, using `now` when the record carries
    /// no explicit receipt number.
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be serialized or its receipt
    /// number cannot be used as a file name.
    pub fn derive<Tz>(record: &RecipientRecord, now: &DateTime<Tz>) -> Result<Self>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let receipt_id = record
            .explicit_receipt_no()
            .unwrap_or_else(|| timestamp_receipt_id(now));
        check_receipt_id(&receipt_id)?;
        let integrity_hash = compute_record_hash(record)?;

        Ok(Self {
            receipt_id,
            integrity_hash,
        })
    }

    /// Leading part of the hash printed on the document.
    pub fn hash_fragment(&self) -> String {
        let prefix: String = self.integrity_hash.chars().take(32).collect();
        format!("{prefix}...")
    }
}
