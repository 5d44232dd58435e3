//! Recipient records.
//!
//! A record is the set of named fields describing one payment, read once
//! from the command line or from a spreadsheet row. Fields are kept in a
//! sorted map so every serialization of a record lists them in the same
//! order, which the integrity hash depends on.

use crate::error::{ReceiptError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const NAME: &str = "Name";
pub const AMOUNT: &str = "Amount";
pub const DUE_AMOUNT: &str = "Due Amount";
pub const DATE: &str = "Date";
pub const DESCRIPTION: &str = "Description";
pub const RECEIPT_NO: &str = "Receipt No";

/// Placeholder receipt number meaning "derive one from the clock".
pub const AUTO_RECEIPT_NO: &str = "AUTO";

/// Recipient fields supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct RecipientArgs {
    pub name: String,
    pub amount: String,
    pub due: Option<String>,
    pub date: String,
    pub description: String,
    pub receipt_no: Option<String>,
}

/// One recipient, as a mapping of field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientRecord {
    fields: BTreeMap<String, Value>,
}

impl RecipientRecord {
    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn from_args(args: RecipientArgs) -> Self {
        Self::from_fields([
            (NAME, Value::String(args.name)),
            (AMOUNT, Value::String(args.amount)),
            (DUE_AMOUNT, Value::String(args.due.unwrap_or_default())),
            (DATE, Value::String(args.date)),
            (DESCRIPTION, Value::String(args.description)),
            (
                RECEIPT_NO,
                Value::String(
                    args.receipt_no
                        .unwrap_or_else(|| AUTO_RECEIPT_NO.to_owned()),
                ),
            ),
        ])
    }

    /// Build a record from one spreadsheet row. Missing trailing cells
    /// become `null`; surplus cells without a header are dropped.
    pub fn from_row(headers: &[String], cells: &[Value]) -> Self {
        Self::from_fields(
            headers
                .iter()
                .enumerate()
                .map(|(idx, header)| (header.clone(), cells.get(idx).cloned().unwrap_or(Value::Null))),
        )
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Display form of a field; absent and `null` fields are empty.
    pub fn text(&self, field: &str) -> String {
        self.get(field).map(display_value).unwrap_or_default()
    }

    /// Display form of a field the receipt cannot do without. An empty
    /// cell is allowed and displays as an empty string.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` when the record has no such column.
    pub fn require(&self, field: &str) -> Result<String> {
        self.get(field)
            .map(display_value)
            .ok_or_else(|| ReceiptError::MissingField(field.to_owned()))
    }

    /// The receipt number given by the source, unless empty or `AUTO`.
    pub fn explicit_receipt_no(&self) -> Option<String> {
        let text = self.text(RECEIPT_NO);
        let trimmed = text.trim();
        (!trimmed.is_empty() && trimmed != AUTO_RECEIPT_NO).then(|| trimmed.to_owned())
    }
}

/// Render a cell value the way it is printed on a receipt.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{f:.0}")
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
