//! Amount normalization and payment status.
//!
//! Amounts arrive as free-form text ("5000", "¥1,234.50", "") and are only
//! interpreted here, at render time. The record itself is never rewritten.

use crate::record::{AMOUNT, DUE_AMOUNT, RecipientRecord};
use std::fmt;

/// Glyphs stripped before parsing an amount.
pub const CURRENCY_GLYPHS: [char; 5] = ['¥', '￥', '$', '€', '£'];

/// Parse a currency amount, treating anything unparsable as zero.
pub fn parse_currency(value: Option<&str>) -> f64 {
    let Some(value) = value else {
        return 0.0;
    };

    let cleaned: String = value
        .chars()
        .filter(|c| !CURRENCY_GLYPHS.contains(c) && *c != ',')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return 0.0;
    }

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Due,
}

impl PaymentStatus {
    pub fn from_due(due: f64) -> Self {
        if due <= 0.0 { Self::Paid } else { Self::Due }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Paid => "PAID",
            Self::Due => "DUE",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Amount actually received, never negative.
pub fn paid_amount(amount: f64, due: f64) -> f64 {
    (amount - due).max(0.0)
}

/// `¥5000` for whole amounts, `¥1,234.50` otherwise.
pub fn format_paid(paid: f64, symbol: &str) -> String {
    if paid.fract() == 0.0 {
        format!("{symbol}{paid:.0}")
    } else {
        format!("{symbol}{}", group_thousands(&format!("{paid:.2}")))
    }
}

/// Insert `,` every three digits of the integer part of a formatted number.
fn group_thousands(formatted: &str) -> String {
    let (int_part, rest) = match formatted.find('.') {
        Some(idx) => formatted.split_at(idx),
        None => (formatted, ""),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(d) => ("-", d),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}{rest}")
}

/// Prefix `symbol` unless the text already starts with it.
pub fn with_symbol(text: &str, symbol: &str) -> String {
    if text.starts_with(symbol) {
        text.to_owned()
    } else {
        format!("{symbol}{text}")
    }
}

/// Everything the amount section of a receipt prints.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptFigures {
    pub amount_text: String,
    pub due_text: String,
    pub amount: f64,
    pub due: f64,
    pub paid: f64,
    pub status: PaymentStatus,
    pub paid_display: String,
}

impl ReceiptFigures {
    pub fn from_record(record: &RecipientRecord, symbol: &str) -> Self {
        let amount_text = with_symbol(&record.text(AMOUNT), symbol);
        let due_raw = record.text(DUE_AMOUNT);
        let due_text = if due_raw.is_empty() {
            due_raw
        } else {
            with_symbol(&due_raw, symbol)
        };

        let amount = parse_currency(Some(&amount_text));
        let due = parse_currency(Some(&due_text));
        let paid = paid_amount(amount, due);

        Self {
            paid_display: format_paid(paid, symbol),
            status: PaymentStatus::from_due(due),
            amount_text,
            due_text,
            amount,
            due,
            paid,
        }
    }
}
