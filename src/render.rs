//! Receipt rendering: amounts, verification codes and page layout.
//!
//! ## Architecture
//!
//! - [`amount`]: currency parsing, paid amount and status
//! - [`codes`]: QR code and Code 128 barcode rasterization
//! - [`metrics`]: Helvetica glyph widths for alignment
//! - [`document`]: the single-page A4 layout
//!
//! Rendering produces an *unlocked* document. Locking is a separate step,
//! see [`crate::lock`].

pub mod amount;
pub mod codes;
pub mod document;
pub mod metrics;

pub use amount::{PaymentStatus, ReceiptFigures, parse_currency};
pub use codes::VerificationCodes;
pub use document::{RenderInput, RenderedReceipt, render_receipt};
