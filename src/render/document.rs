//! Single-page receipt layout.
//!
//! The layout is fixed: every receipt places the same blocks at the same
//! coordinates on an A4 page, measured in millimetres from the top edge.

use super::amount::ReceiptFigures;
use super::codes::VerificationCodes;
use super::metrics::{Face, text_width_mm};
use crate::error::{ReceiptError, Result, ResultExt as _};
use crate::integrity::ReceiptIdentity;
use crate::record::{AMOUNT, DATE, DESCRIPTION, NAME, RecipientRecord};
use image::{DynamicImage, GenericImageView as _, Rgb as RgbPixel, RgbImage};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm,
    PdfDocument, PdfLayerReference, Point, Pt, Rect, Rgb, TextMatrix, path::PaintMode,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 24.0;
const VALUE_COLUMN: f32 = 55.0;
const IMAGE_DPI: f32 = 300.0;

const WATERMARK: &str = "VERIFY ONLINE";
const FOOTER: &str = "Verify this receipt online. This document is valid without a stamp.";

/// Everything a receipt page is composed from.
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub record: &'a RecipientRecord,
    pub identity: &'a ReceiptIdentity,
    pub codes: &'a VerificationCodes,
    pub author_name: &'a str,
    pub signature_path: &'a Path,
    pub currency_symbol: &'a str,
}

/// What was printed on a rendered page.
#[derive(Debug, Clone)]
pub struct RenderedReceipt {
    pub path: PathBuf,
    pub receipt_id: String,
    pub figures: ReceiptFigures,
    pub hash_fragment: String,
}

/// Distance `offset` millimetres below the top edge, as a PDF y coordinate.
fn from_top(offset: f32) -> f32 {
    PAGE_HEIGHT - offset
}

fn gray(level: f32) -> Color {
    Color::Rgb(Rgb::new(level, level, level, None))
}

/// Drawing helpers over the single layer of the page.
struct Page {
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    oblique: IndirectFontRef,
}

impl Page {
    fn font(&self, face: Face) -> &IndirectFontRef {
        match face {
            Face::Regular => &self.regular,
            Face::Bold => &self.bold,
            Face::Oblique => &self.oblique,
        }
    }

    fn text(&self, text: &str, face: Face, size: f32, x: f32, y: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(y), self.font(face));
    }

    fn text_right(&self, text: &str, face: Face, size: f32, right: f32, y: f32) {
        let width = text_width_mm(text, face, size);
        self.text(text, face, size, right - width, y);
    }

    fn text_centered(&self, text: &str, face: Face, size: f32, center: f32, y: f32) {
        let width = text_width_mm(text, face, size);
        self.text(text, face, size, center - width / 2.0, y);
    }

    /// Text rotated counter-clockwise by `degrees` around its own centre.
    fn text_rotated(&self, text: &str, face: Face, size: f32, center: (f32, f32), degrees: f32) {
        let half = text_width_mm(text, face, size) / 2.0;
        let (sin, cos) = degrees.to_radians().sin_cos();
        let x = center.0 - half * cos;
        let y = center.1 - half * sin;

        let font = self.font(face);
        self.layer.begin_text_section();
        self.layer.set_font(font, size);
        self.layer
            .set_text_matrix(TextMatrix::TranslateRotate(Pt::from(Mm(x)), Pt::from(Mm(y)), degrees));
        self.layer.write_text(text, font);
        self.layer.end_text_section();
    }

    fn stroke_style(&self, color: Color, thickness_pt: f32) {
        self.layer.set_outline_color(color);
        self.layer.set_outline_thickness(thickness_pt);
    }

    fn fill(&self, color: Color) {
        self.layer.set_fill_color(color);
    }

    fn line(&self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(x1), Mm(y1)), false),
                (Point::new(Mm(x2), Mm(y2)), false),
            ],
            is_closed: false,
        });
    }

    fn rect(&self, x: f32, y: f32, width: f32, height: f32, mode: PaintMode) {
        self.layer
            .add_rect(Rect::new(Mm(x), Mm(y), Mm(x + width), Mm(y + height)).with_mode(mode));
    }

    /// Place `img` with its lower-left corner at (x, y), scaled to width x height mm.
    fn image(&self, img: &DynamicImage, x: f32, y: f32, width: f32, height: f32) {
        let (px_w, px_h) = img.dimensions();
        let natural = |px: u32| px as f32 * 25.4 / IMAGE_DPI;

        Image::from_dynamic_image(img).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(x)),
                translate_y: Some(Mm(y)),
                scale_x: Some(width / natural(px_w.max(1))),
                scale_y: Some(height / natural(px_h.max(1))),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
    }

    fn label_value(&self, label: &str, value: &str, offset: f32) {
        self.text(label, Face::Bold, 10.0, MARGIN, from_top(offset));
        self.text(value, Face::Regular, 10.0, VALUE_COLUMN, from_top(offset));
    }
}

/// Composite an image with transparency onto white paper.
fn flatten_on_white(img: &DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let mut flat = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        flat.put_pixel(x, y, RgbPixel([blend(r), blend(g), blend(b)]));
    }
    DynamicImage::ImageRgb8(flat)
}

/// Read and decode the signature image.
///
/// # Errors
///
/// Returns error if the file is unreadable or not a supported image.
pub fn load_signature(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read signature image {}", path.display()))?;
    let img = image::load_from_memory(&bytes)
        .with_context(|| format!("Failed to decode signature image {}", path.display()))?;
    Ok(flatten_on_white(&img))
}

/// Render one receipt page to `output`.
///
/// # Errors
///
/// Returns error if a required record field is missing, the signature image
/// cannot be loaded, or the document cannot be written.
pub fn render_receipt(input: &RenderInput<'_>, output: &Path) -> Result<RenderedReceipt> {
    let record = input.record;
    let name = record.require(NAME)?;
    let date = record.require(DATE)?;
    let description = record.require(DESCRIPTION)?;
    record.require(AMOUNT)?;

    let signature = load_signature(input.signature_path)?;
    let figures = ReceiptFigures::from_record(record, input.currency_symbol);
    let hash_fragment = input.identity.hash_fragment();
    let receipt_id = &input.identity.receipt_id;

    let (doc, page_idx, layer_idx) = PdfDocument::new(
        format!("Payment Receipt {receipt_id}"),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Receipt",
    );
    let builtin = |font| {
        doc.add_builtin_font(font)
            .map_err(|e| ReceiptError::Pdf(e.to_string()))
    };
    let page = Page {
        layer: doc.get_page(page_idx).get_layer(layer_idx),
        regular: builtin(BuiltinFont::Helvetica)?,
        bold: builtin(BuiltinFont::HelveticaBold)?,
        oblique: builtin(BuiltinFont::HelveticaOblique)?,
    };
    let right = PAGE_WIDTH - MARGIN;

    // Border
    page.stroke_style(gray(0.75), 0.8);
    page.rect(18.0, 18.0, PAGE_WIDTH - 36.0, PAGE_HEIGHT - 36.0, PaintMode::Stroke);

    // Header
    page.text("Payment Receipt", Face::Bold, 22.0, MARGIN, from_top(35.0));
    page.text_right("Original", Face::Regular, 9.0, right, from_top(32.0));
    page.stroke_style(gray(0.0), 1.0);
    page.line(MARGIN, from_top(40.0), right, from_top(40.0));

    // Receipt meta and parties
    page.label_value("Receipt No", receipt_id, 52.0);
    page.text("Date", Face::Bold, 10.0, 120.0, from_top(52.0));
    page.text(&date, Face::Regular, 10.0, 135.0, from_top(52.0));
    page.label_value("Issued By", input.author_name, 68.0);
    page.label_value("Received From", &name, 82.0);

    page.stroke_style(gray(0.85), 0.8);
    page.line(MARGIN, from_top(92.0), right, from_top(92.0));

    // Amounts
    page.label_value("Description", &description, 105.0);
    page.label_value("Amount", &figures.amount_text, 120.0);
    page.label_value("Due Amount", &figures.due_text, 135.0);
    page.label_value("Payment Status", figures.status.label(), 150.0);

    // Total band
    page.fill(Color::Rgb(Rgb::new(0.95, 0.95, 0.98, None)));
    page.rect(MARGIN, from_top(170.0), PAGE_WIDTH - 2.0 * MARGIN, 12.0, PaintMode::Fill);
    page.fill(gray(0.0));
    page.text("Total Paid", Face::Bold, 11.0, MARGIN + 2.0, from_top(162.0));
    page.text_right(&figures.paid_display, Face::Bold, 11.0, right - 2.0, from_top(162.0));

    // Signature and verification codes
    page.text("Authorized Signature", Face::Bold, 9.0, MARGIN, from_top(190.0));
    page.image(&signature, MARGIN, from_top(212.0), 45.0, 16.0);

    page.text_right("Scan to Verify", Face::Bold, 9.0, right, from_top(190.0));
    page.image(&DynamicImage::ImageLuma8(input.codes.qr.clone()), PAGE_WIDTH - 50.0, from_top(215.0), 22.0, 22.0);
    page.image(
        &DynamicImage::ImageLuma8(input.codes.barcode.clone()),
        PAGE_WIDTH - 80.0,
        from_top(215.0),
        26.0,
        18.0,
    );

    // Watermark
    page.layer.save_graphics_state();
    page.fill(gray(0.88));
    page.text_rotated(
        WATERMARK,
        Face::Bold,
        28.0,
        (PAGE_WIDTH / 2.0, PAGE_HEIGHT / 2.0),
        30.0,
    );
    page.layer.restore_graphics_state();

    // Hash fragment
    page.fill(gray(0.4));
    page.text(
        &format!("Verification Hash: {hash_fragment}"),
        Face::Regular,
        7.0,
        MARGIN,
        34.0,
    );
    page.fill(gray(0.0));

    // Footer
    page.stroke_style(gray(0.85), 0.8);
    page.line(MARGIN, 28.0, right, 28.0);
    page.text_centered(FOOTER, Face::Oblique, 8.0, PAGE_WIDTH / 2.0, 20.0);

    let file = File::create(output)
        .with_context(|| format!("Failed to create document {}", output.display()))?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| ReceiptError::Pdf(format!("Failed to write {}: {e}", output.display())))?;

    tracing::debug!(receipt_id = %receipt_id, "Rendered {}", output.display());

    Ok(RenderedReceipt {
        path: output.to_path_buf(),
        receipt_id: receipt_id.clone(),
        figures,
        hash_fragment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::amount::PaymentStatus;
    use image::{Rgba, RgbaImage};
    use serde_json::json;
    use tempfile::TempDir;

    fn write_signature(dir: &Path) -> PathBuf {
        let path = dir.join("signature.png");
        let mut img = RgbaImage::from_pixel(90, 32, Rgba([0, 0, 0, 0]));
        for x in 10..80 {
            img.put_pixel(x, 16, Rgba([20, 20, 120, 255]));
        }
        img.save(&path).unwrap();
        path
    }

    fn record(due: &str) -> RecipientRecord {
        RecipientRecord::from_fields([
            ("Name", json!("Alice")),
            ("Amount", json!("5000")),
            ("Due Amount", json!(due)),
            ("Date", json!("2024-01-01")),
            ("Description", json!("Rent")),
            ("Receipt No", json!("R001")),
        ])
    }

    fn render(dir: &Path, record: &RecipientRecord, signature: &Path) -> Result<RenderedReceipt> {
        let identity = ReceiptIdentity::derive(record, &chrono::Utc::now())?;
        let codes = VerificationCodes::generate("https://example.org/verify.html", "R001")?;
        let input = RenderInput {
            record,
            identity: &identity,
            codes: &codes,
            author_name: "Issuer",
            signature_path: signature,
            currency_symbol: "¥",
        };
        render_receipt(&input, &dir.join("Alice_temp.pdf"))
    }

    #[test]
    fn test_render_writes_pdf() {
        let temp_dir = TempDir::new().unwrap();
        let signature = write_signature(temp_dir.path());

        let rendered = render(temp_dir.path(), &record("0"), &signature).unwrap();

        let bytes = std::fs::read(&rendered.path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(rendered.figures.status, PaymentStatus::Paid);
        assert_eq!(rendered.figures.paid_display, "¥5000");
        assert_eq!(rendered.receipt_id, "R001");
        assert!(rendered.hash_fragment.ends_with("..."));
    }

    #[test]
    fn test_render_due_figures() {
        let temp_dir = TempDir::new().unwrap();
        let signature = write_signature(temp_dir.path());

        let rendered = render(temp_dir.path(), &record("2000"), &signature).unwrap();
        assert_eq!(rendered.figures.status, PaymentStatus::Due);
        assert_eq!(rendered.figures.paid_display, "¥3000");
    }

    #[test]
    fn test_missing_signature_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.png");

        let err = render(temp_dir.path(), &record("0"), &missing).unwrap_err();
        assert!(err.to_string().contains("signature"));
        assert!(!temp_dir.path().join("Alice_temp.pdf").exists());
    }

    #[test]
    fn test_missing_field_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let signature = write_signature(temp_dir.path());
        let record = RecipientRecord::from_fields([("Name", json!("Alice")), ("Amount", json!("1"))]);

        let err = render(temp_dir.path(), &record, &signature).unwrap_err();
        assert!(matches!(err, ReceiptError::MissingField(f) if f == "Date"));
    }

    #[test]
    fn test_empty_cells_render() {
        let temp_dir = TempDir::new().unwrap();
        let signature = write_signature(temp_dir.path());
        let record = RecipientRecord::from_fields([
            ("Name", json!("Alice")),
            ("Amount", json!("5000")),
            ("Date", json!(null)),
            ("Description", json!(null)),
        ]);

        let rendered = render(temp_dir.path(), &record, &signature).unwrap();
        assert_eq!(rendered.figures.status, PaymentStatus::Paid);
        assert!(rendered.path.exists());
    }

    #[test]
    fn test_flatten_on_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0])));
        let flat = flatten_on_white(&img).to_rgb8();
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
    }
}
