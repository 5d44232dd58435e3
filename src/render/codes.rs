//! Verification codes: a QR code carrying the verification URL and a
//! Code 128 barcode carrying the bare receipt id.
//!
//! Both are rasterized into greyscale buffers in memory; nothing touches
//! the disk.

use crate::error::{ReceiptError, Result};
use barcoders::sym::code128::Code128;
use image::{GrayImage, Luma};
use qrcode::{Color, EcLevel, QrCode};

/// Pixels per QR module.
const QR_BOX_SIZE: u32 = 10;
/// Quiet zone around the QR code, in modules.
const QR_BORDER: u32 = 2;

/// Pixels per barcode module.
const BAR_MODULE_WIDTH: u32 = 2;
/// Quiet zone on each side of the barcode, in modules.
const BAR_QUIET_ZONE: u32 = 10;
const BAR_HEIGHT: u32 = 100;

/// Code 128 character set B selector understood by `barcoders`.
const CODE128_SET_B: char = 'Ɓ';

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// `<base>?id=<receipt id>`
pub fn verification_url(base_url: &str, receipt_id: &str) -> String {
    format!("{base_url}?id={receipt_id}")
}

/// Encode `data` as a QR code image.
///
/// # Errors
///
/// Returns `QrCode` error if the data does not fit any QR version.
pub fn qr_code_image(data: &str) -> Result<GrayImage> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)?;
    let modules = to_u32(code.width())?;
    let colors = code.to_colors();

    let side = (modules + 2 * QR_BORDER) * QR_BOX_SIZE;
    let mut img = GrayImage::from_pixel(side, side, LIGHT);

    for (idx, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let idx = to_u32(idx)?;
        let (mx, my) = (idx % modules, idx / modules);
        let x0 = (mx + QR_BORDER) * QR_BOX_SIZE;
        let y0 = (my + QR_BORDER) * QR_BOX_SIZE;
        for y in y0..y0 + QR_BOX_SIZE {
            for x in x0..x0 + QR_BOX_SIZE {
                img.put_pixel(x, y, DARK);
            }
        }
    }

    Ok(img)
}

/// Encode a receipt id as a Code 128 (set B) barcode image.
///
/// # Errors
///
/// Returns `Barcode` error if the id contains characters outside set B.
pub fn barcode_image(receipt_id: &str) -> Result<GrayImage> {
    let symbol = Code128::new(format!("{CODE128_SET_B}{receipt_id}"))
        .map_err(|e| ReceiptError::Barcode(format!("cannot encode {receipt_id:?}: {e:?}")))?;
    let modules = symbol.encode();

    let width = (to_u32(modules.len())? + 2 * BAR_QUIET_ZONE) * BAR_MODULE_WIDTH;
    let mut img = GrayImage::from_pixel(width, BAR_HEIGHT, LIGHT);

    for (idx, module) in modules.iter().enumerate() {
        if *module == 0 {
            continue;
        }
        let x0 = (to_u32(idx)? + BAR_QUIET_ZONE) * BAR_MODULE_WIDTH;
        for x in x0..x0 + BAR_MODULE_WIDTH {
            for y in 0..BAR_HEIGHT {
                img.put_pixel(x, y, DARK);
            }
        }
    }

    Ok(img)
}

fn to_u32(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| ReceiptError::Image(format!("code dimension {n} too large")))
}

/// Both codes of one receipt.
#[derive(Debug, Clone)]
pub struct VerificationCodes {
    pub url: String,
    pub qr: GrayImage,
    pub barcode: GrayImage,
}

impl VerificationCodes {
    /// # Errors
    ///
    /// Returns error if either code cannot be encoded.
    pub fn generate(base_url: &str, receipt_id: &str) -> Result<Self> {
        let url = verification_url(base_url, receipt_id);
        let qr = qr_code_image(&url)?;
        let barcode = barcode_image(receipt_id)?;
        Ok(Self { url, qr, barcode })
    }
}
