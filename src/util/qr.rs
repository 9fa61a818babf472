//! QR rendering for sharing a game or course link.

use qrcode::{Color, EcLevel, QrCode};
use tracing::warn;

/// Pixels per QR module.
pub const SCALE: usize = 10;
/// Light modules around the symbol on every side.
pub const QUIET_ZONE: usize = 4;
/// Side of the placeholder, in modules (a version 1 symbol plus quiet zone).
const PLACEHOLDER_MODULES: usize = 21 + 2 * QUIET_ZONE;

/// Square black and white image, row-major, `true` for dark pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrBitmap {
    size: usize,
    pixels: Vec<bool>,
    placeholder: bool,
}

impl QrBitmap {
    /// Side length in pixels.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Colour of the pixel at column `x`, row `y`; `None` outside the image.
    pub fn is_dark(&self, x: usize, y: usize) -> Option<bool> {
        if x >= self.size || y >= self.size {
            return None;
        }
        self.pixels.get(y * self.size + x).copied()
    }

    /// Whether this image stands in for text that could not be encoded.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Encode as a binary PBM (`P4`) image.
    pub fn to_pbm(&self) -> Vec<u8> {
        let mut out = format!("P4\n{} {}\n", self.size, self.size).into_bytes();
        for row in self.pixels.chunks(self.size) {
            for bits in row.chunks(8) {
                let byte = bits
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, dark)| if *dark { acc | (0x80 >> i) } else { acc });
                out.push(byte);
            }
        }
        out
    }

    fn from_modules(modules: usize, dark: impl Fn(usize, usize) -> bool, placeholder: bool) -> Self {
        let size = modules * SCALE;
        let pixels = (0..size * size)
            .map(|i| dark((i % size) / SCALE, (i / size) / SCALE))
            .collect();
        Self {
            size,
            pixels,
            placeholder,
        }
    }
}

/// Render `text` at error correction level M.
///
/// Text the symbol cannot hold yields a framed placeholder instead of an error.
pub fn render(text: &str) -> QrBitmap {
    match QrCode::with_error_correction_level(text.as_bytes(), EcLevel::M) {
        Ok(code) => {
            let width = code.width();
            QrBitmap::from_modules(
                width + 2 * QUIET_ZONE,
                |x, y| {
                    let inside = (QUIET_ZONE..QUIET_ZONE + width).contains(&x)
                        && (QUIET_ZONE..QUIET_ZONE + width).contains(&y);
                    inside && code[(x - QUIET_ZONE, y - QUIET_ZONE)] == Color::Dark
                },
                false,
            )
        }
        Err(err) => {
            warn!(error = %err, len = text.len(), "QR encoding failed; rendering placeholder");
            placeholder()
        }
    }
}

/// A dark frame with a cross through it.
fn placeholder() -> QrBitmap {
    let last = PLACEHOLDER_MODULES - 1;
    QrBitmap::from_modules(
        PLACEHOLDER_MODULES,
        |x, y| x == 0 || y == 0 || x == last || y == last || x == y || x + y == last,
        true,
    )
}
