//! QR code rasterization.
//!
//! Symbols are encoded with the `qrcode` crate and drawn black on white onto
//! an opaque square canvas of exactly the requested pixel size.

use std::fmt;
use std::str::FromStr;

use image::{Rgba, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};
use tracing::debug;

use crate::error::{Error, Result};

const DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// QR error-correction level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorCorrection {
    /// Recovers about 7% of codewords.
    Low,
    /// Recovers about 15% of codewords.
    Medium,
    /// Recovers about 25% of codewords.
    Quartile,
    /// Recovers about 30% of codewords. Best suited to watermarked codes.
    #[default]
    High,
}

impl ErrorCorrection {
    /// Single-letter name (`L`, `M`, `Q`, `H`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCorrection::Low => "L",
            ErrorCorrection::Medium => "M",
            ErrorCorrection::Quartile => "Q",
            ErrorCorrection::High => "H",
        }
    }
}

impl fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCorrection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(ErrorCorrection::Low),
            "m" | "medium" => Ok(ErrorCorrection::Medium),
            "q" | "quartile" => Ok(ErrorCorrection::Quartile),
            "h" | "high" => Ok(ErrorCorrection::High),
            other => Err(Error::invalid(format!(
                "unknown error correction level '{other}' (expected L, M, Q or H)"
            ))),
        }
    }
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

/// How the QR symbol is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrOptions {
    /// Edge length of the output image in pixels.
    pub size: u32,
    /// Error-correction level of the symbol.
    pub error_correction: ErrorCorrection,
    /// Light border around the symbol, in modules.
    pub quiet_zone: u32,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            size: 512,
            error_correction: ErrorCorrection::High,
            quiet_zone: 4,
        }
    }
}

/// Encode `data` and draw it onto an opaque `size x size` canvas.
///
/// Each output pixel samples the module under it, so modules may differ by
/// one pixel in width when `size` is not a multiple of the module count.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `data` is empty or `size` cannot hold one
/// pixel per module, and [`Error::QrEncode`] if `data` does not fit in a QR
/// symbol at the requested error-correction level.
pub fn render_qr(data: &str, opts: &QrOptions) -> Result<RgbaImage> {
    if data.is_empty() {
        return Err(Error::invalid("QR code data is required"));
    }
    if opts.size == 0 {
        return Err(Error::invalid("QR size must be greater than 0"));
    }

    let code = QrCode::with_error_correction_level(data.as_bytes(), opts.error_correction.into())?;
    #[allow(clippy::cast_possible_truncation)]
    let modules = code.width() as u32;
    let total = u64::from(modules) + 2 * u64::from(opts.quiet_zone);
    if u64::from(opts.size) < total {
        return Err(Error::invalid(format!(
            "QR size {}px is too small for {total} modules",
            opts.size
        )));
    }
    debug!(
        modules,
        quiet_zone = opts.quiet_zone,
        size = opts.size,
        level = %opts.error_correction,
        "rendering QR code"
    );

    let colors = code.to_colors();
    let quiet = u64::from(opts.quiet_zone);
    let size = u64::from(opts.size);
    let module_at = |px: u32| -> Option<usize> {
        let m = (u64::from(px) * total / size).checked_sub(quiet)?;
        if m >= u64::from(modules) {
            return None;
        }
        usize::try_from(m).ok()
    };

    let width = modules as usize;
    Ok(RgbaImage::from_fn(opts.size, opts.size, |x, y| {
        match (module_at(x), module_at(y)) {
            (Some(mx), Some(my)) if colors[my * width + mx] == Color::Dark => DARK,
            _ => LIGHT,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_requested_square_size() {
        for size in [64, 200, 512, 777] {
            let img = render_qr("https://example.com", &QrOptions { size, ..QrOptions::default() })
                .unwrap();
            assert_eq!(img.dimensions(), (size, size));
        }
    }

    #[test]
    fn output_is_opaque_black_and_white() {
        let img = render_qr("hello", &QrOptions::default()).unwrap();
        assert!(img.pixels().all(|p| *p == DARK || *p == LIGHT));
        assert!(img.pixels().any(|p| *p == DARK));
    }

    #[test]
    fn quiet_zone_is_light() {
        let img = render_qr("hello", &QrOptions::default()).unwrap();
        for i in 0..img.width() {
            assert_eq!(*img.get_pixel(i, 0), LIGHT);
            assert_eq!(*img.get_pixel(0, i), LIGHT);
            assert_eq!(*img.get_pixel(i, img.height() - 1), LIGHT);
        }
    }

    #[test]
    fn finder_pattern_corner_is_dark() {
        let opts = QrOptions {
            size: 290,
            quiet_zone: 4,
            ..QrOptions::default()
        };
        let img = render_qr("A", &opts).unwrap();
        // Version 1 symbol: 21 + 8 = 29 modules of exactly 10px
        assert_eq!(*img.get_pixel(39, 39), LIGHT);
        assert_eq!(*img.get_pixel(45, 45), DARK);
    }

    #[test]
    fn empty_data_is_rejected() {
        let err = render_qr("", &QrOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn size_smaller_than_modules_is_rejected() {
        let opts = QrOptions {
            size: 20,
            ..QrOptions::default()
        };
        let err = render_qr("hello", &opts).unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn oversized_data_fails_to_encode() {
        let data = "x".repeat(4000);
        let err = render_qr(&data, &QrOptions::default()).unwrap_err();
        assert!(matches!(err, Error::QrEncode(_)));
    }

    #[test]
    fn error_correction_parses_letters_and_names() {
        assert_eq!("L".parse::<ErrorCorrection>().unwrap(), ErrorCorrection::Low);
        assert_eq!("medium".parse::<ErrorCorrection>().unwrap(), ErrorCorrection::Medium);
        assert_eq!("q".parse::<ErrorCorrection>().unwrap(), ErrorCorrection::Quartile);
        assert_eq!("High".parse::<ErrorCorrection>().unwrap(), ErrorCorrection::High);
        assert!("x".parse::<ErrorCorrection>().is_err());
    }
}
