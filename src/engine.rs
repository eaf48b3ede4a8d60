//! End-to-end pipeline: encode data, overlay the watermark, export PNG.

use std::path::Path;

use image::RgbaImage;
use tracing::info;

use crate::compositor;
use crate::error::{Error, Result};
use crate::placement::{PlacementSpec, Position, MAX_SCALE_PERCENT, MIN_SCALE_PERCENT};
use crate::qr::{self, ErrorCorrection, QrOptions};
use crate::raster;

/// Largest accepted QR canvas edge in pixels.
pub const MAX_QR_SIZE: u32 = 4096;

/// Output path used by the CLI when none is given.
pub const DEFAULT_OUTPUT: &str = "./watermarked_qr.png";

/// Options controlling QR generation and watermark placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Watermark position preset.
    pub position: Position,
    /// Watermark alpha multiplier on the 0-255 scale (255 = as opaque as the source).
    pub transparency: u8,
    /// Watermark width as a percentage of the QR edge (5-50).
    pub scale_percent: u32,
    /// QR canvas edge in pixels.
    pub qr_size: u32,
    /// QR error-correction level.
    pub error_correction: ErrorCorrection,
    /// Light border around the symbol, in modules.
    pub quiet_zone: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            position: Position::Center,
            transparency: 128,
            scale_percent: 25,
            qr_size: 512,
            error_correction: ErrorCorrection::High,
            quiet_zone: 4,
        }
    }
}

impl GenerateOptions {
    /// Check numeric options are in range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a scale outside 5-50 or a QR size
    /// outside `1..=MAX_QR_SIZE`.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SCALE_PERCENT..=MAX_SCALE_PERCENT).contains(&self.scale_percent) {
            return Err(Error::invalid(format!(
                "scale must be between {MIN_SCALE_PERCENT} and {MAX_SCALE_PERCENT} percent, got {}",
                self.scale_percent
            )));
        }
        if self.qr_size == 0 || self.qr_size > MAX_QR_SIZE {
            return Err(Error::invalid(format!(
                "QR size must be between 1 and {MAX_QR_SIZE} pixels, got {}",
                self.qr_size
            )));
        }
        Ok(())
    }

    /// Placement parameters for the compositor.
    #[must_use]
    pub fn placement(&self) -> PlacementSpec {
        PlacementSpec::new(self.qr_size)
            .with_position(self.position)
            .with_scale_percent(self.scale_percent)
            .with_transparency_u8(self.transparency)
    }

    /// Rendering parameters for the QR encoder.
    #[must_use]
    pub fn qr_options(&self) -> QrOptions {
        QrOptions {
            size: self.qr_size,
            error_correction: self.error_correction,
            quiet_zone: self.quiet_zone,
        }
    }
}

/// Render `data` as a QR code and overlay an already decoded watermark.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for empty data or out-of-range options and
/// [`Error::QrEncode`] if the data does not fit in a QR symbol.
pub fn generate(
    data: &str,
    watermark: Option<&RgbaImage>,
    opts: &GenerateOptions,
) -> Result<RgbaImage> {
    opts.validate()?;
    let qr = qr::render_qr(data, &opts.qr_options())?;
    compositor::composite(qr, watermark, &opts.placement())
}

/// Full in-memory pipeline used by the HTTP surface: raw watermark bytes in,
/// PNG bytes out.
///
/// # Errors
///
/// As [`generate`], plus [`Error::WatermarkLoad`] if the watermark bytes do
/// not decode and [`Error::PngEncode`] if the result cannot be serialized.
pub fn generate_png(
    data: &str,
    watermark: Option<&[u8]>,
    opts: &GenerateOptions,
) -> Result<Vec<u8>> {
    opts.validate()?;
    let qr = qr::render_qr(data, &opts.qr_options())?;
    let watermark = watermark.map(raster::decode_watermark).transpose()?;
    let img = compositor::composite(qr, watermark.as_ref(), &opts.placement())?;
    raster::encode_png(&img)
}

/// File-based pipeline used by the CLI.
///
/// Reads the optional watermark from disk and writes the result to `output`
/// as PNG, creating parent directories as needed.
///
/// # Errors
///
/// As [`generate_png`], plus [`Error::Io`] if `output` cannot be written.
pub fn generate_file(
    data: &str,
    watermark: Option<&Path>,
    output: &Path,
    opts: &GenerateOptions,
) -> Result<()> {
    opts.validate()?;
    let qr = qr::render_qr(data, &opts.qr_options())?;
    let watermark = watermark.map(raster::open_watermark).transpose()?;
    let img = compositor::composite(qr, watermark.as_ref(), &opts.placement())?;
    raster::save_png(&img, output)?;
    info!(
        output = %output.display(),
        watermarked = watermark.is_some(),
        "QR code written"
    );
    Ok(())
}
