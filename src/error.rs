//! Error types for the qr-watermark crate.

/// Errors that can occur while generating and watermarking a QR code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or empty required data, or a numeric parameter out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The user-supplied watermark image could not be read or decoded.
    #[error("failed to load watermark image: {0}")]
    WatermarkLoad(image::ImageError),

    /// The data could not be encoded as a QR symbol.
    #[error("failed to encode QR code: {0}")]
    QrEncode(#[from] qrcode::types::QrError),

    /// The final raster could not be serialized as PNG.
    #[error("failed to encode PNG: {0}")]
    PngEncode(image::ImageError),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidInput`].
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the error was caused by the caller's input rather than by
    /// an encoder or the environment.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::WatermarkLoad(_))
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
