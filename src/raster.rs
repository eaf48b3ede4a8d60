//! Reading watermark images and writing PNG output.

use std::io::Cursor;
use std::path::Path;

use image::{ImageError, ImageFormat, RgbaImage};

use crate::error::{Error, Result};

/// Decode watermark bytes in any format the `image` crate recognises.
///
/// The format is sniffed from the content, not from a file name.
///
/// # Errors
///
/// Returns [`Error::WatermarkLoad`] if the bytes are not a decodable image.
pub fn decode_watermark(bytes: &[u8]) -> Result<RgbaImage> {
    let img = image::load_from_memory(bytes).map_err(Error::WatermarkLoad)?;
    Ok(img.to_rgba8())
}

/// Read and decode a watermark image from disk.
///
/// # Errors
///
/// Returns [`Error::WatermarkLoad`] if the file cannot be read or decoded.
pub fn open_watermark(path: &Path) -> Result<RgbaImage> {
    let bytes = std::fs::read(path).map_err(|e| Error::WatermarkLoad(ImageError::IoError(e)))?;
    decode_watermark(&bytes)
}

/// Check if a file has an extension commonly used for watermark images.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "gif"
        ),
        None => false,
    }
}

/// Serialize an RGBA raster as PNG bytes.
///
/// # Errors
///
/// Returns [`Error::PngEncode`] if encoding fails.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(Error::PngEncode)?;
    Ok(buf)
}

/// Write an RGBA raster to `path` as PNG, whatever the file extension.
///
/// Missing parent directories are created.
///
/// # Errors
///
/// Returns [`Error::PngEncode`] if encoding fails or [`Error::Io`] if the
/// file cannot be written.
pub fn save_png(img: &RgbaImage, path: &Path) -> Result<()> {
    let png = encode_png(img)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(6, 4, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = (x * 40 + y * 10) as u8;
            Rgba([v, 0, 255 - v, 128])
        })
    }

    #[test]
    fn png_bytes_decode_back_to_same_pixels() {
        let img = sample();
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(decode_watermark(&png).unwrap(), img);
    }

    #[test]
    fn garbage_bytes_are_a_watermark_load_error() {
        let err = decode_watermark(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::WatermarkLoad(_)));
        assert!(err.to_string().starts_with("failed to load watermark image"));
    }

    #[test]
    fn missing_file_is_a_watermark_load_error() {
        let err = open_watermark(Path::new("/nonexistent/logo.png")).unwrap_err();
        assert!(matches!(err, Error::WatermarkLoad(_)));
    }

    #[test]
    fn save_png_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/qr.png");
        save_png(&sample(), &path).unwrap();
        assert_eq!(open_watermark(&path).unwrap(), sample());
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("logo.png")));
        assert!(is_supported_image(Path::new("logo.JPG")));
        assert!(is_supported_image(Path::new("logo.jpeg")));
        assert!(is_supported_image(Path::new("logo.webp")));
        assert!(is_supported_image(Path::new("logo.gif")));
    }

    #[test]
    fn is_supported_image_rejects_other_files() {
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("logo")));
    }
}
