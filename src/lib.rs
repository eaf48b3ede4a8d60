//! Generate QR codes with an image watermark laid over them.
//!
//! The pipeline is a single linear transform: encode the data as a QR
//! symbol, rasterize it onto a square canvas, resize the watermark relative
//! to the canvas, alpha-blend it at one of five positions, and export PNG.
//!
//! # Quick Start
//!
//! ```no_run
//! use qr_watermark::{generate, GenerateOptions, Position};
//!
//! let logo = image::open("logo.png").unwrap().to_rgba8();
//! let opts = GenerateOptions {
//!     position: Position::BottomRight,
//!     scale_percent: 20,
//!     ..GenerateOptions::default()
//! };
//! let img = generate("https://example.com", Some(&logo), &opts).unwrap();
//! img.save("watermarked_qr.png").unwrap();
//! ```
//!
//! # Compositing only
//!
//! When the QR raster comes from elsewhere, [`composite`] does just the
//! overlay step. Without a watermark it returns the canvas unchanged.
//!
//! ```
//! use image::{Rgba, RgbaImage};
//! use qr_watermark::{composite, PlacementSpec, Position};
//!
//! let qr = RgbaImage::from_pixel(512, 512, Rgba([255, 255, 255, 255]));
//! let logo = RgbaImage::from_pixel(100, 100, Rgba([255, 0, 0, 255]));
//! let spec = PlacementSpec::new(512)
//!     .with_position(Position::BottomRight)
//!     .with_scale_percent(20)
//!     .with_transparency_u8(255);
//! let out = composite(qr, Some(&logo), &spec).unwrap();
//! assert_eq!(out.dimensions(), (512, 512));
//! assert_eq!(out.get_pixel(400, 400)[1], 0);
//! ```

#![deny(missing_docs)]

pub mod blending;
mod compositor;
mod engine;
pub mod error;
pub mod form;
#[cfg(feature = "cli")]
pub mod logging;
mod placement;
pub mod qr;
pub mod raster;
#[cfg(feature = "server")]
pub mod server;

pub use compositor::{composite, RESIZE_FILTER};
pub use engine::{
    generate, generate_file, generate_png, GenerateOptions, DEFAULT_OUTPUT, MAX_QR_SIZE,
};
pub use error::{Error, Result};
pub use placement::{
    Placement, PlacementSpec, Position, MARGIN_PERCENT, MAX_SCALE_PERCENT, MIN_SCALE_PERCENT,
};
pub use qr::{render_qr, ErrorCorrection, QrOptions};
