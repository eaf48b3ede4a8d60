//! Watermark sizing and placement on the square QR canvas.
//!
//! The watermark width is a percentage of the canvas edge; its height follows
//! the source aspect ratio. Corner presets are inset by a margin of 5% of the
//! canvas edge.
//!
//! ```
//! use qr_watermark::{Placement, PlacementSpec, Position};
//!
//! let spec = PlacementSpec::new(512)
//!     .with_position(Position::BottomRight)
//!     .with_scale_percent(20);
//! let (w, h) = spec.target_size(100, 100);
//! assert_eq!((w, h), (102, 102));
//! assert_eq!(spec.place(w, h), Placement { x: 385, y: 385 });
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Percentage of the canvas edge kept free between a corner watermark and the edge.
pub const MARGIN_PERCENT: u32 = 5;

/// Smallest accepted watermark scale, in percent of the canvas edge.
pub const MIN_SCALE_PERCENT: u32 = 5;

/// Largest accepted watermark scale, in percent of the canvas edge.
pub const MAX_SCALE_PERCENT: u32 = 50;

/// Where the watermark sits on the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Position {
    /// Centered on both axes.
    #[default]
    Center,
    /// Upper left corner, margin-inset.
    TopLeft,
    /// Upper right corner, margin-inset.
    TopRight,
    /// Lower left corner, margin-inset.
    BottomLeft,
    /// Lower right corner, margin-inset.
    BottomRight,
}

impl Position {
    /// All presets, in the order front ends list them.
    pub const ALL: [Position; 5] = [
        Position::Center,
        Position::TopLeft,
        Position::TopRight,
        Position::BottomLeft,
        Position::BottomRight,
    ];

    /// The kebab-case name used on the command line and in forms.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Position::Center => "center",
            Position::TopLeft => "top-left",
            Position::TopRight => "top-right",
            Position::BottomLeft => "bottom-left",
            Position::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Position::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                Error::invalid(format!(
                    "unknown position '{wanted}' (expected center, top-left, top-right, bottom-left or bottom-right)"
                ))
            })
    }
}

/// Top-left corner of the placed watermark, in canvas pixels.
///
/// Coordinates are signed: a watermark taller than the canvas ends up partly
/// above or below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Horizontal offset from the left canvas edge.
    pub x: i64,
    /// Vertical offset from the top canvas edge.
    pub y: i64,
}

/// Immutable description of how a watermark is laid over a square canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementSpec {
    /// Which preset to use.
    pub position: Position,
    /// Watermark width as a percentage of the canvas edge (5-50).
    pub scale_percent: u32,
    /// Alpha multiplier applied to every watermark pixel, 0.0-1.0.
    pub transparency: f32,
    /// Edge length of the square canvas in pixels.
    pub canvas_size: u32,
}

impl PlacementSpec {
    /// Defaults used by every front end: centered, 25%, transparency 128/255.
    #[must_use]
    pub fn new(canvas_size: u32) -> Self {
        Self {
            position: Position::Center,
            scale_percent: 25,
            transparency: 128.0 / 255.0,
            canvas_size,
        }
    }

    /// Set the position preset.
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Set the watermark width in percent of the canvas edge.
    #[must_use]
    pub fn with_scale_percent(mut self, scale_percent: u32) -> Self {
        self.scale_percent = scale_percent;
        self
    }

    /// Set the transparency as a fraction in `0.0..=1.0`.
    #[must_use]
    pub fn with_transparency(mut self, transparency: f32) -> Self {
        self.transparency = transparency;
        self
    }

    /// Set the transparency on the 0-255 scale used by the CLI and forms.
    #[must_use]
    pub fn with_transparency_u8(mut self, transparency: u8) -> Self {
        self.transparency = f32::from(transparency) / 255.0;
        self
    }

    /// Check every field is within its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.canvas_size == 0 {
            return Err(Error::invalid("canvas size must be greater than 0"));
        }
        if !(MIN_SCALE_PERCENT..=MAX_SCALE_PERCENT).contains(&self.scale_percent) {
            return Err(Error::invalid(format!(
                "scale must be between {MIN_SCALE_PERCENT} and {MAX_SCALE_PERCENT} percent, got {}",
                self.scale_percent
            )));
        }
        if !self.transparency.is_finite() || !(0.0..=1.0).contains(&self.transparency) {
            return Err(Error::invalid(format!(
                "transparency must be between 0.0 and 1.0, got {}",
                self.transparency
            )));
        }
        Ok(())
    }

    /// Distance kept between a corner watermark and the canvas edges.
    #[must_use]
    pub fn margin(&self) -> u32 {
        self.canvas_size / (100 / MARGIN_PERCENT)
    }

    /// Size of the resized watermark for a source of `wm_width x wm_height`.
    ///
    /// The width is `floor(canvas * scale / 100)`; the height keeps the source
    /// aspect ratio and is never clamped to the canvas. Both are computed in
    /// 64-bit integers so very tall sources cannot overflow.
    #[must_use]
    pub fn target_size(&self, wm_width: u32, wm_height: u32) -> (u64, u64) {
        let width = u64::from(self.canvas_size) * u64::from(self.scale_percent) / 100;
        if wm_width == 0 {
            return (width, 0);
        }
        let height = width * u64::from(wm_height) / u64::from(wm_width);
        (width, height)
    }

    /// Where a watermark of the given resized size is placed.
    ///
    /// Halving for the centered preset floors toward negative infinity.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn place(&self, target_width: u64, target_height: u64) -> Placement {
        let canvas = i64::from(self.canvas_size);
        let margin = i64::from(self.margin());
        let w = target_width as i64;
        let h = target_height as i64;

        let left = margin;
        let top = margin;
        let right = canvas - w - margin;
        let bottom = canvas - h - margin;

        match self.position {
            Position::Center => Placement {
                x: (canvas - w).div_euclid(2),
                y: (canvas - h).div_euclid(2),
            },
            Position::TopLeft => Placement { x: left, y: top },
            Position::TopRight => Placement { x: right, y: top },
            Position::BottomLeft => Placement { x: left, y: bottom },
            Position::BottomRight => Placement { x: right, y: bottom },
        }
    }
}
