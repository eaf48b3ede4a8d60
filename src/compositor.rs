//! Overlaying a resized watermark onto a rasterized QR code.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::{debug, warn};

use crate::blending;
use crate::error::{Error, Result};
use crate::placement::{Placement, PlacementSpec};

/// Resampling filter used to fit the watermark to its target size.
pub const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Composite `watermark` onto the square QR canvas `qr` as described by `spec`.
///
/// Without a watermark the canvas is returned untouched. Otherwise the
/// watermark is resized to `scale_percent` of the canvas edge (keeping its
/// aspect ratio), positioned by the preset and blended with its own alpha
/// multiplied by `spec.transparency`. The result always has the canvas
/// dimensions; watermark pixels falling outside it are dropped.
///
/// When a very tall watermark overflows the canvas, only the source rows
/// that land on the canvas are resized, so memory stays proportional to the
/// canvas rather than to the full scaled watermark.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the canvas is empty, is not a square of
/// side `spec.canvas_size`, if `spec` is out of range, if the watermark has a
/// zero dimension, or if the resized watermark would be too tall to allocate.
pub fn composite(
    mut qr: RgbaImage,
    watermark: Option<&RgbaImage>,
    spec: &PlacementSpec,
) -> Result<RgbaImage> {
    let (width, height) = qr.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::invalid("QR canvas is empty"));
    }
    if width != height || width != spec.canvas_size {
        return Err(Error::invalid(format!(
            "QR canvas is {width}x{height}, expected {0}x{0}",
            spec.canvas_size
        )));
    }

    let Some(watermark) = watermark else {
        return Ok(qr);
    };
    spec.validate()?;

    let (wm_w, wm_h) = watermark.dimensions();
    if wm_w == 0 || wm_h == 0 {
        return Err(Error::invalid(format!(
            "watermark image is empty ({wm_w}x{wm_h})"
        )));
    }

    let (target_w, target_h) = spec.target_size(wm_w, wm_h);
    if target_w == 0 || target_h == 0 {
        debug!(
            wm_w,
            wm_h, target_w, target_h, "watermark resizes to nothing, skipping"
        );
        return Ok(qr);
    }
    let (Ok(resize_w), Ok(resize_h)) = (u32::try_from(target_w), u32::try_from(target_h)) else {
        return Err(Error::invalid(format!(
            "watermark of {wm_w}x{wm_h} would resize to {target_w}x{target_h}"
        )));
    };

    let placement = spec.place(target_w, target_h);
    debug!(
        position = %spec.position,
        target_w,
        target_h,
        x = placement.x,
        y = placement.y,
        "placing watermark"
    );

    let canvas = i64::from(spec.canvas_size);
    #[allow(clippy::cast_possible_wrap)]
    let overflows = placement.x < 0
        || placement.y < 0
        || placement.x + target_w as i64 > canvas
        || placement.y + target_h as i64 > canvas;
    if overflows {
        warn!(
            wm_w,
            wm_h, target_w, target_h, "watermark extends past the QR canvas and will be cut off"
        );
    }

    let Some((top, bottom)) = visible_rows(placement.y, resize_h, spec.canvas_size) else {
        return Ok(qr);
    };
    if top == 0 && bottom == resize_h {
        let resized = imageops::resize(watermark, resize_w, resize_h, RESIZE_FILTER);
        blending::blend_onto(&mut qr, &resized, placement, spec.transparency);
        return Ok(qr);
    }

    let (src_top, src_bottom) = source_rows(top, bottom, resize_h, wm_h);
    debug!(top, bottom, src_top, src_bottom, "resizing visible part of watermark");
    let source = imageops::crop_imm(watermark, 0, src_top, wm_w, src_bottom - src_top).to_image();
    let resized = imageops::resize(&source, resize_w, bottom - top, RESIZE_FILTER);
    let visible = Placement {
        x: placement.x,
        y: placement.y + i64::from(top),
    };
    blending::blend_onto(&mut qr, &resized, visible, spec.transparency);

    Ok(qr)
}

/// Rows `top..bottom` of a `height`-tall overlay at offset `y` that fall on
/// a canvas of side `canvas`, or `None` if none do.
fn visible_rows(y: i64, height: u32, canvas: u32) -> Option<(u32, u32)> {
    let height = i64::from(height);
    let top = (-y).clamp(0, height);
    let bottom = (i64::from(canvas) - y).clamp(0, height);
    if top >= bottom {
        return None;
    }
    // both lie in 0..=height, which came from a u32
    Some((u32::try_from(top).ok()?, u32::try_from(bottom).ok()?))
}

/// Source rows covering target rows `top..bottom` when `src_h` rows are
/// scaled to `dst_h`. Never empty.
fn source_rows(top: u32, bottom: u32, dst_h: u32, src_h: u32) -> (u32, u32) {
    let scale = |row: u32| u64::from(row) * u64::from(src_h);
    let dst_h = u64::from(dst_h);
    let first = scale(top) / dst_h;
    let last = scale(bottom).div_ceil(dst_h).min(u64::from(src_h));
    let first = u32::try_from(first).unwrap_or(src_h - 1).min(src_h - 1);
    let last = u32::try_from(last).unwrap_or(src_h).max(first + 1);
    (first, last)
}
