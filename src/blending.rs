//! Alpha blending math for laying a watermark over the QR canvas.
//!
//! Every overlay pixel is composited with the "over" operator:
//! `out = src * alpha + dst * (1 - alpha)`
//! where `alpha` is the overlay pixel's own alpha scaled by the requested
//! transparency.

use image::RgbaImage;

use crate::placement::Placement;

const CHANNELS: usize = 4;

/// Blend `overlay` onto `canvas` in place with its top-left corner at `placement`.
///
/// `transparency` is a multiplier in `0.0..=1.0` applied to the overlay's alpha
/// channel. Overlay pixels that land outside the canvas are skipped. Colour
/// channels are rounded to nearest; the canvas alpha is combined with the
/// Porter-Duff over operator, so an opaque canvas stays opaque.
///
/// With the `cli` feature enabled rows are blended on the rayon pool. The
/// output is identical either way.
pub fn blend_onto(
    canvas: &mut RgbaImage,
    overlay: &RgbaImage,
    placement: Placement,
    transparency: f32,
) {
    let canvas_w = i64::from(canvas.width());
    let canvas_h = i64::from(canvas.height());
    let overlay_w = i64::from(overlay.width());
    let overlay_h = i64::from(overlay.height());

    // Clip to canvas bounds
    let x1 = placement.x.max(0);
    let y1 = placement.y.max(0);
    let x2 = (placement.x + overlay_w).min(canvas_w);
    let y2 = (placement.y + overlay_h).min(canvas_h);

    if x1 >= x2 || y1 >= y2 || transparency <= 0.0 {
        return;
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let (x1, x2, y1, y2) = (x1 as usize, x2 as usize, y1 as usize, y2 as usize);
    #[allow(clippy::cast_possible_truncation)]
    let (offset_x, offset_y) = (placement.x as isize, placement.y as isize);

    let canvas_stride = canvas.width() as usize * CHANNELS;
    let overlay_stride = overlay.width() as usize * CHANNELS;
    let src = overlay.as_raw();

    let blend_row = |(y, row): (usize, &mut [u8])| {
        #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let oy = (y as isize - offset_y) as usize;
        let src_row = &src[oy * overlay_stride..(oy + 1) * overlay_stride];
        for x in x1..x2 {
            #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
            let ox = (x as isize - offset_x) as usize;
            blend_pixel(
                &mut row[x * CHANNELS..(x + 1) * CHANNELS],
                &src_row[ox * CHANNELS..(ox + 1) * CHANNELS],
                transparency,
            );
        }
    };

    let dst: &mut [u8] = canvas;

    #[cfg(feature = "cli")]
    {
        use rayon::prelude::*;
        dst.par_chunks_exact_mut(canvas_stride)
            .enumerate()
            .skip(y1)
            .take(y2 - y1)
            .for_each(blend_row);
    }

    #[cfg(not(feature = "cli"))]
    {
        dst.chunks_exact_mut(canvas_stride)
            .enumerate()
            .skip(y1)
            .take(y2 - y1)
            .for_each(blend_row);
    }
}

/// Composite one RGBA `src` pixel over `dst` with an extra alpha multiplier.
fn blend_pixel(dst: &mut [u8], src: &[u8], transparency: f32) {
    let alpha = f32::from(src[3]) / 255.0 * transparency.min(1.0);
    if alpha <= 0.0 {
        return;
    }
    let inv_alpha = 1.0 - alpha;

    for ch in 0..3 {
        let blended = f32::from(src[ch]) * alpha + f32::from(dst[ch]) * inv_alpha;
        dst[ch] = to_channel(blended);
    }
    dst[3] = to_channel(255.0 * alpha + f32::from(dst[3]) * inv_alpha);
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn canvas(size: u32) -> RgbaImage {
        RgbaImage::from_pixel(size, size, WHITE)
    }

    #[test]
    fn full_transparency_copies_opaque_pixels() {
        let mut img = canvas(20);
        let overlay = RgbaImage::from_pixel(5, 5, RED);
        blend_onto(&mut img, &overlay, Placement { x: 3, y: 4 }, 1.0);

        for (x, y, px) in img.enumerate_pixels() {
            let inside = (3..8).contains(&x) && (4..9).contains(&y);
            assert_eq!(*px, if inside { RED } else { WHITE }, "pixel ({x},{y})");
        }
    }

    #[test]
    fn zero_transparency_leaves_canvas_untouched() {
        let mut img = canvas(10);
        let before = img.clone();
        let overlay = RgbaImage::from_pixel(4, 4, RED);
        blend_onto(&mut img, &overlay, Placement { x: 2, y: 2 }, 0.0);
        assert_eq!(img, before);
    }

    #[test]
    fn half_transparency_mixes_channels() {
        let mut img = canvas(4);
        let overlay = RgbaImage::from_pixel(1, 1, RED);
        blend_onto(&mut img, &overlay, Placement { x: 1, y: 1 }, 0.5);

        // 0 * 0.5 + 255 * 0.5 = 127.5, rounded up
        assert_eq!(*img.get_pixel(1, 1), Rgba([255, 128, 128, 255]));
        assert_eq!(*img.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn overlay_alpha_is_multiplied_by_transparency() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        let mut overlay = RgbaImage::new(2, 1);
        overlay.put_pixel(0, 0, Rgba([200, 200, 200, 0]));
        overlay.put_pixel(1, 0, Rgba([200, 200, 200, 255]));
        blend_onto(&mut img, &overlay, Placement { x: 0, y: 0 }, 0.5);

        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(1, 0), Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn pixels_outside_canvas_are_skipped() {
        let mut img = canvas(10);
        let overlay = RgbaImage::from_pixel(6, 30, RED);
        blend_onto(&mut img, &overlay, Placement { x: 7, y: -12 }, 1.0);

        assert_eq!(img.dimensions(), (10, 10));
        for (x, y, px) in img.enumerate_pixels() {
            let expected = if x >= 7 { RED } else { WHITE };
            assert_eq!(*px, expected, "pixel ({x},{y})");
        }
    }

    #[test]
    fn overlay_entirely_off_canvas_is_noop() {
        let mut img = canvas(8);
        let before = img.clone();
        let overlay = RgbaImage::from_pixel(4, 4, RED);
        blend_onto(&mut img, &overlay, Placement { x: 8, y: 0 }, 1.0);
        blend_onto(&mut img, &overlay, Placement { x: -4, y: 0 }, 1.0);
        blend_onto(&mut img, &overlay, Placement { x: 0, y: 100 }, 1.0);
        assert_eq!(img, before);
    }

    #[test]
    fn transparent_canvas_gains_overlay_alpha() {
        let mut img = RgbaImage::new(1, 1);
        let overlay = RgbaImage::from_pixel(1, 1, RED);
        blend_onto(&mut img, &overlay, Placement { x: 0, y: 0 }, 0.5);
        assert_eq!(img.get_pixel(0, 0)[3], 128);
    }
}
