use image::{Rgba, RgbaImage};
use qr_watermark::{
    composite, generate, generate_png, render_qr, Error, GenerateOptions, PlacementSpec,
    Position, QrOptions,
};

fn decode(img: &RgbaImage) -> Option<String> {
    let grey = image::imageops::grayscale(img);
    let (w, h) = grey.dimensions();
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(w as usize, h as usize, |x, y| {
            grey.get_pixel(x as u32, y as u32)[0]
        });
    prepared
        .detect_grids()
        .first()
        .and_then(|g| g.decode().ok())
        .map(|(_, content)| content)
}

fn red_square(size: u32) -> RgbaImage {
    RgbaImage::from_pixel(size, size, Rgba([255, 0, 0, 255]))
}

#[test]
fn plain_qr_scans_back_to_data() {
    let img = generate("https://example.com", None, &GenerateOptions::default()).unwrap();

    assert_eq!(img.dimensions(), (512, 512));
    assert!(img.pixels().all(|p| p[3] == 255));
    assert_eq!(decode(&img).as_deref(), Some("https://example.com"));
}

#[test]
fn bottom_right_red_watermark_is_placed_at_margin() {
    let opts = GenerateOptions {
        position: Position::BottomRight,
        transparency: 255,
        scale_percent: 20,
        ..GenerateOptions::default()
    };
    let plain = render_qr("https://example.com", &opts.qr_options()).unwrap();
    let img = generate("https://example.com", Some(&red_square(100)), &opts).unwrap();

    assert_eq!(img.dimensions(), (512, 512));
    // 102x102 watermark at x = y = 512 - 102 - 25 = 385
    for (x, y) in [(385, 385), (486, 385), (385, 486), (486, 486), (436, 436)] {
        let px = img.get_pixel(x, y);
        assert!(px[0] >= 254 && px[1] <= 1 && px[2] <= 1, "({x},{y}) = {px:?}");
    }
    for (x, y) in [(384, 436), (436, 384), (487, 436), (436, 487)] {
        assert_eq!(img.get_pixel(x, y), plain.get_pixel(x, y), "({x},{y})");
    }
}

#[test]
fn small_translucent_center_watermark_keeps_code_readable() {
    let opts = GenerateOptions {
        scale_percent: 10,
        transparency: 128,
        ..GenerateOptions::default()
    };
    let img = generate("https://example.com", Some(&red_square(64)), &opts).unwrap();
    assert_eq!(decode(&img).as_deref(), Some("https://example.com"));
}

#[test]
fn zero_transparency_is_identical_to_no_watermark() {
    let opts = GenerateOptions {
        transparency: 0,
        ..GenerateOptions::default()
    };
    let plain = generate("hello", None, &opts).unwrap();
    let faded = generate("hello", Some(&red_square(80)), &opts).unwrap();
    assert_eq!(plain.as_raw(), faded.as_raw());
}

#[test]
fn every_position_keeps_canvas_size() {
    let wm = RgbaImage::from_pixel(200, 100, Rgba([0, 128, 255, 200]));
    for position in Position::ALL {
        let opts = GenerateOptions {
            position,
            scale_percent: 50,
            qr_size: 300,
            ..GenerateOptions::default()
        };
        let img = generate("size check", Some(&wm), &opts).unwrap();
        assert_eq!(img.dimensions(), (300, 300), "{position}");
    }
}

#[test]
fn png_output_is_deterministic() {
    let opts = GenerateOptions {
        position: Position::TopLeft,
        transparency: 190,
        scale_percent: 30,
        ..GenerateOptions::default()
    };
    let logo = qr_watermark::raster::encode_png(&red_square(77)).unwrap();

    let a = generate_png("determinism", Some(&logo), &opts).unwrap();
    let b = generate_png("determinism", Some(&logo), &opts).unwrap();
    assert_eq!(a, b);
}

#[test]
fn composite_accepts_externally_rendered_canvas() {
    let qr = render_qr(
        "external",
        &QrOptions {
            size: 400,
            ..QrOptions::default()
        },
    )
    .unwrap();
    let spec = PlacementSpec::new(400)
        .with_position(Position::TopLeft)
        .with_scale_percent(25)
        .with_transparency_u8(255);
    let out = composite(qr, Some(&red_square(10)), &spec).unwrap();

    // 100x100 at (20, 20)
    assert_eq!(out.get_pixel(20, 20)[1], 0);
    assert_eq!(out.get_pixel(119, 119)[1], 0);
}

#[test]
fn one_pixel_wide_upload_at_full_scale_is_composited() {
    let tall = qr_watermark::raster::encode_png(&RgbaImage::from_pixel(
        1,
        65_535,
        Rgba([0, 0, 255, 255]),
    ))
    .unwrap();
    let opts = GenerateOptions {
        position: Position::TopRight,
        transparency: 255,
        scale_percent: 50,
        qr_size: 2048,
        ..GenerateOptions::default()
    };
    let png = generate_png("x", Some(&tall), &opts).unwrap();
    let img = image::load_from_memory(&png).unwrap().to_rgba8();

    assert_eq!(img.dimensions(), (2048, 2048));
    // 1024 wide at x = 2048 - 1024 - 102, covering rows 102.. to the bottom
    assert_eq!(*img.get_pixel(1500, 2047), Rgba([0, 0, 255, 255]));
    assert_ne!(*img.get_pixel(1500, 50), Rgba([0, 0, 255, 255]));
}

#[test]
fn error_classes_surface_to_callers() {
    let opts = GenerateOptions::default();

    assert!(matches!(
        generate("", None, &opts),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        generate_png("x", Some(b"garbage".as_slice()), &opts),
        Err(Error::WatermarkLoad(_))
    ));
    assert!(matches!(
        generate(&"9".repeat(10_000), None, &opts),
        Err(Error::QrEncode(_))
    ));
}
