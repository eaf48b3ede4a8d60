use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use qr_watermark::{generate_file, ErrorCorrection, GenerateOptions, Position, DEFAULT_OUTPUT};

#[derive(Parser)]
#[command(
    name = "qr-watermark",
    about = "Generate a QR code with an image watermark overlaid on it",
    version,
    after_help = "Example: qr-watermark https://example.com -w logo.png -p bottom-right -s 20\n\n\
                  Large or opaque watermarks can make the code unreadable; the default\n\
                  high error-correction level tolerates covering roughly 30% of it."
)]
struct Cli {
    /// Data to encode in the QR code (URL or text)
    data: String,

    /// Path to watermark image
    #[arg(short, long)]
    watermark: Option<PathBuf>,

    /// Watermark position (center, top-left, top-right, bottom-left, bottom-right)
    #[arg(short, long, default_value = "center")]
    position: Position,

    /// Watermark transparency (0-255, 255 = opaque)
    #[arg(short, long, default_value = "128")]
    transparency: u8,

    /// Watermark size as percentage of QR code (5-50)
    #[arg(short, long, default_value = "25")]
    scale: u32,

    /// Output file path
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// QR code size in pixels
    #[arg(short, long = "qr-size", default_value = "512")]
    qr_size: u32,

    /// Error correction level (L, M, Q, H)
    #[arg(short, long = "error-correction", default_value = "H")]
    error_correction: ErrorCorrection,

    /// Light border around the code, in modules
    #[arg(long, default_value = "4")]
    quiet_zone: u32,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose && cli.quiet {
        eprintln!("Error: Cannot specify both --verbose and --quiet");
        process::exit(1);
    }

    qr_watermark::logging::init(if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    });

    let opts = GenerateOptions {
        position: cli.position,
        transparency: cli.transparency,
        scale_percent: cli.scale,
        qr_size: cli.qr_size,
        error_correction: cli.error_correction,
        quiet_zone: cli.quiet_zone,
    };

    if let Some(watermark) = &cli.watermark {
        if !watermark.exists() {
            eprintln!(
                "Error: Watermark file does not exist: {}",
                watermark.display()
            );
            process::exit(1);
        }
        if !cli.quiet && !qr_watermark::raster::is_supported_image(watermark) {
            eprintln!(
                "WARNING: {} does not look like an image, trying to decode it anyway",
                watermark.display()
            );
        }
    }

    if !cli.quiet {
        eprintln!("Generating watermarked QR code...");
        if cli.verbose {
            print_settings(&cli, &opts);
        }
    }

    if let Err(e) = generate_file(&cli.data, cli.watermark.as_deref(), &cli.output, &opts) {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    if !cli.quiet {
        eprintln!("QR code saved to {}", cli.output.display());
    }
}

fn print_settings(cli: &Cli, opts: &GenerateOptions) {
    let watermark = cli
        .watermark
        .as_deref()
        .map_or_else(|| "none".to_string(), |p: &Path| p.display().to_string());
    eprintln!("  -> watermark: {watermark}");
    eprintln!(
        "  -> position: {}, transparency: {}, scale: {}%",
        opts.position, opts.transparency, opts.scale_percent
    );
    eprintln!(
        "  -> QR size: {}px, error correction: {}, quiet zone: {} modules",
        opts.qr_size, opts.error_correction, opts.quiet_zone
    );
}
