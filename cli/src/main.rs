use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use color_analysis::DominantColorAnalyzer;
use common_types::{Color, CompressionStrategy, OutputFormat, SmoothingPolicy};
use image_tools::{
    format_file_size, png_file_name, CompressionOptions, FramerOptions, ImageCompressor,
    ImageFramer, SvgConverter, SvgOptions,
};
use render_surface::{decode_bitmap, encode_rgba, RasterSurfaceProvider};
use std::fs;
use std::path::{Path, PathBuf};
use stepped_downscale::SteppedDownscaler;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Quality used by `resize` for lossy outputs
const RESIZE_QUALITY: f32 = 0.92;

#[derive(Parser, Debug)]
#[command(name = "pixkit")]
#[command(about = "Image utilities: square framing, SVG rasterization, compression and stepped resizing")]
struct Cli {
    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pad an image to a square, bordered with its dominant color
    Frame(FrameArgs),
    /// Rasterize an SVG document to PNG
    Svg(SvgArgs),
    /// Re-encode an image, optionally shrinking it
    Compress(CompressArgs),
    /// Report the most frequent color of an image
    Analyze(AnalyzeArgs),
    /// Resize with stepped halving
    Resize(ResizeArgs),
}

#[derive(Args, Debug)]
struct FrameArgs {
    input: PathBuf,

    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Border color when no dominant color qualifies (#rrggbb)
    #[arg(long, value_name = "HEX")]
    color: Option<Color>,

    /// Always use --color, skip color analysis
    #[arg(long)]
    no_auto_detect: bool,

    /// Share in percent the dominant color must exceed
    #[arg(long, value_name = "PCT")]
    threshold: Option<f64>,
}

#[derive(Args, Debug)]
struct SvgArgs {
    input: PathBuf,

    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[arg(long, default_value = "800")]
    width: u32,

    #[arg(long, default_value = "600")]
    height: u32,

    #[arg(long, value_name = "HEX", default_value = "#ffffff")]
    background: Color,

    #[arg(long)]
    transparent: bool,
}

#[derive(Args, Debug)]
struct CompressArgs {
    input: PathBuf,

    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// JSON file with compression options; flags below take precedence
    #[arg(long, value_name = "FILE")]
    preset: Option<PathBuf>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    #[arg(long)]
    max_width: Option<u32>,

    #[arg(long)]
    max_height: Option<u32>,

    /// Clamp width and height independently
    #[arg(long)]
    ignore_aspect: bool,

    /// jpeg, webp or png
    #[arg(long)]
    format: Option<OutputFormat>,

    /// balanced, quality or size
    #[arg(long)]
    strategy: Option<CompressionStrategy>,

    #[arg(long)]
    no_smoothing: bool,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    input: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ResizeArgs {
    input: PathBuf,

    #[arg(long)]
    width: u32,

    #[arg(long)]
    height: u32,

    /// Fit inside width × height instead of stretching
    #[arg(long)]
    keep_aspect: bool,

    /// high, medium, low or off
    #[arg(long, default_value = "medium")]
    smoothing: SmoothingPolicy,

    /// Format follows the extension, PNG when unknown
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Frame(args) => run_frame(args),
        Command::Svg(args) => run_svg(args),
        Command::Compress(args) => run_compress(args),
        Command::Analyze(args) => run_analyze(args),
        Command::Resize(args) => run_resize(args),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read input: {}", path.display()))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("Failed to write output: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote output");
    Ok(())
}

/// `name` placed in the input's directory
fn sibling(input: &Path, name: &str) -> PathBuf {
    input
        .parent()
        .map(|dir| dir.join(name))
        .unwrap_or_else(|| PathBuf::from(name))
}

fn run_frame(args: FrameArgs) -> Result<()> {
    let mut options = FramerOptions::default().with_auto_detect(!args.no_auto_detect);
    if let Some(color) = args.color {
        options = options.with_frame_color(color);
    }
    if let Some(threshold) = args.threshold {
        options = options.with_dominance_threshold(threshold);
    }

    let bytes = read_input(&args.input)?;
    let framed = ImageFramer::new()
        .with_options(options)
        .frame(&bytes)
        .with_context(|| format!("Failed to frame {}", args.input.display()))?;

    let output = args
        .output
        .unwrap_or_else(|| sibling(&args.input, framed.file_name()));
    write_output(&output, &framed.png)?;

    info!(
        output = %output.display(),
        edge = framed.edge,
        color = %framed.frame_color,
        auto_detected = framed.auto_detected,
        "Framed"
    );
    Ok(())
}

fn run_svg(args: SvgArgs) -> Result<()> {
    let options = SvgOptions::default()
        .with_size(args.width, args.height)
        .with_background(args.background)
        .with_transparent(args.transparent);

    let svg = read_input(&args.input)?;
    let png = SvgConverter::new()
        .with_options(options)
        .convert(&svg)
        .with_context(|| format!("Failed to convert {}", args.input.display()))?;

    let output = args.output.unwrap_or_else(|| {
        let name = args
            .input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        sibling(&args.input, &png_file_name(&name))
    });
    write_output(&output, &png)?;

    info!(
        output = %output.display(),
        width = args.width,
        height = args.height,
        size = %format_file_size(png.len() as u64),
        "Converted"
    );
    Ok(())
}

fn compression_options(args: &CompressArgs) -> Result<CompressionOptions> {
    let options = match &args.preset {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read preset: {}", path.display()))?;
            CompressionOptions::from_json(&json)
                .with_context(|| format!("Invalid preset: {}", path.display()))?
        }
        None => CompressionOptions::default(),
    };

    let options = apply_compress_flags(options, args);
    options.validate()?;
    Ok(options)
}

/// Explicit flags win over preset values; unset flags keep them
fn apply_compress_flags(mut options: CompressionOptions, args: &CompressArgs) -> CompressionOptions {
    if let Some(quality) = args.quality {
        options = options.with_quality(quality as f32 / 100.0);
    }
    if args.max_width.is_some() || args.max_height.is_some() {
        let max_width = args.max_width.or(options.max_width);
        let max_height = args.max_height.or(options.max_height);
        options = options.with_max_size(max_width, max_height);
    }
    if args.ignore_aspect {
        options = options.with_preserve_aspect_ratio(false);
    }
    if let Some(format) = args.format {
        options = options.with_format(format);
    }
    if let Some(strategy) = args.strategy {
        options = options.with_strategy(strategy);
    }
    if args.no_smoothing {
        options = options.with_smoothing(false);
    }
    options
}

fn run_compress(args: CompressArgs) -> Result<()> {
    let options = compression_options(&args)?;
    debug!(?options, "Compression options");

    let bytes = read_input(&args.input)?;
    let compressed = ImageCompressor::new()
        .with_options(options)
        .compress(&bytes)
        .with_context(|| format!("Failed to compress {}", args.input.display()))?;

    let output = args
        .output
        .unwrap_or_else(|| sibling(&args.input, &compressed.file_name()));
    write_output(&output, &compressed.data)?;

    info!(
        output = %output.display(),
        width = compressed.width,
        height = compressed.height,
        original = %format_file_size(compressed.original_size),
        compressed = %format_file_size(compressed.compressed_size),
        savings_percent = compressed.savings_percent(),
        "Compressed"
    );
    Ok(())
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let bytes = read_input(&args.input)?;
    let bitmap = decode_bitmap(&bytes)
        .with_context(|| format!("Failed to decode {}", args.input.display()))?;

    let result = DominantColorAnalyzer::new().analyze_bitmap(&RasterSurfaceProvider::new(), &bitmap)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{} {:.2}%", result.dominant_color, result.percentage);
    }
    Ok(())
}

fn run_resize(args: ResizeArgs) -> Result<()> {
    let bytes = read_input(&args.input)?;
    let bitmap = decode_bitmap(&bytes)
        .with_context(|| format!("Failed to decode {}", args.input.display()))?;

    let resized = SteppedDownscaler::new().downscale(
        &bitmap,
        args.width,
        args.height,
        args.keep_aspect,
        args.smoothing,
    )?;

    let output = args.output.unwrap_or_else(|| {
        let stem = args
            .input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        sibling(
            &args.input,
            &format!("{stem}-{}x{}.png", resized.width(), resized.height()),
        )
    });
    let format = output
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(OutputFormat::from_extension)
        .unwrap_or(OutputFormat::Png);

    let encoded = encode_rgba(
        resized.as_image(),
        format,
        format.effective_quality(RESIZE_QUALITY),
    )?;
    write_output(&output, &encoded)?;

    info!(
        output = %output.display(),
        from = %format!("{}×{}", bitmap.width(), bitmap.height()),
        to = %format!("{}×{}", resized.width(), resized.height()),
        smoothing = args.smoothing.as_str(),
        "Resized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compress_args(flags: &[&str]) -> CompressArgs {
        let argv = ["pixkit", "compress", "in.png"].iter().chain(flags);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Compress(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    fn preset() -> CompressionOptions {
        CompressionOptions::from_json(
            r#"{"quality":0.5,"maxHeight":300,"format":"png","strategy":"size"}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_flags_override_preset() {
        let args = compress_args(&["--max-width", "200", "--format", "jpeg", "--quality", "90"]);
        let options = apply_compress_flags(preset(), &args);

        assert_eq!(options.max_width, Some(200));
        assert_eq!(options.max_height, Some(300));
        assert_eq!(options.format, OutputFormat::Jpeg);
        assert_eq!(options.quality, 0.9);
        assert_eq!(options.strategy, CompressionStrategy::Size);
        assert!(options.preserve_aspect_ratio);
    }

    #[test]
    fn test_no_flags_keep_preset() {
        let options = apply_compress_flags(preset(), &compress_args(&[]));
        assert_eq!(options, preset());
    }

    #[test]
    fn test_toggle_flags() {
        let args = compress_args(&["--ignore-aspect", "--no-smoothing", "--max-height", "50"]);
        let options = apply_compress_flags(preset(), &args);

        assert!(!options.preserve_aspect_ratio);
        assert!(!options.smoothing);
        assert_eq!(options.max_height, Some(50));
        assert_eq!(options.max_width, None);
        assert_eq!(options.smoothing_policy(), SmoothingPolicy::Off);
    }

    #[test]
    fn test_quality_flag_range() {
        let argv = ["pixkit", "compress", "in.png", "--quality", "0"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
