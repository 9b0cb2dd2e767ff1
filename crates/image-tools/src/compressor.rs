use common_types::{CompressionStrategy, OutputFormat, PixError, SmoothingPolicy};
use render_surface::{decode_bitmap, encode_rgba, Bitmap, RasterSurfaceProvider, SurfaceProvider};
use serde::{Deserialize, Serialize};
use stepped_downscale::{fit_within, SteppedDownscaler};
use tracing::{info, span, Level};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressionOptions {
    /// Encoder quality in `(0, 1]`
    pub quality: f32,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub preserve_aspect_ratio: bool,
    pub format: OutputFormat,
    pub strategy: CompressionStrategy,
    pub smoothing: bool,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            quality: 0.8,
            max_width: None,
            max_height: None,
            preserve_aspect_ratio: true,
            format: OutputFormat::Webp,
            strategy: CompressionStrategy::Balanced,
            smoothing: true,
        }
    }
}

impl CompressionOptions {
    /// Parse a JSON preset; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, PixError> {
        let options: Self = serde_json::from_str(json).map_err(|e| PixError::ConfigInvalid {
            message: format!("compression preset: {e}"),
        })?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), PixError> {
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(PixError::ConfigInvalid {
                message: format!("quality must be within (0, 1], got {}", self.quality),
            });
        }
        Ok(())
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_max_size(mut self, max_width: Option<u32>, max_height: Option<u32>) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }

    pub fn with_preserve_aspect_ratio(mut self, preserve: bool) -> Self {
        self.preserve_aspect_ratio = preserve;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_strategy(mut self, strategy: CompressionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_smoothing(mut self, smoothing: bool) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn smoothing_policy(&self) -> SmoothingPolicy {
        SmoothingPolicy::for_strategy(self.strategy, self.smoothing)
    }

    pub fn target_dimensions(&self, source: (u32, u32)) -> (u32, u32) {
        fit_within(source, self.max_width, self.max_height, self.preserve_aspect_ratio)
    }
}

#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub original_size: u64,
    pub compressed_size: u64,
}

impl CompressedImage {
    /// Rounded size reduction in percent; negative when the output grew
    pub fn savings_percent(&self) -> i64 {
        if self.original_size == 0 {
            return 0;
        }
        ((1.0 - self.compressed_size as f64 / self.original_size as f64) * 100.0).round() as i64
    }

    pub fn file_name(&self) -> String {
        format!("compressed-image.{}", self.format.extension())
    }
}

/// Human readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2.25 MB`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["Bytes", "KB", "MB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// Re-encodes images, downsizing with stepped halving when caps are set
#[derive(Debug, Clone, Default)]
pub struct ImageCompressor<P = RasterSurfaceProvider> {
    downscaler: SteppedDownscaler<P>,
    options: CompressionOptions,
}

impl ImageCompressor<RasterSurfaceProvider> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: SurfaceProvider> ImageCompressor<P> {
    pub fn with_provider(provider: P) -> Self {
        Self {
            downscaler: SteppedDownscaler::with_provider(provider),
            options: CompressionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompressionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompressionOptions {
        &self.options
    }

    /// Decode `bytes` and compress; sizes are reported against the input length
    pub fn compress(&self, bytes: &[u8]) -> Result<CompressedImage, PixError> {
        self.options.validate()?;
        let bitmap = decode_bitmap(bytes)?;
        self.compress_bitmap(&bitmap, bytes.len() as u64)
    }

    #[tracing::instrument(level = "info", skip(self, bitmap), fields(width = bitmap.width(), height = bitmap.height()))]
    pub fn compress_bitmap(&self, bitmap: &Bitmap, original_size: u64) -> Result<CompressedImage, PixError> {
        let span = span!(
            Level::INFO,
            "compress",
            format = self.options.format.mime_type(),
            strategy = ?self.options.strategy
        );
        let _guard = span.enter();

        self.options.validate()?;
        let start_time = std::time::Instant::now();

        let (width, height) = self.options.target_dimensions(bitmap.dimensions());
        let smoothing = self.options.smoothing_policy();
        let resized = self
            .downscaler
            .downscale(bitmap, width, height, false, smoothing)?;

        let quality = self.options.format.effective_quality(self.options.quality);
        let data = encode_rgba(resized.as_image(), self.options.format, quality)?;
        let compressed_size = data.len() as u64;

        let result = CompressedImage {
            data,
            format: self.options.format,
            width,
            height,
            original_size,
            compressed_size,
        };

        info!(
            stage = "compress",
            width = width,
            height = height,
            original = %format_file_size(original_size),
            compressed = %format_file_size(compressed_size),
            savings_percent = result.savings_percent(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Image compressed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_surface::RasterSurface;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Raster provider that counts acquisitions
    #[derive(Default)]
    struct CountingProvider {
        acquired: Rc<Cell<usize>>,
    }

    impl SurfaceProvider for CountingProvider {
        type Surface = RasterSurface;

        fn acquire(&self, width: u32, height: u32) -> Result<RasterSurface, PixError> {
            self.acquired.set(self.acquired.get() + 1);
            RasterSurface::new(width, height)
        }
    }

    #[test]
    fn test_compress_uses_a_single_surface() {
        let bitmap = Bitmap::solid(64, 32, [10, 20, 30, 255]).unwrap();

        for max_width in [None, Some(16)] {
            let provider = CountingProvider::default();
            let acquired = Rc::clone(&provider.acquired);
            let options = CompressionOptions::default()
                .with_format(OutputFormat::Png)
                .with_max_size(max_width, None);

            let result = ImageCompressor::with_provider(provider)
                .with_options(options)
                .compress_bitmap(&bitmap, 1000)
                .unwrap();

            assert_eq!(acquired.get(), 1, "max_width {max_width:?}");
            assert_eq!(result.width, max_width.unwrap_or(64));
        }
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1023), "1023 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1_048_576), "1 MB");
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024), "5120 MB");
    }

    #[test]
    fn test_savings_percent() {
        let mut image = CompressedImage {
            data: Vec::new(),
            format: OutputFormat::Jpeg,
            width: 1,
            height: 1,
            original_size: 1000,
            compressed_size: 250,
        };
        assert_eq!(image.savings_percent(), 75);
        assert_eq!(image.file_name(), "compressed-image.jpg");

        image.compressed_size = 1500;
        assert_eq!(image.savings_percent(), -50);

        image.original_size = 0;
        assert_eq!(image.savings_percent(), 0);
    }

    #[test]
    fn test_options_from_json() {
        let options = CompressionOptions::from_json(
            r#"{"quality":0.5,"maxWidth":1024,"format":"jpeg","strategy":"size","smoothing":false}"#,
        )
        .unwrap();

        assert_eq!(options.quality, 0.5);
        assert_eq!(options.max_width, Some(1024));
        assert_eq!(options.max_height, None);
        assert!(options.preserve_aspect_ratio);
        assert_eq!(options.format, OutputFormat::Jpeg);
        assert_eq!(options.smoothing_policy(), SmoothingPolicy::Off);
    }

    #[test]
    fn test_options_reject_bad_quality() {
        let err = CompressionOptions::from_json(r#"{"quality":0}"#).unwrap_err();
        assert_eq!(err.code(), "E_CONFIG");

        let err = CompressionOptions::from_json(r#"{"format":"gif"}"#).unwrap_err();
        assert_eq!(err.code(), "E_CONFIG");
    }
}
