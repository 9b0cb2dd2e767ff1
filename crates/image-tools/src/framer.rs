use color_analysis::DominantColorAnalyzer;
use common_types::{Color, ColorFrequencyResult, OutputFormat, PixError};
use render_surface::{decode_bitmap, Bitmap, RasterSurfaceProvider, RenderSurface, SurfaceProvider};
use serde::{Deserialize, Serialize};
use tracing::{info, span, warn, Level};

pub const FRAMED_FILE_NAME: &str = "framed-image.png";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FramerOptions {
    /// Border color used when no dominant color qualifies
    pub frame_color: Color,
    pub auto_detect: bool,
    /// Minimum share (percent, exclusive) for the dominant color to become the border
    pub dominance_threshold: f64,
}

impl Default for FramerOptions {
    fn default() -> Self {
        Self {
            frame_color: Color::BLACK,
            auto_detect: true,
            dominance_threshold: 30.0,
        }
    }
}

impl FramerOptions {
    pub fn with_frame_color(mut self, color: Color) -> Self {
        self.frame_color = color;
        self
    }

    pub fn with_auto_detect(mut self, auto_detect: bool) -> Self {
        self.auto_detect = auto_detect;
        self
    }

    pub fn with_dominance_threshold(mut self, threshold: f64) -> Self {
        self.dominance_threshold = threshold;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FramedImage {
    pub png: Vec<u8>,
    pub bitmap: Bitmap,
    pub frame_color: Color,
    /// Present when auto-detection ran
    pub analysis: Option<ColorFrequencyResult>,
    /// Border color came from the image itself
    pub auto_detected: bool,
    /// Square edge length in pixels
    pub edge: u32,
}

impl FramedImage {
    pub fn file_name(&self) -> &'static str {
        FRAMED_FILE_NAME
    }
}

/// Pads images to a square canvas filled with a border color
#[derive(Debug, Clone, Default)]
pub struct ImageFramer<P = RasterSurfaceProvider> {
    provider: P,
    analyzer: DominantColorAnalyzer,
    options: FramerOptions,
}

impl ImageFramer<RasterSurfaceProvider> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: SurfaceProvider> ImageFramer<P> {
    pub fn with_provider(provider: P) -> Self {
        Self {
            provider,
            analyzer: DominantColorAnalyzer::new(),
            options: FramerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FramerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &FramerOptions {
        &self.options
    }

    /// Dominant color, if it covers more than the configured threshold
    pub fn suggested_color(&self, analysis: &ColorFrequencyResult) -> Option<Color> {
        (analysis.percentage > self.options.dominance_threshold).then_some(analysis.dominant_color)
    }

    /// Dominant color of `bitmap` when it qualifies as the border
    pub fn detect_frame_color(&self, bitmap: &Bitmap) -> Result<Option<Color>, PixError> {
        Ok(self.detect(bitmap)?.1)
    }

    fn detect(&self, bitmap: &Bitmap) -> Result<(ColorFrequencyResult, Option<Color>), PixError> {
        let analysis = self.analyzer.analyze_bitmap(&self.provider, bitmap)?;
        let suggested = self.suggested_color(&analysis);
        Ok((analysis, suggested))
    }

    /// Square of edge `max(width, height)` filled with `color`, bitmap centered unscaled
    pub fn frame_bitmap(&self, bitmap: &Bitmap, color: Color) -> Result<Bitmap, PixError> {
        Ok(self.render(bitmap, color)?.snapshot())
    }

    fn render(&self, bitmap: &Bitmap, color: Color) -> Result<P::Surface, PixError> {
        let (width, height) = bitmap.dimensions();
        let edge = width.max(height);

        let mut surface = self.provider.acquire(edge, edge)?;
        surface.fill_background(color);

        let x = ((edge - width) / 2) as i64;
        let y = ((edge - height) / 2) as i64;
        surface.draw_bitmap(bitmap, x, y, width, height);

        Ok(surface)
    }

    /// Decode, pick the border color, frame and export as PNG
    pub fn frame(&self, bytes: &[u8]) -> Result<FramedImage, PixError> {
        let bitmap = decode_bitmap(bytes)?;
        self.frame_decoded(&bitmap)
    }

    #[tracing::instrument(level = "info", skip(self, bitmap), fields(width = bitmap.width(), height = bitmap.height()))]
    pub fn frame_decoded(&self, bitmap: &Bitmap) -> Result<FramedImage, PixError> {
        let span = span!(Level::INFO, "frame", auto_detect = self.options.auto_detect);
        let _guard = span.enter();

        let (analysis, suggested) = if self.options.auto_detect {
            let (result, suggested) = self.detect(bitmap)?;
            if suggested.is_none() {
                warn!(
                    stage = "frame",
                    dominant = %result.dominant_color,
                    percentage = result.percentage,
                    threshold = self.options.dominance_threshold,
                    "Dominant color below threshold, keeping configured frame color"
                );
            }
            (Some(result), suggested)
        } else {
            (None, None)
        };
        let frame_color = suggested.unwrap_or(self.options.frame_color);

        let surface = self.render(bitmap, frame_color)?;
        let png = surface.export_image(OutputFormat::Png, 1.0)?;
        let edge = surface.width();

        info!(
            stage = "frame",
            edge = edge,
            color = %frame_color,
            png_bytes = png.len(),
            "Image framed"
        );

        Ok(FramedImage {
            png,
            bitmap: surface.snapshot(),
            frame_color,
            analysis,
            auto_detected: suggested.is_some(),
            edge,
        })
    }
}
