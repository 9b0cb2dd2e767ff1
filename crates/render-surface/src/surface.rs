use crate::bitmap::Bitmap;
use crate::export::encode_rgba;
use common_types::{Color, OutputFormat, PixError, SmoothingPolicy};
use image::imageops::{self, FilterType};
use image::{Rgba, Rgba32FImage, RgbaImage};
use tracing::debug;

/// Addressable 2D drawing target
pub trait RenderSurface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Change the dimensions. Contents are reset to fully transparent.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), PixError>;

    fn set_smoothing(&mut self, policy: SmoothingPolicy);

    fn clear(&mut self);

    fn fill_background(&mut self, color: Color);

    /// Composite `source` (source-over) into the rectangle `(x, y, width, height)`,
    /// resampling with the current smoothing policy when the size differs.
    fn draw_bitmap(&mut self, source: &Bitmap, x: i64, y: i64, width: u32, height: u32);

    /// Row-major RGBA copy of the current contents
    fn read_pixels(&self) -> Vec<u8>;

    /// Current contents as an independent bitmap
    fn snapshot(&self) -> Bitmap;

    fn export_image(&self, format: OutputFormat, quality: f32) -> Result<Vec<u8>, PixError>;
}

/// Hands out drawing surfaces
pub trait SurfaceProvider {
    type Surface: RenderSurface;

    fn acquire(&self, width: u32, height: u32) -> Result<Self::Surface, PixError>;
}

/// Size caps for a surface, mirroring common browser canvas limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceLimits {
    pub max_dimension: u32,
    pub max_area: u64,
}

impl Default for SurfaceLimits {
    fn default() -> Self {
        Self {
            max_dimension: 32_767,
            max_area: 268_435_456,
        }
    }
}

impl SurfaceLimits {
    pub fn check(&self, width: u32, height: u32) -> Result<(), PixError> {
        if width == 0 || height == 0 {
            return Err(PixError::invalid_argument(format!(
                "surface dimensions must be at least 1×1, got {width}×{height}"
            )));
        }

        if width > self.max_dimension || height > self.max_dimension {
            return Err(PixError::surface_unavailable(format!(
                "{width}×{height} exceeds the maximum edge of {} px",
                self.max_dimension
            )));
        }

        let area = width as u64 * height as u64;
        if area > self.max_area {
            return Err(PixError::surface_unavailable(format!(
                "{width}×{height} ({area} px) exceeds the maximum area of {} px",
                self.max_area
            )));
        }

        Ok(())
    }
}

/// Resampling filter behind each smoothing policy
pub fn filter_for(policy: SmoothingPolicy) -> FilterType {
    match policy {
        SmoothingPolicy::High => FilterType::Lanczos3,
        SmoothingPolicy::Medium => FilterType::Triangle,
        SmoothingPolicy::Low | SmoothingPolicy::Off => FilterType::Nearest,
    }
}

/// In-memory RGBA surface
pub struct RasterSurface {
    canvas: RgbaImage,
    smoothing: SmoothingPolicy,
    limits: SurfaceLimits,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, PixError> {
        Self::with_limits(width, height, SurfaceLimits::default())
    }

    pub fn with_limits(width: u32, height: u32, limits: SurfaceLimits) -> Result<Self, PixError> {
        limits.check(width, height)?;
        Ok(Self {
            canvas: RgbaImage::new(width, height),
            smoothing: SmoothingPolicy::default(),
            limits,
        })
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.canvas
    }
}

impl RenderSurface for RasterSurface {
    fn width(&self) -> u32 {
        self.canvas.width()
    }

    fn height(&self) -> u32 {
        self.canvas.height()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), PixError> {
        self.limits.check(width, height)?;
        self.canvas = RgbaImage::new(width, height);
        Ok(())
    }

    fn set_smoothing(&mut self, policy: SmoothingPolicy) {
        self.smoothing = policy;
    }

    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn fill_background(&mut self, color: Color) {
        let fill = Rgba(color.to_rgba(255));
        for pixel in self.canvas.pixels_mut() {
            *pixel = fill;
        }
    }

    fn draw_bitmap(&mut self, source: &Bitmap, x: i64, y: i64, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        if (width, height) == source.dimensions() {
            imageops::overlay(&mut self.canvas, source.as_image(), x, y);
            return;
        }

        let filter = filter_for(self.smoothing);
        debug!(
            stage = "surface",
            from_w = source.width(),
            from_h = source.height(),
            to_w = width,
            to_h = height,
            smoothing = self.smoothing.as_str(),
            "Resampling bitmap"
        );
        let scaled = if is_opaque(source.as_image()) {
            imageops::resize(source.as_image(), width, height, filter)
        } else {
            // resample premultiplied so transparent pixels carry no color
            let premultiplied = premultiply(source.as_image());
            unpremultiply(&imageops::resize(&premultiplied, width, height, filter))
        };
        imageops::overlay(&mut self.canvas, &scaled, x, y);
    }

    fn read_pixels(&self) -> Vec<u8> {
        self.canvas.as_raw().clone()
    }

    fn snapshot(&self) -> Bitmap {
        // dimensions are validated on every resize, never empty
        Bitmap::from_checked_image(self.canvas.clone())
    }

    fn export_image(&self, format: OutputFormat, quality: f32) -> Result<Vec<u8>, PixError> {
        encode_rgba(&self.canvas, format, quality)
    }
}

fn is_opaque(image: &RgbaImage) -> bool {
    image.pixels().all(|p| p[3] == u8::MAX)
}

/// Straight 8-bit RGBA to premultiplied floats in `[0, 1]`
fn premultiply(image: &RgbaImage) -> Rgba32FImage {
    Rgba32FImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        Rgba([
            r as f32 / 255.0 * alpha,
            g as f32 / 255.0 * alpha,
            b as f32 / 255.0 * alpha,
            alpha,
        ])
    })
}

fn unpremultiply(image: &Rgba32FImage) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let alpha = a.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return Rgba([0, 0, 0, 0]);
        }
        let channel = |c: f32| ((c / alpha).clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([channel(r), channel(g), channel(b), (alpha * 255.0).round() as u8])
    })
}

/// Provider for [`RasterSurface`]s sharing one set of limits
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterSurfaceProvider {
    limits: SurfaceLimits,
}

impl RasterSurfaceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SurfaceLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> SurfaceLimits {
        self.limits
    }
}

impl SurfaceProvider for RasterSurfaceProvider {
    type Surface = RasterSurface;

    fn acquire(&self, width: u32, height: u32) -> Result<RasterSurface, PixError> {
        debug!(stage = "surface", width = width, height = height, "Acquiring surface");
        RasterSurface::with_limits(width, height, self.limits)
    }
}
