use common_types::{check_rgba_len, PixError};
use image::RgbaImage;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Decoded RGBA raster. Cloning shares the pixel storage.
#[derive(Clone)]
pub struct Bitmap {
    image: Arc<RgbaImage>,
}

impl Bitmap {
    /// Wrap a tightly packed RGBA buffer
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PixError> {
        check_rgba_len(data.len(), width, height)?;
        let image = RgbaImage::from_raw(width, height, data).ok_or_else(|| {
            PixError::invalid_argument(format!("buffer does not fit {width}×{height}"))
        })?;
        Ok(Self { image: Arc::new(image) })
    }

    pub fn from_image(image: RgbaImage) -> Result<Self, PixError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PixError::invalid_argument("bitmap must be at least 1×1"));
        }
        Ok(Self { image: Arc::new(image) })
    }

    pub(crate) fn from_checked_image(image: RgbaImage) -> Self {
        debug_assert!(image.width() > 0 && image.height() > 0);
        Self { image: Arc::new(image) }
    }

    /// Single-color bitmap, mostly useful for fixtures
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, PixError> {
        if width == 0 || height == 0 {
            return Err(PixError::invalid_argument("bitmap must be at least 1×1"));
        }
        Ok(Self {
            image: Arc::new(RgbaImage::from_pixel(width, height, image::Rgba(rgba))),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Row-major RGBA bytes
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Decode PNG / JPEG / WebP bytes into a bitmap
pub fn decode_bitmap(bytes: &[u8]) -> Result<Bitmap, PixError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| PixError::DecodeFailure {
        message: e.to_string(),
    })?;

    let rgba = decoded.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(PixError::DecodeFailure {
            message: "decoded image has no pixels".to_string(),
        });
    }

    debug!(
        stage = "decode",
        input_bytes = bytes.len(),
        width = rgba.width(),
        height = rgba.height(),
        "Bitmap decoded"
    );

    Ok(Bitmap { image: Arc::new(rgba) })
}
