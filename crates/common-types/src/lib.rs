use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bytes per RGBA pixel in every pixel buffer handled by the workspace
pub const CHANNELS_PER_PIXEL: usize = 4;

/// 24-bit RGB color. Alpha is never part of color identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pack into `0x00RRGGBB`
    pub const fn packed(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    pub const fn from_packed(value: u32) -> Self {
        Self::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    /// Canonical `#rrggbb` lowercase form
    pub fn to_hex(self) -> String {
        format!("#{:06x}", self.packed())
    }

    /// Parse `#rrggbb` or `#rgb` (case-insensitive)
    pub fn from_hex(input: &str) -> Result<Self, PixError> {
        let invalid = || PixError::InvalidArgument {
            message: format!("invalid hex color '{input}', expected #rrggbb or #rgb"),
        };

        let digits = input.strip_prefix('#').ok_or_else(invalid)?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        match digits.len() {
            6 => {
                let value = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
                Ok(Self::from_packed(value))
            }
            3 => {
                let mut channels = [0u8; 3];
                for (slot, c) in channels.iter_mut().zip(digits.chars()) {
                    let nibble = c.to_digit(16).ok_or_else(invalid)? as u8;
                    *slot = nibble << 4 | nibble;
                }
                Ok(Self::new(channels[0], channels[1], channels[2]))
            }
            _ => Err(invalid()),
        }
    }

    pub fn to_rgba(self, alpha: u8) -> [u8; 4] {
        [self.r, self.g, self.b, alpha]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.packed())
    }
}

impl FromStr for Color {
    type Err = PixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Color {
    type Error = PixError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Most frequent exact color of a pixel buffer and its area share
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorFrequencyResult {
    pub dominant_color: Color,
    /// Share of pixels in `[0, 100]`
    pub percentage: f64,
}

/// Interpolation quality hint applied to every draw on a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingPolicy {
    High,
    #[default]
    Medium,
    Low,
    Off,
}

impl SmoothingPolicy {
    /// Policy used by the compressor for a strategy / smoothing toggle pair
    pub fn for_strategy(strategy: CompressionStrategy, smoothing: bool) -> Self {
        match (strategy, smoothing) {
            (CompressionStrategy::Quality, _) => SmoothingPolicy::High,
            (CompressionStrategy::Size, true) => SmoothingPolicy::Low,
            (CompressionStrategy::Balanced, true) => SmoothingPolicy::Medium,
            (_, false) => SmoothingPolicy::Off,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SmoothingPolicy::High => "high",
            SmoothingPolicy::Medium => "medium",
            SmoothingPolicy::Low => "low",
            SmoothingPolicy::Off => "off",
        }
    }
}

impl FromStr for SmoothingPolicy {
    type Err = PixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(SmoothingPolicy::High),
            "medium" => Ok(SmoothingPolicy::Medium),
            "low" => Ok(SmoothingPolicy::Low),
            "off" | "none" => Ok(SmoothingPolicy::Off),
            other => Err(PixError::InvalidArgument {
                message: format!("unknown smoothing policy '{other}' (high, medium, low, off)"),
            }),
        }
    }
}

/// Encoded output format for exported images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    #[default]
    Webp,
    Png,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Webp => "webp",
            OutputFormat::Png => "png",
        }
    }

    /// PNG is lossless, so its quality is pinned to 1.0
    pub fn effective_quality(self, quality: f32) -> f32 {
        match self {
            OutputFormat::Png => 1.0,
            _ => quality,
        }
    }

    /// Guess a format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "webp" => Some(OutputFormat::Webp),
            "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = PixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| PixError::InvalidArgument {
            message: format!("unknown output format '{s}' (jpeg, webp, png)"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionStrategy {
    #[default]
    Balanced,
    Quality,
    Size,
}

impl FromStr for CompressionStrategy {
    type Err = PixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "balanced" => Ok(CompressionStrategy::Balanced),
            "quality" => Ok(CompressionStrategy::Quality),
            "size" => Ok(CompressionStrategy::Size),
            other => Err(PixError::InvalidArgument {
                message: format!("unknown compression strategy '{other}' (balanced, quality, size)"),
            }),
        }
    }
}

/// Structured error taxonomy with stable codes
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixError {
    /// Malformed buffer or dimension precondition; a caller defect
    #[error("E_INVALID_ARGUMENT: {message}")]
    InvalidArgument { message: String },

    #[error("E_SURFACE_UNAVAILABLE: rendering surface unavailable: {message}")]
    SurfaceUnavailable { message: String },

    #[error("E_DECODE: image could not be decoded: {message}")]
    DecodeFailure { message: String },

    #[error("E_ENCODE: image export failed: {message}")]
    EncodeFailure { message: String },

    #[error("E_IO: I/O operation failed: {message}")]
    IoFailed { message: String },

    #[error("E_CONFIG: configuration invalid: {message}")]
    ConfigInvalid { message: String },
}

impl PixError {
    /// Get structured error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            PixError::InvalidArgument { .. } => "E_INVALID_ARGUMENT",
            PixError::SurfaceUnavailable { .. } => "E_SURFACE_UNAVAILABLE",
            PixError::DecodeFailure { .. } => "E_DECODE",
            PixError::EncodeFailure { .. } => "E_ENCODE",
            PixError::IoFailed { .. } => "E_IO",
            PixError::ConfigInvalid { .. } => "E_CONFIG",
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        PixError::InvalidArgument { message: message.into() }
    }

    pub fn surface_unavailable(message: impl Into<String>) -> Self {
        PixError::SurfaceUnavailable { message: message.into() }
    }
}

impl From<std::io::Error> for PixError {
    fn from(err: std::io::Error) -> Self {
        PixError::IoFailed { message: err.to_string() }
    }
}

/// Validate that `buffer` is a tightly packed RGBA image of `width × height`
pub fn check_rgba_len(buffer_len: usize, width: u32, height: u32) -> Result<(), PixError> {
    if width == 0 || height == 0 {
        return Err(PixError::invalid_argument(format!(
            "dimensions must be at least 1×1, got {width}×{height}"
        )));
    }

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(CHANNELS_PER_PIXEL))
        .ok_or_else(|| PixError::invalid_argument(format!("{width}×{height} overflows a pixel buffer")))?;

    if buffer_len != expected {
        return Err(PixError::invalid_argument(format!(
            "buffer has {buffer_len} bytes, expected {expected} for {width}×{height} RGBA"
        )));
    }

    Ok(())
}
