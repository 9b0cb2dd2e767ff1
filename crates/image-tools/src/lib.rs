//! The three user-facing image tools: square framing, SVG rasterization and
//! re-encoding with stepped downscaling.

pub mod compressor;
pub mod framer;
pub mod svg;

pub use compressor::{format_file_size, CompressedImage, CompressionOptions, ImageCompressor};
pub use framer::{FramedImage, FramerOptions, ImageFramer, FRAMED_FILE_NAME};
pub use svg::{png_file_name, SvgConverter, SvgOptions};
