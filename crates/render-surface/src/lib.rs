//! Drawing-surface boundary for the image tools.
//!
//! A [`Bitmap`] is an immutable decoded raster. A [`RenderSurface`] is the
//! mutable 2D target it gets drawn onto, with the usual canvas-like
//! capabilities (resize, fill, draw, read back, export). [`RasterSurface`] is
//! the in-memory implementation backed by the `image` crate.

pub mod bitmap;
pub mod export;
pub mod surface;

pub use bitmap::{decode_bitmap, Bitmap};
pub use export::encode_rgba;
pub use surface::{
    filter_for, RasterSurface, RasterSurfaceProvider, RenderSurface, SurfaceLimits, SurfaceProvider,
};
