use common_types::{Color, OutputFormat, PixError};
use render_surface::{Bitmap, RasterSurfaceProvider, RenderSurface, SurfaceProvider};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SvgOptions {
    pub width: u32,
    pub height: u32,
    pub background: Color,
    /// Skip the background fill
    pub transparent: bool,
    /// Needed for `<text>` elements to render
    pub load_system_fonts: bool,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            background: Color::WHITE,
            transparent: false,
            load_system_fonts: true,
        }
    }
}

impl SvgOptions {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn with_system_fonts(mut self, load: bool) -> Self {
        self.load_system_fonts = load;
        self
    }
}

/// `logo.svg` -> `logo.png`; names without an `.svg` suffix get `.png` appended
pub fn png_file_name(input: &str) -> String {
    let stem_len = input.len().saturating_sub(4);
    match input.get(stem_len..) {
        Some(ext) if ext.eq_ignore_ascii_case(".svg") => format!("{}.png", &input[..stem_len]),
        _ => format!("{input}.png"),
    }
}

fn parse_tree(svg: &[u8], load_system_fonts: bool) -> Result<usvg::Tree, PixError> {
    let mut options = usvg::Options::default();
    if load_system_fonts {
        options.fontdb_mut().load_system_fonts();
    }

    usvg::Tree::from_data(svg, &options).map_err(|e| PixError::DecodeFailure {
        message: format!("invalid SVG: {e}"),
    })
}

/// Rasterize `tree` uniformly scaled to fit and centered in `width × height`,
/// on a transparent background
fn render_tree(tree: &usvg::Tree, width: u32, height: u32) -> Result<Bitmap, PixError> {
    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        PixError::surface_unavailable(format!("cannot allocate a {width}×{height} pixmap"))
    })?;

    let size = tree.size();
    let scale = (width as f32 / size.width()).min(height as f32 / size.height());
    let x = (width as f32 - size.width() * scale) / 2.0;
    let y = (height as f32 - size.height() * scale) / 2.0;

    debug!(
        stage = "svg",
        svg_w = size.width(),
        svg_h = size.height(),
        scale = scale,
        offset_x = x,
        offset_y = y,
        "Rendering SVG tree"
    );

    resvg::render(tree, Transform::from_row(scale, 0.0, 0.0, scale, x, y), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha
    let data = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();

    Bitmap::from_rgba(width, height, data)
}

/// SVG to PNG rasterizer
#[derive(Debug, Clone, Default)]
pub struct SvgConverter<P = RasterSurfaceProvider> {
    provider: P,
    options: SvgOptions,
}

impl SvgConverter<RasterSurfaceProvider> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: SurfaceProvider> SvgConverter<P> {
    pub fn with_provider(provider: P) -> Self {
        Self {
            provider,
            options: SvgOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SvgOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SvgOptions {
        &self.options
    }

    fn render(&self, svg: &[u8]) -> Result<P::Surface, PixError> {
        let SvgOptions { width, height, .. } = self.options;
        if width == 0 || height == 0 {
            return Err(PixError::invalid_argument(format!(
                "output dimensions must be positive, got {width}×{height}"
            )));
        }

        let tree = parse_tree(svg, self.options.load_system_fonts)?;
        let mut surface = self.provider.acquire(width, height)?;
        let drawing = render_tree(&tree, width, height)?;

        if !self.options.transparent {
            surface.fill_background(self.options.background);
        }
        surface.draw_bitmap(&drawing, 0, 0, width, height);

        Ok(surface)
    }

    pub fn rasterize(&self, svg: &[u8]) -> Result<Bitmap, PixError> {
        Ok(self.render(svg)?.snapshot())
    }

    /// Rasterize and export as PNG
    #[tracing::instrument(level = "info", skip(self, svg), fields(svg_bytes = svg.len()))]
    pub fn convert(&self, svg: &[u8]) -> Result<Vec<u8>, PixError> {
        let start_time = std::time::Instant::now();
        let png = self.render(svg)?.export_image(OutputFormat::Png, 1.0)?;

        info!(
            stage = "svg",
            width = self.options.width,
            height = self.options.height,
            transparent = self.options.transparent,
            png_bytes = png.len(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "SVG converted"
        );

        Ok(png)
    }
}
