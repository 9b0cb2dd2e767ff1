//! Quality-preserving image downscaling by repeated halving.
//!
//! A single resize to less than half the linear size aliases badly with a
//! box or bilinear filter. Halving first keeps every individual pass at a
//! scale factor of at least 0.5, then one direct render lands on the exact
//! requested size.

pub mod plan;

use common_types::{PixError, SmoothingPolicy};
use render_surface::{Bitmap, RasterSurfaceProvider, RenderSurface, SurfaceProvider};
use tracing::{debug, info, span, Level};

pub use plan::{fit_within, resolve_target, step_count, DownscalePlan};

/// One downscale call
#[derive(Debug, Clone, Copy)]
pub struct DownscaleRequest<'a> {
    pub source: &'a Bitmap,
    pub target_width: u32,
    pub target_height: u32,
    pub aspect_preserving: bool,
    pub smoothing: SmoothingPolicy,
}

impl<'a> DownscaleRequest<'a> {
    pub fn new(source: &'a Bitmap, target_width: u32, target_height: u32) -> Self {
        Self {
            source,
            target_width,
            target_height,
            aspect_preserving: false,
            smoothing: SmoothingPolicy::default(),
        }
    }

    pub fn with_aspect_preserving(mut self, aspect_preserving: bool) -> Self {
        self.aspect_preserving = aspect_preserving;
        self
    }

    pub fn with_smoothing(mut self, smoothing: SmoothingPolicy) -> Self {
        self.smoothing = smoothing;
        self
    }
}

/// Stepped downscaler drawing through surfaces from `P`
#[derive(Debug, Clone, Default)]
pub struct SteppedDownscaler<P = RasterSurfaceProvider> {
    provider: P,
}

impl SteppedDownscaler<RasterSurfaceProvider> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: SurfaceProvider> SteppedDownscaler<P> {
    pub fn with_provider(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Resize `source` to `target_width × target_height` (or the aspect-fitted
    /// size inside that box), halving first when the source is more than twice
    /// as wide as the target.
    pub fn downscale(
        &self,
        source: &Bitmap,
        target_width: u32,
        target_height: u32,
        aspect_preserving: bool,
        smoothing: SmoothingPolicy,
    ) -> Result<Bitmap, PixError> {
        let plan = DownscalePlan::new(
            source.dimensions(),
            (target_width, target_height),
            aspect_preserving,
        )?;
        self.execute(source, &plan, smoothing)
    }

    pub fn downscale_request(&self, request: &DownscaleRequest<'_>) -> Result<Bitmap, PixError> {
        self.downscale(
            request.source,
            request.target_width,
            request.target_height,
            request.aspect_preserving,
            request.smoothing,
        )
    }

    /// Run a precomputed plan. Fails as a whole; no partial bitmap escapes.
    #[tracing::instrument(level = "info", skip(self, source, plan), fields(steps = plan.steps.len()))]
    pub fn execute(
        &self,
        source: &Bitmap,
        plan: &DownscalePlan,
        smoothing: SmoothingPolicy,
    ) -> Result<Bitmap, PixError> {
        let span = span!(
            Level::INFO,
            "stepped_downscale",
            from_w = plan.source.0,
            from_h = plan.source.1,
            to_w = plan.target.0,
            to_h = plan.target.1
        );
        let _guard = span.enter();

        if plan.source != source.dimensions() {
            return Err(PixError::invalid_argument(format!(
                "plan was built for {}×{} but source is {}×{}",
                plan.source.0,
                plan.source.1,
                source.width(),
                source.height()
            )));
        }

        let start_time = std::time::Instant::now();
        let (first_w, first_h) = plan.steps.first().copied().unwrap_or(plan.target);

        // one working surface, resized for every pass
        let mut surface = self.provider.acquire(first_w, first_h)?;
        let mut working = source.clone();

        for (step_idx, &(width, height)) in plan.steps.iter().enumerate() {
            render_pass(&mut surface, &working, width, height, smoothing)?;
            working = surface.snapshot();

            debug!(
                stage = "downscale",
                step = step_idx,
                width = width,
                height = height,
                "Halving pass completed"
            );
        }

        let (target_w, target_h) = plan.target;
        render_pass(&mut surface, &working, target_w, target_h, smoothing)?;
        let output = surface.snapshot();

        info!(
            stage = "downscale",
            steps = plan.steps.len(),
            smoothing = smoothing.as_str(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Downscale completed"
        );

        Ok(output)
    }
}

fn render_pass<S: RenderSurface>(
    surface: &mut S,
    source: &Bitmap,
    width: u32,
    height: u32,
    smoothing: SmoothingPolicy,
) -> Result<(), PixError> {
    surface.resize(width, height)?;
    surface.set_smoothing(smoothing);
    surface.draw_bitmap(source, 0, 0, width, height);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let bitmap = Bitmap::solid(4, 4, [0, 0, 0, 255]).unwrap();
        let request = DownscaleRequest::new(&bitmap, 2, 2)
            .with_aspect_preserving(true)
            .with_smoothing(SmoothingPolicy::High);

        assert!(request.aspect_preserving);
        assert_eq!(request.smoothing, SmoothingPolicy::High);
        assert_eq!(
            SteppedDownscaler::new().downscale_request(&request).unwrap().dimensions(),
            (2, 2)
        );
    }

    #[test]
    fn test_execute_rejects_mismatched_plan() {
        let bitmap = Bitmap::solid(4, 4, [0, 0, 0, 255]).unwrap();
        let plan = DownscalePlan::new((8, 8), (2, 2), false).unwrap();
        let err = SteppedDownscaler::new()
            .execute(&bitmap, &plan, SmoothingPolicy::Medium)
            .unwrap_err();
        assert_eq!(err.code(), "E_INVALID_ARGUMENT");
    }
}
