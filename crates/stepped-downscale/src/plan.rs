//! Dimension arithmetic for stepped downscaling.

use common_types::PixError;

/// Number of halving passes needed before the final resize.
///
/// Zero unless the source is more than twice as wide as the target, in which
/// case it is `ceil(log2(source / target))`.
pub fn step_count(source_width: u32, target_width: u32) -> u32 {
    if target_width == 0 || source_width as u64 <= 2 * target_width as u64 {
        return 0;
    }
    (source_width as f64 / target_width as f64).log2().ceil() as u32
}

fn scale_len(len: u32, factor: f64) -> u32 {
    ((len as f64 * factor).round() as u32).max(1)
}

/// Final output size for a request.
///
/// Without aspect preservation the target is returned as is. With it, the axis
/// with the smaller scale factor constrains and the other one is recomputed
/// proportionally.
pub fn resolve_target(
    source: (u32, u32),
    target: (u32, u32),
    aspect_preserving: bool,
) -> Result<(u32, u32), PixError> {
    let (target_width, target_height) = target;
    if target_width == 0 || target_height == 0 {
        return Err(PixError::invalid_argument(format!(
            "target dimensions must be positive, got {target_width}×{target_height}"
        )));
    }

    let (source_width, source_height) = source;
    if source_width == 0 || source_height == 0 {
        return Err(PixError::invalid_argument("source bitmap has no pixels"));
    }

    if !aspect_preserving {
        return Ok(target);
    }

    let scale_x = target_width as f64 / source_width as f64;
    let scale_y = target_height as f64 / source_height as f64;

    if scale_x <= scale_y {
        Ok((target_width, scale_len(source_height, scale_x)))
    } else {
        Ok((scale_len(source_width, scale_y), target_height))
    }
}

/// Shrink `source` to fit optional width / height caps.
///
/// The width cap is applied first (only when the source is wider), then the
/// height cap against the possibly already reduced height. A cap of zero is
/// treated as absent. The result never grows the image.
pub fn fit_within(
    source: (u32, u32),
    max_width: Option<u32>,
    max_height: Option<u32>,
    preserve_aspect_ratio: bool,
) -> (u32, u32) {
    let (source_width, source_height) = source;
    let mut width = source_width as f64;
    let mut height = source_height as f64;

    if let Some(max_w) = max_width.filter(|&w| w > 0) {
        if source_width > max_w {
            width = max_w as f64;
            if preserve_aspect_ratio {
                height = source_height as f64 * max_w as f64 / source_width as f64;
            }
        }
    }

    if let Some(max_h) = max_height.filter(|&h| h > 0) {
        let max_h = max_h as f64;
        if height > max_h {
            if preserve_aspect_ratio {
                width = width * max_h / height;
            }
            height = max_h;
        }
    }

    (
        (width.round() as u32).max(1),
        (height.round() as u32).max(1),
    )
}

/// Every intermediate size a downscale goes through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownscalePlan {
    pub source: (u32, u32),
    /// Halving passes, in order
    pub steps: Vec<(u32, u32)>,
    /// Exact output size of the final direct render
    pub target: (u32, u32),
}

impl DownscalePlan {
    pub fn new(source: (u32, u32), target: (u32, u32), aspect_preserving: bool) -> Result<Self, PixError> {
        let target = resolve_target(source, target, aspect_preserving)?;

        let mut steps = Vec::new();
        let (mut width, mut height) = source;
        for _ in 0..step_count(source.0, target.0) {
            // integer halving, kept at 1 px so every pass has a drawable surface
            width = (width / 2).max(1);
            height = (height / 2).max(1);
            steps.push((width, height));
        }

        Ok(Self { source, steps, target })
    }

    pub fn step_count(&self) -> u32 {
        self.steps.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_count_thresholds() {
        assert_eq!(step_count(1000, 500), 0);
        assert_eq!(step_count(1001, 500), 2);
        assert_eq!(step_count(4000, 500), 3);
        assert_eq!(step_count(4000, 600), 3);
        assert_eq!(step_count(300, 500), 0);
        assert_eq!(step_count(4096, 1), 12);
    }

    #[test]
    fn test_plan_halving_progression() {
        let plan = DownscalePlan::new((4000, 4000), (500, 500), false).unwrap();
        assert_eq!(plan.steps, vec![(2000, 2000), (1000, 1000), (500, 500)]);
        assert_eq!(plan.target, (500, 500));
        assert_eq!(plan.step_count(), 3);
    }

    #[test]
    fn test_plan_uses_floor_division() {
        let plan = DownscalePlan::new((1001, 333), (100, 33), false).unwrap();
        assert_eq!(plan.steps, vec![(500, 166), (250, 83), (125, 41), (62, 20)]);
        assert_eq!(plan.target, (100, 33));
    }

    #[test]
    fn test_plan_never_reaches_zero() {
        let plan = DownscalePlan::new((64, 2), (4, 1), false).unwrap();
        assert_eq!(plan.steps.last(), Some(&(4, 1)));
        assert!(plan.steps.iter().all(|&(w, h)| w >= 1 && h >= 1));
    }

    #[test]
    fn test_resolve_target_aspect() {
        assert_eq!(resolve_target((1600, 900), (800, 900), true).unwrap(), (800, 450));
        assert_eq!(resolve_target((1600, 900), (1600, 300), true).unwrap(), (533, 300));
        assert_eq!(resolve_target((1600, 900), (800, 900), false).unwrap(), (800, 900));
    }

    #[test]
    fn test_resolve_target_rejects_zero() {
        assert!(resolve_target((10, 10), (0, 5), false).is_err());
        assert!(resolve_target((10, 10), (5, 0), true).is_err());
    }

    #[test]
    fn test_aspect_applied_before_stepping() {
        let plan = DownscalePlan::new((1600, 900), (200, 900), true).unwrap();
        assert_eq!(plan.target, (200, 113));
        assert_eq!(plan.steps, vec![(800, 450), (400, 225), (200, 112)]);
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within((1600, 900), Some(800), None, true), (800, 450));
        assert_eq!(fit_within((1600, 900), Some(800), None, false), (800, 900));
        assert_eq!(fit_within((1600, 900), None, Some(300), true), (533, 300));
        assert_eq!(fit_within((1600, 900), Some(800), Some(300), true), (533, 300));
        assert_eq!(fit_within((400, 300), Some(800), Some(600), true), (400, 300));
        assert_eq!(fit_within((400, 300), Some(0), Some(0), true), (400, 300));
    }
}
