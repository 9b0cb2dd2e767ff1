use common_types::{check_rgba_len, Color, ColorFrequencyResult, PixError, CHANNELS_PER_PIXEL};
use render_surface::{Bitmap, RenderSurface, SurfaceProvider};
use std::collections::HashMap;
use tracing::{debug, info, span, Level};

/// Exact-color histogram in first-seen order
#[derive(Debug, Clone, Default)]
pub struct ColorCounts {
    entries: Vec<(Color, u64)>,
    index: HashMap<u32, usize>,
    total: u64,
}

impl ColorCounts {
    fn record(&mut self, color: Color) {
        self.total += 1;
        match self.index.get(&color.packed()) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.index.insert(color.packed(), self.entries.len());
                self.entries.push((color, 1));
            }
        }
    }

    /// Number of distinct colors seen
    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count_of(&self, color: Color) -> u64 {
        self.index
            .get(&color.packed())
            .map_or(0, |&slot| self.entries[slot].1)
    }

    /// Colors with their counts, in order of first occurrence
    pub fn iter(&self) -> impl Iterator<Item = (Color, u64)> + '_ {
        self.entries.iter().copied()
    }

    /// Highest count; ties go to the color seen first
    pub fn dominant(&self) -> Option<(Color, u64)> {
        let mut best: Option<(Color, u64)> = None;
        for &(color, count) in &self.entries {
            if best.map_or(true, |(_, max)| count > max) {
                best = Some((color, count));
            }
        }
        best
    }

    /// Share of `color` in `[0, 100]`
    pub fn percentage_of(&self, color: Color) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count_of(color) as f64 / self.total as f64 * 100.0
    }
}

/// Single-pass most-frequent-color scan over RGBA pixel buffers
#[derive(Debug, Clone, Copy, Default)]
pub struct DominantColorAnalyzer;

impl DominantColorAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Count every exact RGB value; alpha is ignored
    pub fn color_counts(&self, buffer: &[u8], width: u32, height: u32) -> Result<ColorCounts, PixError> {
        check_rgba_len(buffer.len(), width, height)?;

        let mut counts = ColorCounts::default();
        for px in buffer.chunks_exact(CHANNELS_PER_PIXEL) {
            counts.record(Color::new(px[0], px[1], px[2]));
        }

        Ok(counts)
    }

    /// Most frequent color of a `width × height` RGBA buffer and its area share
    #[tracing::instrument(level = "debug", skip(self, buffer))]
    pub fn analyze(&self, buffer: &[u8], width: u32, height: u32) -> Result<ColorFrequencyResult, PixError> {
        let span = span!(Level::INFO, "analyze", width = width, height = height);
        let _guard = span.enter();

        let start_time = std::time::Instant::now();
        let counts = self.color_counts(buffer, width, height)?;

        // check_rgba_len guarantees at least one pixel
        let (dominant_color, max_count) = counts.dominant().unwrap_or((Color::BLACK, 0));
        let total_pixels = width as u64 * height as u64;
        let percentage = max_count as f64 / total_pixels as f64 * 100.0;

        debug!(
            stage = "analyze",
            distinct_colors = counts.distinct(),
            max_count = max_count,
            "Color histogram built"
        );

        info!(
            stage = "analyze",
            duration_us = start_time.elapsed().as_micros() as u64,
            dominant = %dominant_color,
            percentage = percentage,
            "Dominant color found"
        );

        Ok(ColorFrequencyResult {
            dominant_color,
            percentage,
        })
    }

    /// Draw `bitmap` onto a fresh surface of its own size, read it back and analyze
    pub fn analyze_bitmap<P: SurfaceProvider>(
        &self,
        provider: &P,
        bitmap: &Bitmap,
    ) -> Result<ColorFrequencyResult, PixError> {
        let (width, height) = bitmap.dimensions();
        let mut surface = provider.acquire(width, height)?;
        surface.draw_bitmap(bitmap, 0, 0, width, height);
        let pixels = surface.read_pixels();
        self.analyze(&pixels, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: [u8; 4] = [255, 0, 0, 255];
    const G: [u8; 4] = [0, 255, 0, 255];
    const B: [u8; 4] = [0, 0, 255, 255];

    fn buffer(pixels: &[[u8; 4]]) -> Vec<u8> {
        pixels.iter().flatten().copied().collect()
    }

    #[test]
    fn test_two_of_four_red() {
        let data = buffer(&[R, R, G, B]);
        let result = DominantColorAnalyzer::new().analyze(&data, 2, 2).unwrap();

        assert_eq!(result.dominant_color.to_hex(), "#ff0000");
        assert_eq!(result.percentage, 50.0);
    }

    #[test]
    fn test_single_pixel_is_full_share() {
        let result = DominantColorAnalyzer::new().analyze(&[12, 34, 56, 0], 1, 1).unwrap();
        assert_eq!(result.dominant_color, Color::new(12, 34, 56));
        assert_eq!(result.percentage, 100.0);
    }

    #[test]
    fn test_alpha_does_not_split_colors() {
        let data = buffer(&[[9, 9, 9, 255], [9, 9, 9, 0], [1, 1, 1, 255]]);
        let counts = DominantColorAnalyzer::new().color_counts(&data, 3, 1).unwrap();

        assert_eq!(counts.distinct(), 2);
        assert_eq!(counts.count_of(Color::new(9, 9, 9)), 2);
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        let analyzer = DominantColorAnalyzer::new();

        let green_first = buffer(&[G, B, B, G]);
        let result = analyzer.analyze(&green_first, 4, 1).unwrap();
        assert_eq!(result.dominant_color, Color::new(0, 255, 0));

        let blue_first = buffer(&[B, G, G, B]);
        let result = analyzer.analyze(&blue_first, 2, 2).unwrap();
        assert_eq!(result.dominant_color, Color::new(0, 0, 255));
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        let analyzer = DominantColorAnalyzer::new();
        let data = buffer(&[R, R, R]);

        assert_eq!(analyzer.analyze(&data, 2, 2).unwrap_err().code(), "E_INVALID_ARGUMENT");
        assert_eq!(analyzer.analyze(&[], 0, 0).unwrap_err().code(), "E_INVALID_ARGUMENT");
        assert_eq!(analyzer.analyze(&data[..11], 3, 1).unwrap_err().code(), "E_INVALID_ARGUMENT");
    }

    #[test]
    fn test_counts_iterate_in_first_seen_order() {
        let data = buffer(&[B, R, B, G, R]);
        let counts = DominantColorAnalyzer::new().color_counts(&data, 5, 1).unwrap();
        let order: Vec<(String, u64)> = counts.iter().map(|(c, n)| (c.to_hex(), n)).collect();

        assert_eq!(
            order,
            vec![
                ("#0000ff".to_string(), 2),
                ("#ff0000".to_string(), 2),
                ("#00ff00".to_string(), 1),
            ]
        );
        assert_eq!(counts.total(), 5);
        assert_eq!(counts.percentage_of(Color::new(0, 255, 0)), 20.0);
    }
}
