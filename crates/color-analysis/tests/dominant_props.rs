use color_analysis::DominantColorAnalyzer;
use common_types::Color;
use proptest::prelude::*;
use render_surface::{Bitmap, RasterSurfaceProvider, SurfaceLimits};

fn rgba() -> impl Strategy<Value = [u8; 4]> {
    any::<[u8; 4]>()
}

proptest! {
    #[test]
    fn uniform_buffer_is_one_hundred_percent(px in rgba(), width in 1u32..24, height in 1u32..24) {
        let data: Vec<u8> = std::iter::repeat(px)
            .take((width * height) as usize)
            .flatten()
            .collect();

        let result = DominantColorAnalyzer::new().analyze(&data, width, height).unwrap();
        prop_assert_eq!(result.dominant_color, Color::new(px[0], px[1], px[2]));
        prop_assert_eq!(result.percentage, 100.0);
    }

    #[test]
    fn even_split_goes_to_first_pixel(a in rgba(), b in rgba(), half in 1usize..64, interleave in any::<bool>()) {
        prop_assume!(a[..3] != b[..3]);

        let pixels: Vec<[u8; 4]> = if interleave {
            (0..half).flat_map(|_| [a, b]).collect()
        } else {
            std::iter::repeat(a).take(half).chain(std::iter::repeat(b).take(half)).collect()
        };
        let data: Vec<u8> = pixels.iter().flatten().copied().collect();

        let result = DominantColorAnalyzer::new()
            .analyze(&data, (half * 2) as u32, 1)
            .unwrap();
        prop_assert_eq!(result.dominant_color, Color::new(a[0], a[1], a[2]));
        prop_assert_eq!(result.percentage, 50.0);
    }

    #[test]
    fn analysis_leaves_buffer_untouched(data in proptest::collection::vec(any::<u8>(), 4..256)) {
        let pixel_count = data.len() / 4;
        let data = data[..pixel_count * 4].to_vec();
        let before = data.clone();

        let result = DominantColorAnalyzer::new()
            .analyze(&data, pixel_count as u32, 1)
            .unwrap();
        prop_assert_eq!(&data, &before);
        prop_assert!(result.percentage > 0.0 && result.percentage <= 100.0);
    }

    #[test]
    fn shape_does_not_change_the_answer(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        // same bytes as 1×N and N×1
        let pixel_count = (data.len() / 4).max(1);
        let mut data = data;
        data.resize(pixel_count * 4, 0);

        let analyzer = DominantColorAnalyzer::new();
        let row = analyzer.analyze(&data, pixel_count as u32, 1).unwrap();
        let column = analyzer.analyze(&data, 1, pixel_count as u32).unwrap();
        prop_assert_eq!(row, column);
    }
}

#[test]
fn concrete_two_by_two_scenario() {
    let data = [
        255, 0, 0, 255, //
        255, 0, 0, 255, //
        0, 255, 0, 255, //
        0, 0, 255, 255,
    ];
    let result = DominantColorAnalyzer::new().analyze(&data, 2, 2).unwrap();

    assert_eq!(result.dominant_color.to_hex(), "#ff0000");
    assert_eq!(result.percentage, 50.0);
}

#[test]
fn analyze_bitmap_goes_through_a_surface() {
    let bitmap = Bitmap::solid(5, 3, [10, 20, 30, 255]).unwrap();
    let result = DominantColorAnalyzer::new()
        .analyze_bitmap(&RasterSurfaceProvider::new(), &bitmap)
        .unwrap();

    assert_eq!(result.dominant_color, Color::new(10, 20, 30));
    assert_eq!(result.percentage, 100.0);
}

#[test]
fn analyze_bitmap_reports_unavailable_surface() {
    let provider = RasterSurfaceProvider::with_limits(SurfaceLimits {
        max_dimension: 4,
        max_area: 16,
    });
    let bitmap = Bitmap::solid(5, 3, [10, 20, 30, 255]).unwrap();
    let err = DominantColorAnalyzer::new()
        .analyze_bitmap(&provider, &bitmap)
        .unwrap_err();

    assert_eq!(err.code(), "E_SURFACE_UNAVAILABLE");
}
