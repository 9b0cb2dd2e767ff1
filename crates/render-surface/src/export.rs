use common_types::{OutputFormat, PixError};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use tracing::debug;

/// Encode an RGBA image. `quality` is in `[0, 1]` and only affects JPEG.
pub fn encode_rgba(image: &RgbaImage, format: OutputFormat, quality: f32) -> Result<Vec<u8>, PixError> {
    if !(0.0..=1.0).contains(&quality) {
        return Err(PixError::invalid_argument(format!(
            "export quality must be within 0..=1, got {quality}"
        )));
    }

    let (width, height) = image.dimensions();
    let mut out = Vec::new();

    let result = match format {
        OutputFormat::Png => PngEncoder::new(&mut out).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        OutputFormat::Webp => WebPEncoder::new_lossless(&mut out).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        OutputFormat::Jpeg => {
            let rgb = flatten_onto_black(image);
            JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality)).write_image(
                &rgb,
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
    };

    result.map_err(|e| PixError::EncodeFailure {
        message: format!("{} encoding failed: {e}", format.mime_type()),
    })?;

    debug!(
        stage = "export",
        format = format.mime_type(),
        width = width,
        height = height,
        bytes = out.len(),
        "Image exported"
    );

    Ok(out)
}

fn jpeg_quality(quality: f32) -> u8 {
    ((quality * 100.0).round() as u8).clamp(1, 100)
}

/// JPEG has no alpha: composite over opaque black
fn flatten_onto_black(image: &RgbaImage) -> Vec<u8> {
    image
        .pixels()
        .flat_map(|p| {
            let a = p[3] as u16;
            [
                (p[0] as u16 * a / 255) as u8,
                (p[1] as u16 * a / 255) as u8,
                (p[2] as u16 * a / 255) as u8,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> RgbaImage {
        RgbaImage::from_fn(8, 8, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        })
    }

    #[test]
    fn test_png_export_decodes_back_identically() {
        let img = checker();
        let bytes = encode_rgba(&img, OutputFormat::Png, 1.0).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");

        let back = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(back, img);
    }

    #[test]
    fn test_jpeg_and_webp_signatures() {
        let img = checker();
        let jpeg = encode_rgba(&img, OutputFormat::Jpeg, 0.8).unwrap();
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);

        let webp = encode_rgba(&img, OutputFormat::Webp, 0.8).unwrap();
        assert_eq!(&webp[0..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[test]
    fn test_quality_out_of_range() {
        let err = encode_rgba(&checker(), OutputFormat::Jpeg, 1.5).unwrap_err();
        assert_eq!(err.code(), "E_INVALID_ARGUMENT");
    }

    #[test]
    fn test_jpeg_quality_mapping() {
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(0.8), 80);
        assert_eq!(jpeg_quality(1.0), 100);
    }

    #[test]
    fn test_transparent_pixels_flatten_to_black() {
        let img = RgbaImage::from_pixel(1, 1, image::Rgba([200, 100, 50, 0]));
        assert_eq!(flatten_onto_black(&img), vec![0, 0, 0]);
    }
}
