//! In-memory decode, JPEG encode and metadata queries.
//!
//! All functions work on byte slices; reading and writing files is left
//! to the caller.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageReader};

use crate::raster::CHANNELS;
use crate::types::{ImageMetadata, PipelineError, RgbaImage};

/// MIME type of [`encode_jpeg`] output.
pub const JPEG_MIME: &str = "image/jpeg";

/// Decode PNG, JPEG, BMP or WebP bytes into an RGBA raster.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty, or
/// [`PipelineError::ImageDecode`] if the format is unrecognized or the
/// data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let img = image::load_from_memory(bytes)?;
    Ok(img.into_rgba8())
}

/// Encode the RGB channels of `image` as a baseline JPEG.
///
/// Alpha is discarded. `quality` is clamped to `1..=100`.
///
/// # Errors
///
/// Returns [`PipelineError::Encode`] if the encoder rejects the image
/// (for example a zero-sized raster), or
/// [`PipelineError::ResourceExhausted`] if the RGB copy cannot be
/// allocated.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, PipelineError> {
    let (width, height) = image.dimensions();
    let mut rgb = Vec::new();
    rgb.try_reserve_exact(image.as_raw().len() / CHANNELS * 3)
        .map_err(|_| PipelineError::ResourceExhausted { width, height })?;
    for px in image.as_raw().chunks_exact(CHANNELS) {
        rgb.extend_from_slice(&px[..3]);
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| PipelineError::Encode(e.to_string()))?;
    Ok(out)
}

/// Report the dimensions, byte size and MIME type of an encoded image
/// without decoding its pixels.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty, or
/// [`PipelineError::ImageDecode`] if the format cannot be identified or
/// its header is unreadable.
pub fn image_metadata(bytes: &[u8]) -> Result<ImageMetadata, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    let format = reader.format().ok_or_else(|| {
        image::ImageError::Unsupported(image::error::UnsupportedError::from_format_and_kind(
            image::error::ImageFormatHint::Unknown,
            image::error::UnsupportedErrorKind::Format(image::error::ImageFormatHint::Unknown),
        ))
    })?;
    let (width, height) = reader.into_dimensions()?;
    Ok(ImageMetadata {
        width,
        height,
        byte_size: bytes.len(),
        mime_type: format.to_mime_type().to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn decode_empty_is_empty_input() {
        assert!(matches!(decode(&[]), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn decode_garbage_is_decode_error() {
        assert!(matches!(
            decode(b"definitely not an image"),
            Err(PipelineError::ImageDecode(_))
        ));
    }

    #[test]
    fn decode_png_gives_rgba() {
        let img = decode(&png_bytes(7, 3)).unwrap();
        assert_eq!(img.dimensions(), (7, 3));
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn jpeg_round_trip_keeps_dimensions() {
        let img = RgbaImage::from_pixel(16, 9, image::Rgba([200, 100, 50, 10]));
        let bytes = encode_jpeg(&img, 90).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let back = decode(&bytes).unwrap();
        assert_eq!(back.dimensions(), (16, 9));
        // Alpha is dropped by JPEG.
        assert_eq!(back.get_pixel(0, 0).0[3], 255);
    }

    #[test]
    fn higher_quality_is_not_smaller_on_detail() {
        let img = RgbaImage::from_fn(64, 64, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x * 31) ^ (y * 17)) as u8;
            image::Rgba([v, v.wrapping_mul(3), v.wrapping_add(90), 255])
        });
        let low = encode_jpeg(&img, 30).unwrap();
        let high = encode_jpeg(&img, 98).unwrap();
        assert!(high.len() > low.len());
    }

    #[test]
    fn metadata_reports_png() {
        let bytes = png_bytes(12, 5);
        let meta = image_metadata(&bytes).unwrap();
        assert_eq!(
            meta,
            ImageMetadata {
                width: 12,
                height: 5,
                byte_size: bytes.len(),
                mime_type: "image/png".to_owned(),
            }
        );
    }

    #[test]
    fn metadata_unknown_format_errors() {
        assert!(matches!(
            image_metadata(b"????????????"),
            Err(PipelineError::ImageDecode(_))
        ));
        assert!(matches!(image_metadata(&[]), Err(PipelineError::EmptyInput)));
    }
}
