use image::{ImageError, ImageReader, RgbImage};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("content is not a recognizable image: {0}")]
    Unrecognized(String),
    #[error("image decoding failed: {0}")]
    Internal(String),
}

impl From<ImageError> for DecodeError {
    fn from(err: ImageError) -> Self {
        match err {
            // Reads come from memory, so an I/O error means truncated content.
            ImageError::Unsupported(_) | ImageError::Decoding(_) | ImageError::IoError(_) => {
                DecodeError::Unrecognized(err.to_string())
            }
            _ => DecodeError::Internal(err.to_string()),
        }
    }
}

/// Decodes raw bytes into an 8-bit RGB image.
///
/// The format comes from the magic bytes alone, never from a filename or a
/// declared content type.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::Internal(e.to_string()))?;

    let format = reader
        .format()
        .ok_or_else(|| DecodeError::Unrecognized("unknown magic bytes".into()))?;
    tracing::debug!("Sniffed image format {:?}", format);

    let image = reader.decode()?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, Rgba};

    fn encode(img: impl Into<DynamicImage>, format: ImageFormat) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        img.into().write_to(&mut cursor, format).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(32, 16, Rgb([255, 0, 0]));
        let decoded = decode_rgb(&encode(img, ImageFormat::Png)).unwrap();
        assert_eq!(decoded.dimensions(), (32, 16));
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_decode_normalizes_rgba_to_rgb() {
        let img = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_pixel(8, 8, Rgba([0, 0, 255, 128]));
        let decoded = decode_rgb(&encode(img, ImageFormat::Png)).unwrap();
        assert_eq!(decoded.get_pixel(3, 3), &Rgb([0, 0, 255]));
    }

    #[test]
    fn test_decode_jpeg() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(64, 64, Rgb([10, 200, 30]));
        let decoded = decode_rgb(&encode(img, ImageFormat::Jpeg)).unwrap();
        assert_eq!(decoded.dimensions(), (64, 64));
    }

    #[test]
    fn test_non_images_are_unrecognized() {
        for payload in [
            &b""[..],
            &b"this is not an image but has .jpg extension"[..],
            &b"<html><h1>I am not a rabbit</h1></html>"[..],
        ] {
            assert!(
                matches!(decode_rgb(payload), Err(DecodeError::Unrecognized(_))),
                "payload {:?} should be unrecognized",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn test_corrupt_png_is_unrecognized() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(32, 32, Rgb([1, 2, 3]));
        let mut bytes = encode(img, ImageFormat::Png);
        bytes.truncate(20);
        assert!(matches!(
            decode_rgb(&bytes),
            Err(DecodeError::Unrecognized(_))
        ));
    }
}
