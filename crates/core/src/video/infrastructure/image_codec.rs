use std::io::Cursor;

use thiserror::Error;

use crate::shared::frame::{Frame, FrameError};

#[derive(Error, Debug)]
pub enum ImageCodecError {
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("decoded image is empty")]
    Empty,
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("could not encode JPEG: {0}")]
    Encode(#[source] image::ImageError),
}

/// Decodes any format the `image` crate recognises into an RGB frame.
///
/// Alpha is dropped and greyscale is expanded, so every frame has three channels.
pub fn decode_image(bytes: &[u8]) -> Result<Frame, ImageCodecError> {
    let rgb = image::load_from_memory(bytes)
        .map_err(ImageCodecError::Decode)?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(ImageCodecError::Empty);
    }
    Ok(Frame::new(rgb.into_raw(), width, height, 0)?)
}

/// Encodes a frame as baseline JPEG at `quality` (1..=100).
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, ImageCodecError> {
    let mut buf = Cursor::new(Vec::new());
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode(
            frame.data(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(ImageCodecError::Encode)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_png_drops_alpha() {
        let frame = decode_image(&png_bytes(4, 3, [10, 20, 30, 128])).unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 3));
        assert_eq!(frame.pixel(2, 1), [10, 20, 30]);
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(matches!(
            decode_image(b"not an image at all"),
            Err(ImageCodecError::Decode(_))
        ));
    }

    #[test]
    fn test_encode_jpeg_produces_decodable_jpeg() {
        let frame = Frame::filled(16, 8, [200, 100, 50]);
        let bytes = encode_jpeg(&frame, 90).unwrap();
        assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);

        let back = decode_image(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (16, 8));
        let [r, g, b] = back.pixel(8, 4);
        assert!((r as i32 - 200).abs() <= 6);
        assert!((g as i32 - 100).abs() <= 6);
        assert!((b as i32 - 50).abs() <= 6);
    }
}
