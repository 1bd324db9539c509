use crate::error::DecodeError;
use image::GenericImageView;
use schema::{CanonicalImage, SchemaError};

/// Full decode into interleaved 8-bit RGB at native resolution.
///
/// Grayscale is expanded to three equal channels, alpha is dropped and 16-bit or
/// float samples are reduced to 8 bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl ImageDecoder {
    pub fn decode(&self, bytes: &[u8]) -> Result<CanonicalImage, DecodeError> {
        let _s = common::span_debug!("decode_image");

        let decoded =
            image::load_from_memory(bytes).map_err(|e| DecodeError::Corrupt(e.to_string()))?;

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyPixelBuffer);
        }

        let rgb = decoded.into_rgb8();
        CanonicalImage::new(width, height, rgb.into_raw()).map_err(|e| match e {
            SchemaError::ZeroArea { .. } => DecodeError::EmptyPixelBuffer,
            other => DecodeError::Corrupt(other.to_string()),
        })
    }
}
