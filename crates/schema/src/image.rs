use crate::errors::SchemaError;
use serde::{Deserialize, Serialize};

/// Channel count of every [`CanonicalImage`].
pub const RGB_CHANNELS: u8 = 3;

/// Decoded, channel-normalized pixel buffer (interleaved RGB, row-major).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl CanonicalImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, SchemaError> {
        if width == 0 || height == 0 {
            return Err(SchemaError::ZeroArea { width, height });
        }

        let expected = width as usize * height as usize * RGB_CHANNELS as usize;
        if pixels.len() != expected {
            return Err(SchemaError::PixelBufferMismatch {
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        RGB_CHANNELS
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            width: self.width,
            height: self.height,
            channels: RGB_CHANNELS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}
