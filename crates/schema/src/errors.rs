use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Image dimensions must be non-zero, got {width}x{height}")]
    ZeroArea { width: u32, height: u32 },

    #[error("Pixel buffer size mismatch: expected {expected} bytes, got {actual}")]
    PixelBufferMismatch { expected: usize, actual: usize },

    #[error("Detection {index} is invalid: {reason}")]
    InvalidDetection { index: usize, reason: String },

    #[error("Aggregate overflow while summing {field}")]
    Overflow { field: &'static str },
}
