pub mod config;
pub mod cpu;

use ndarray::{Array, IxDyn};
use schema::CanonicalImage;

pub use config::{DEFAULT_INPUT_SIZE, Normalization};
pub use cpu::CpuPreProcessor;

/// Result of preprocessing including transformation parameters
#[derive(Debug)]
pub struct PreprocessResult {
    /// NCHW tensor `[1, 3, input_height, input_width]`
    pub data: Array<f32, IxDyn>,
    /// Letterbox geometry needed to map boxes back to the source image
    pub transform: TransformParams,
}

/// Geometry of a letterbox operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub input_width: u32,
    pub input_height: u32,
    /// Scale factor applied during letterboxing
    pub scale: f32,
    /// X offset from letterboxing (in pixels)
    pub offset_x: f32,
    /// Y offset from letterboxing (in pixels)
    pub offset_y: f32,
}

impl TransformParams {
    /// Maps a point from model-input space back to source-image pixels,
    /// clamped to the source bounds.
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let ox = ((x - self.offset_x) / self.scale)
            .max(0.0)
            .min(self.orig_width as f32);
        let oy = ((y - self.offset_y) / self.scale)
            .max(0.0)
            .min(self.orig_height as f32);
        (ox, oy)
    }
}

/// Trait for image preprocessing implementations
pub trait Preprocess {
    /// Resize, letterbox and normalize an image for inference
    fn preprocess(&mut self, image: &CanonicalImage) -> anyhow::Result<PreprocessResult>;

    /// Get the input size this preprocessor targets
    fn input_size(&self) -> (u32, u32);
}
