use serde::Deserialize;

/// Model input size (width, height) used when nothing else is configured.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

/// Fill value for the padding added around a letterboxed image.
pub const LETTERBOX_COLOR: u8 = 114;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Pixel normalization expected by the exported model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// `value / 255`, the convention of YOLO and RT-DETR exports.
    #[default]
    Unit,
    /// `(value / 255 - mean) / std` with the ImageNet statistics.
    ImageNet,
}
