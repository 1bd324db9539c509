use crate::image::ImageInfo;
use serde::{Deserialize, Serialize};

/// One row of detector output, mapped into original-image pixel space but not yet
/// validated or thresholded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: i64,
    /// `None` when `class_id` is not in the label table.
    pub class_name: Option<String>,
    pub confidence: f32,
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

/// Everything the detector produced for one image.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDetections {
    /// Rows in the detector's native emission order.
    Rows(Vec<RawDetection>),
    /// The output tensors could not be interpreted at all.
    Unreadable { reason: String },
}

impl RawDetections {
    pub fn len(&self) -> usize {
        match self {
            RawDetections::Rows(rows) => rows.len(),
            RawDetections::Unreadable { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

impl Detection {
    /// Checks the invariants of a detection against the image it was found in.
    pub fn check(&self, image: &ImageInfo) -> Result<(), String> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0, 1]", self.confidence));
        }

        let b = &self.bounding_box;
        if b.x_min > b.x_max || b.y_min > b.y_max {
            return Err(format!(
                "inverted box ({}, {}, {}, {})",
                b.x_min, b.y_min, b.x_max, b.y_max
            ));
        }
        if b.x_max > image.width || b.y_max > image.height {
            return Err(format!(
                "box ({}, {}, {}, {}) exceeds image {}x{}",
                b.x_min, b.y_min, b.x_max, b.y_max, image.width, image.height
            ));
        }

        Ok(())
    }
}
