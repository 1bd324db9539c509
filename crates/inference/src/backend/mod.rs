use ndarray::{Array, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Where the model runs. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }

    pub fn from_gpu_flag(enable_gpu: bool) -> Self {
        if enable_gpu { Device::Cuda } else { Device::Cpu }
    }
}

/// An end-to-end detector runtime (boxes already decoded, no NMS needed).
///
/// Implementations may hold non-reentrant session state; the client serializes
/// every call behind a mutex.
pub trait InferenceBackend: Send {
    fn load_model(path: &str, device: Device) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run inference on an NCHW batch of one.
    ///
    /// `target_sizes` is `[1, 2]` holding `(width, height)` of the space the boxes
    /// should be reported in.
    fn infer(
        &mut self,
        images: &Array<f32, IxDyn>,
        target_sizes: &Array<i64, IxDyn>,
    ) -> anyhow::Result<InferenceOutput>;
}

#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub labels: ArrayD<i64>, // [1, N] class ids
    pub boxes: ArrayD<f32>,  // [1, N, 4] xyxy in target-size pixels
    pub scores: ArrayD<f32>, // [1, N] confidence
}

impl InferenceOutput {
    /// Builds an output tensor set from `(label, score, [x1, y1, x2, y2])` rows.
    pub fn from_rows(rows: &[(i64, f32, [f32; 4])]) -> anyhow::Result<Self> {
        let n = rows.len();
        let labels = rows.iter().map(|r| r.0).collect();
        let scores = rows.iter().map(|r| r.1).collect();
        let boxes = rows.iter().flat_map(|r| r.2).collect();

        Ok(Self {
            labels: Array::from_shape_vec(IxDyn(&[1, n]), labels)?,
            boxes: Array::from_shape_vec(IxDyn(&[1, n, 4]), boxes)?,
            scores: Array::from_shape_vec(IxDyn(&[1, n]), scores)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_builds_consistent_shapes() {
        let output = InferenceOutput::from_rows(&[
            (0, 0.9, [1.0, 2.0, 3.0, 4.0]),
            (4, 0.2, [5.0, 6.0, 7.0, 8.0]),
        ])
        .unwrap();

        assert_eq!(output.labels.shape(), &[1, 2]);
        assert_eq!(output.boxes.shape(), &[1, 2, 4]);
        assert_eq!(output.scores.shape(), &[1, 2]);
        assert_eq!(output.boxes[[0, 1, 2]], 7.0);
        assert_eq!(output.labels[[0, 1]], 4);
    }

    #[test]
    fn device_from_gpu_flag() {
        assert_eq!(Device::from_gpu_flag(false).as_str(), "cpu");
        assert_eq!(Device::from_gpu_flag(true).as_str(), "cuda");
    }
}
