use super::{Device, InferenceBackend, InferenceOutput};
use anyhow::Context;
use ndarray::{Array, IxDyn};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};

/// ONNX Runtime session for RT-DETR style exports
/// (`images`, `orig_target_sizes` -> `labels`, `boxes`, `scores`).
pub struct OrtBackend {
    session: Session,
}

impl InferenceBackend for OrtBackend {
    fn load_model(path: &str, device: Device) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        match device {
            Device::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            Device::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder
            .commit_from_file(path)
            .with_context(|| format!("failed to load model from {}", path))?;

        tracing::info!("Model loaded from {}", path);
        Ok(Self { session })
    }

    fn infer(
        &mut self,
        images: &Array<f32, IxDyn>,
        target_sizes: &Array<i64, IxDyn>,
    ) -> anyhow::Result<InferenceOutput> {
        let outputs = self.session.run(ort::inputs![
            "images" => TensorRef::from_array_view(images.view())?,
            "orig_target_sizes" => TensorRef::from_array_view(target_sizes.view())?
        ])?;

        let labels = outputs["labels"].try_extract_array::<i64>()?;
        let boxes = outputs["boxes"].try_extract_array::<f32>()?;
        let scores = outputs["scores"].try_extract_array::<f32>()?;

        Ok(InferenceOutput {
            labels: labels.into_owned(),
            boxes: boxes.into_owned(),
            scores: scores.into_owned(),
        })
    }
}
