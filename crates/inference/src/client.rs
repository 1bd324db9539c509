use crate::{
    backend::{Device, InferenceBackend},
    config::ModelConfig,
    errors::InferenceError,
    postprocessing::decode_detections,
};
use common::{retry_with_backoff, span};
use ndarray::{Array, IxDyn};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use preprocess::{CpuPreProcessor, Preprocess};
use schema::{CanonicalImage, RawDetections};
use serde::Serialize;
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// Outcome of one successful `predict` call.
#[derive(Debug)]
pub struct InferenceRun {
    pub detections: RawDetections,
    pub duration: Duration,
    /// Set when `duration` exceeded the requested timeout.
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub device: Device,
    pub loaded: bool,
    pub input_size: [u32; 2],
}

/// Backend plus the preprocessing buffers sized for it.
struct LoadedModel {
    backend: Box<dyn InferenceBackend>,
    preprocessor: CpuPreProcessor,
}

impl LoadedModel {
    fn run(
        &mut self,
        image: &CanonicalImage,
        class_names: &[String],
    ) -> anyhow::Result<RawDetections> {
        let prepared = self.preprocessor.preprocess(image)?;

        let (width, height) = self.preprocessor.input_size();
        let target_sizes =
            Array::from_shape_vec(IxDyn(&[1, 2]), vec![width as i64, height as i64])?;

        let output = {
            let _s = span!("model_inference");
            self.backend.infer(&prepared.data, &target_sizes)?
        };

        Ok(decode_detections(
            &output,
            &prepared.transform,
            class_names,
        ))
    }
}

struct ClientMetrics {
    duration: Histogram<f64>,
    timeouts: Counter<u64>,
    failures: Counter<u64>,
    raw_detections: Counter<u64>,
}

fn init_metrics(meter_name: &'static str) -> ClientMetrics {
    let meter = global::meter(meter_name);
    let latency_buckets = [
        0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0, 10.0,
        30.0,
    ];
    ClientMetrics {
        duration: meter
            .f64_histogram("inference_duration_seconds")
            .with_description("Time to run one image (resize + infer + decode)")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build(),
        timeouts: meter
            .u64_counter("inference_timeouts_total")
            .with_description("Inferences that overran the soft timeout")
            .build(),
        failures: meter
            .u64_counter("inference_failures_total")
            .with_description("Inferences that failed")
            .build(),
        raw_detections: meter
            .u64_counter("inference_detections_total")
            .with_description("Raw detections produced before thresholding")
            .build(),
    }
}

/// Capability boundary to the detector.
///
/// The loaded model is the only process-wide state. Calls are serialized behind a
/// mutex and run on the blocking pool; readiness is tracked separately so checking
/// it never waits on a running inference.
pub struct ModelClient {
    config: ModelConfig,
    class_names: Arc<[String]>,
    slot: Arc<Mutex<Option<LoadedModel>>>,
    loaded: AtomicBool,
    metrics: ClientMetrics,
}

impl ModelClient {
    pub fn new(config: ModelConfig) -> Self {
        let class_names = config.class_names.clone().into();
        Self {
            config,
            class_names,
            slot: Arc::new(Mutex::new(None)),
            loaded: AtomicBool::new(false),
            metrics: init_metrics("inference"),
        }
    }

    /// Loads `B` from the configured path, retrying with backoff. Blocking.
    pub fn load<B: InferenceBackend + 'static>(&self) -> anyhow::Result<()> {
        tracing::info!(
            model = %self.config.name,
            path = %self.config.model_path,
            device = self.config.device.as_str(),
            "Loading inference model"
        );

        let backend = retry_with_backoff(
            || B::load_model(&self.config.model_path, self.config.device),
            self.config.load_retries,
            self.config.load_retry_delay_ms,
            "Model load",
        )?;

        self.install(Box::new(backend));
        Ok(())
    }

    /// Makes an already constructed backend the active model.
    pub fn install(&self, backend: Box<dyn InferenceBackend>) {
        let preprocessor = CpuPreProcessor::with_normalization(
            self.config.input_size,
            self.config.normalization,
        );

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(LoadedModel {
            backend,
            preprocessor,
        });
        self.loaded.store(true, Ordering::Release);

        tracing::info!(model = %self.config.name, "Model loaded successfully");
    }

    /// Tears the model down. Waits for an in-flight inference to finish.
    pub fn unload(&self) {
        self.loaded.store(false, Ordering::Release);
        let previous = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if previous.is_some() {
            tracing::info!(model = %self.config.name, "Model unloaded");
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: self.config.name.clone(),
            device: self.config.device,
            loaded: self.is_loaded(),
            input_size: [self.config.input_size.0, self.config.input_size.1],
        }
    }

    /// Runs the detector on one image.
    ///
    /// `timeout` is soft: an overrun is logged and flagged on the returned run,
    /// the result is still delivered.
    pub async fn predict(
        &self,
        image: CanonicalImage,
        timeout: Duration,
    ) -> Result<InferenceRun, InferenceError> {
        if !self.is_loaded() {
            return Err(InferenceError::ModelNotLoaded);
        }

        let slot = Arc::clone(&self.slot);
        let class_names = Arc::clone(&self.class_names);

        let joined = tokio::task::spawn_blocking(move || {
            let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            let model = guard.as_mut().ok_or(InferenceError::ModelNotLoaded)?;

            let start = Instant::now();
            let detections = model.run(&image, &class_names).map_err(|e| {
                tracing::error!(error = ?e, "Inference failed");
                InferenceError::Failed(e.to_string())
            })?;

            Ok::<_, InferenceError>((detections, start.elapsed()))
        })
        .await;

        let (detections, duration) = match joined {
            Ok(Ok(run)) => run,
            Ok(Err(e)) => {
                self.metrics.failures.add(1, &[]);
                return Err(e);
            }
            Err(e) => {
                tracing::error!(error = %e, "Inference task did not complete");
                self.metrics.failures.add(1, &[]);
                return Err(InferenceError::Failed(
                    "inference task did not complete".to_string(),
                ));
            }
        };

        let device = [KeyValue::new("device", self.config.device.as_str())];
        self.metrics
            .duration
            .record(duration.as_secs_f64(), &device);
        self.metrics
            .raw_detections
            .add(detections.len() as u64, &device);

        let timed_out = duration > timeout;
        if timed_out {
            self.metrics.timeouts.add(1, &device);
            tracing::warn!(
                elapsed_ms = duration.as_millis() as u64,
                timeout_ms = timeout.as_millis() as u64,
                "Inference exceeded timeout"
            );
        }

        tracing::debug!(
            rows = detections.len(),
            elapsed_ms = duration.as_millis() as u64,
            "Inference completed"
        );

        Ok(InferenceRun {
            detections,
            duration,
            timed_out,
        })
    }
}

impl Drop for ModelClient {
    fn drop(&mut self) {
        self.unload();
    }
}
