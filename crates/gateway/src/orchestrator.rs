use crate::{
    aggregator::ResponseAggregator, decoder::ImageDecoder, error::ServiceError,
    filter::DetectionFilter, validation::ImageValidator,
};
use axum::body::Bytes;
use image::ImageFormat;
use inference::{Device, ModelClient};
use opentelemetry::{KeyValue, global, metrics::Counter};
use schema::{BatchItemResult, BatchReport, Formatted, SingleReport};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl RawUpload {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, bytes: Bytes) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            bytes,
        }
    }
}

/// Last step an image got through in the single-image flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Validated,
    Decoded,
    Inferred,
    Formatted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Validated => "validated",
            Stage::Decoded => "decoded",
            Stage::Inferred => "inferred",
            Stage::Formatted => "formatted",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub confidence_threshold: f64,
    pub max_batch_size: usize,
    pub max_file_size_mb: usize,
    pub inference_timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub device: Device,
    pub loaded: bool,
    pub confidence_threshold: f64,
    pub input_size: [u32; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitsSummary {
    pub max_batch_size: usize,
    pub max_file_size_mb: usize,
    pub confidence_threshold: f64,
    pub inference_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub service_status: &'static str,
    pub model_info: ModelSummary,
    pub config: LimitsSummary,
}

struct GatewayMetrics {
    requests: Counter<u64>,
    failures: Counter<u64>,
    batch_items: Counter<u64>,
}

fn init_metrics(meter_name: &'static str) -> GatewayMetrics {
    let meter = global::meter(meter_name);
    GatewayMetrics {
        requests: meter
            .u64_counter("gateway_requests_total")
            .with_description("Prediction requests received")
            .build(),
        failures: meter
            .u64_counter("gateway_request_failures_total")
            .with_description("Prediction requests answered with an error")
            .build(),
        batch_items: meter
            .u64_counter("gateway_batch_items_total")
            .with_description("Batch items processed, by outcome")
            .build(),
    }
}

/// Sequences validation, decoding, inference, filtering and formatting for each
/// upload, and fans batches out into isolated per-item tasks.
pub struct RequestOrchestrator {
    model: Arc<ModelClient>,
    validator: ImageValidator,
    decoder: ImageDecoder,
    filter: DetectionFilter,
    aggregator: ResponseAggregator,
    settings: OrchestratorSettings,
    metrics: GatewayMetrics,
}

impl RequestOrchestrator {
    pub fn new(
        model: Arc<ModelClient>,
        validator: ImageValidator,
        decoder: ImageDecoder,
        filter: DetectionFilter,
        aggregator: ResponseAggregator,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            model,
            validator,
            decoder,
            filter,
            aggregator,
            settings,
            metrics: init_metrics("gateway"),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_loaded()
    }

    pub fn check_ready(&self) -> Result<(), ServiceError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(ServiceError::NotReady)
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.settings.max_batch_size
    }

    pub fn service_info(&self) -> ServiceInfo {
        let model = self.model.model_info();
        ServiceInfo {
            service_status: if model.loaded { "ready" } else { "not_ready" },
            model_info: ModelSummary {
                name: model.name,
                device: model.device,
                loaded: model.loaded,
                confidence_threshold: self.settings.confidence_threshold,
                input_size: model.input_size,
            },
            config: LimitsSummary {
                max_batch_size: self.settings.max_batch_size,
                max_file_size_mb: self.settings.max_file_size_mb,
                confidence_threshold: self.settings.confidence_threshold,
                inference_timeout_ms: self.settings.inference_timeout.as_millis() as u64,
            },
        }
    }

    pub async fn predict_single(&self, upload: RawUpload) -> Result<SingleReport, ServiceError> {
        let kind = [KeyValue::new("kind", "single")];
        self.metrics.requests.add(1, &kind);

        let outcome = match self.check_ready() {
            Ok(()) => self.process(upload).await,
            Err(e) => Err(e),
        };

        if outcome.is_err() {
            self.metrics.failures.add(1, &kind);
        }
        outcome
    }

    /// Runs every upload through the single-image flow concurrently.
    ///
    /// Item failures stay in their slot; results come back in submission order.
    pub async fn predict_batch(
        self: &Arc<Self>,
        uploads: Vec<RawUpload>,
    ) -> Result<BatchReport, ServiceError> {
        let kind = [KeyValue::new("kind", "batch")];
        self.metrics.requests.add(1, &kind);

        if let Err(e) = self.check_batch(uploads.len()) {
            self.metrics.failures.add(1, &kind);
            return Err(e);
        }

        tracing::info!(items = uploads.len(), "Processing batch");

        let handles: Vec<_> = uploads
            .into_iter()
            .enumerate()
            .map(|(index, upload)| {
                let this = Arc::clone(self);
                let filename = upload.filename.clone();
                let span = tracing::info_span!("batch_item", index, filename = %filename);
                let handle =
                    tokio::spawn(async move { this.process(upload).await }.instrument(span));
                (filename, handle)
            })
            .collect();

        let mut items = Vec::with_capacity(handles.len());
        for (filename, handle) in handles {
            let item = match handle.await {
                Ok(outcome) => batch_item(filename, outcome),
                Err(e) => {
                    tracing::error!(filename = %filename, error = %e, "Batch item task failed");
                    BatchItemResult::failure(filename, "Internal server error")
                }
            };

            let outcome = if item.result().is_some() { "success" } else { "failure" };
            self.metrics
                .batch_items
                .add(1, &[KeyValue::new("outcome", outcome)]);
            items.push(item);
        }

        Ok(self.aggregator.format_batch(items))
    }

    fn check_batch(&self, size: usize) -> Result<(), ServiceError> {
        self.check_ready()?;

        if size == 0 {
            return Err(ServiceError::BadRequest("No files provided".to_string()));
        }
        if size > self.settings.max_batch_size {
            return Err(ServiceError::BatchTooLarge {
                size,
                max: self.settings.max_batch_size,
            });
        }
        Ok(())
    }

    async fn process(&self, upload: RawUpload) -> Result<SingleReport, ServiceError> {
        let mut stage = Stage::Pending;
        let outcome = self.advance(&upload, &mut stage).await;

        match &outcome {
            Ok(Formatted::Complete(result)) => tracing::info!(
                filename = %upload.filename,
                total_defects = result.total_defects(),
                inference_time_ms = result.inference_time_ms(),
                "Prediction completed"
            ),
            Ok(Formatted::Degraded(degraded)) => tracing::warn!(
                filename = %upload.filename,
                error = %degraded.error,
                "Prediction completed with a degraded response"
            ),
            Err(e) => tracing::warn!(
                filename = %upload.filename,
                completed = stage.as_str(),
                error = %e,
                "Prediction failed"
            ),
        }

        outcome
    }

    async fn advance(
        &self,
        upload: &RawUpload,
        stage: &mut Stage,
    ) -> Result<SingleReport, ServiceError> {
        let format = self.validator.validate(&upload.bytes, &upload.filename)?;
        log_mime_mismatch(upload, format);
        *stage = Stage::Validated;

        let decoder = self.decoder;
        let bytes = upload.bytes.clone();
        let image = tokio::task::spawn_blocking(move || decoder.decode(&bytes))
            .await
            .map_err(|e| ServiceError::Internal(format!("decode task failed: {e}")))??;
        let image_info = image.info();
        *stage = Stage::Decoded;

        let run = self
            .model
            .predict(image, self.settings.inference_timeout)
            .await?;
        *stage = Stage::Inferred;

        let threshold = self.settings.confidence_threshold;
        let detections = self.filter.filter(run.detections, threshold);
        let report = self
            .aggregator
            .format_single(detections, run.duration, image_info, threshold);
        *stage = Stage::Formatted;

        Ok(report)
    }
}

/// A degraded report counts as a failed item and carries its formatting error.
fn batch_item(filename: String, outcome: Result<SingleReport, ServiceError>) -> BatchItemResult {
    match outcome {
        Ok(Formatted::Complete(result)) => BatchItemResult::success(filename, result),
        Ok(Formatted::Degraded(degraded)) => BatchItemResult::failure(filename, degraded.error),
        Err(e) => BatchItemResult::failure(filename, e.to_string()),
    }
}

/// The declared MIME type is informational only; the detected format wins.
fn log_mime_mismatch(upload: &RawUpload, detected: ImageFormat) {
    let Some(declared) = upload.content_type.as_deref() else {
        return;
    };

    match ImageFormat::from_mime_type(declared) {
        Some(format) if format == detected => {}
        _ => tracing::info!(
            filename = %upload.filename,
            declared,
            detected = ?detected,
            "Declared content type does not match image data"
        ),
    }
}
