use crate::{
    aggregator::ResponseAggregator,
    config::Config,
    decoder::ImageDecoder,
    filter::DetectionFilter,
    orchestrator::{OrchestratorSettings, RequestOrchestrator},
    validation::ImageValidator,
};
use inference::ModelClient;
use std::sync::Arc;

/// Room for multipart boundaries and part headers on top of the file payloads.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Request body caps enforced before handlers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimits {
    pub single: usize,
    pub batch: usize,
}

impl BodyLimits {
    pub fn new(max_file_bytes: usize, max_batch_size: usize) -> Self {
        Self {
            single: max_file_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
            batch: max_file_bytes
                .saturating_mul(max_batch_size)
                .saturating_add(MULTIPART_OVERHEAD_BYTES),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RequestOrchestrator>,
    pub limits: BodyLimits,
}

impl AppState {
    /// Wires the pipeline components around an already constructed model client.
    pub fn from_config(config: &Config, model: Arc<ModelClient>) -> Self {
        let orchestrator = RequestOrchestrator::new(
            model,
            ImageValidator::new(config.max_file_size_bytes()),
            ImageDecoder,
            DetectionFilter,
            ResponseAggregator,
            OrchestratorSettings {
                confidence_threshold: config.model.confidence_threshold,
                max_batch_size: config.limits.max_batch_size,
                max_file_size_mb: config.limits.max_file_size_mb,
                inference_timeout: config.inference_timeout(),
            },
        );

        Self {
            orchestrator: Arc::new(orchestrator),
            limits: BodyLimits::new(config.max_file_size_bytes(), config.limits.max_batch_size),
        }
    }
}
