use schema::{
    BatchItemResult, BatchReport, BatchResponse, DegradedBatch, DegradedPrediction, Detection,
    Formatted, ImageInfo, PredictionResult, SingleReport,
};
use std::time::Duration;

/// Builds response payloads. Never fails: faults come back as the degraded variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseAggregator;

impl ResponseAggregator {
    pub fn format_single(
        &self,
        detections: Vec<Detection>,
        duration: Duration,
        image_info: ImageInfo,
        threshold: f64,
    ) -> SingleReport {
        match PredictionResult::new(detections, duration, image_info, threshold) {
            Ok(result) => Formatted::Complete(result),
            Err(e) => {
                tracing::warn!(error = %e, "Response formatting failed");
                Formatted::Degraded(DegradedPrediction::new(format!(
                    "Response formatting failed: {e}"
                )))
            }
        }
    }

    /// Summarizes `items`, which must already be in submission order.
    pub fn format_batch(&self, items: Vec<BatchItemResult>) -> BatchReport {
        match BatchResponse::from_items(items) {
            Ok(response) => Formatted::Complete(response),
            Err((e, items)) => {
                tracing::warn!(error = %e, "Batch formatting failed");
                Formatted::Degraded(DegradedBatch::new(
                    items,
                    format!("Batch formatting failed: {e}"),
                ))
            }
        }
    }
}
