use crate::detection::Detection;
use crate::errors::SchemaError;
use crate::image::ImageInfo;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Either a fully built value or an explicit error-bearing stand-in.
///
/// Serialized untagged, so clients see one of the two payload shapes directly.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Formatted<T, D> {
    Complete(T),
    Degraded(D),
}

impl<T, D> Formatted<T, D> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Formatted::Degraded(_))
    }

    pub fn complete(&self) -> Option<&T> {
        match self {
            Formatted::Complete(value) => Some(value),
            Formatted::Degraded(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, D> {
        match self {
            Formatted::Complete(value) => Ok(value),
            Formatted::Degraded(degraded) => Err(degraded),
        }
    }
}

pub type SingleReport = Formatted<PredictionResult, DegradedPrediction>;
pub type BatchReport = Formatted<BatchResponse, DegradedBatch>;

/// Thresholded detections for one image. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    predictions: Vec<Detection>,
    total_defects: usize,
    inference_time_ms: f64,
    image_info: ImageInfo,
    confidence_threshold: f64,
    timestamp: DateTime<Utc>,
}

impl PredictionResult {
    /// Builds a result, checking every detection against the image bounds.
    ///
    /// Detections keep the order they were given in.
    pub fn new(
        predictions: Vec<Detection>,
        inference_time: Duration,
        image_info: ImageInfo,
        confidence_threshold: f64,
    ) -> Result<Self, SchemaError> {
        for (index, detection) in predictions.iter().enumerate() {
            detection
                .check(&image_info)
                .map_err(|reason| SchemaError::InvalidDetection { index, reason })?;
        }

        Ok(Self {
            total_defects: predictions.len(),
            predictions,
            inference_time_ms: round_ms(inference_time),
            image_info,
            confidence_threshold,
            timestamp: Utc::now(),
        })
    }

    pub fn predictions(&self) -> &[Detection] {
        &self.predictions
    }

    pub fn total_defects(&self) -> usize {
        self.total_defects
    }

    pub fn inference_time_ms(&self) -> f64 {
        self.inference_time_ms
    }

    pub fn image_info(&self) -> ImageInfo {
        self.image_info
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Milliseconds rounded to two decimals.
fn round_ms(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize)]
pub struct DegradedPrediction {
    pub predictions: Vec<Detection>,
    pub total_defects: usize,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl DegradedPrediction {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            predictions: Vec::new(),
            total_defects: 0,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    #[serde(rename = "error")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ItemOutcome {
    Success(PredictionResult),
    Failure(ItemError),
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub filename: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl BatchItemResult {
    pub fn success(filename: impl Into<String>, result: PredictionResult) -> Self {
        Self {
            filename: filename.into(),
            outcome: ItemOutcome::Success(result),
        }
    }

    pub fn failure(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            outcome: ItemOutcome::Failure(ItemError {
                message: message.into(),
            }),
        }
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        match &self.outcome {
            ItemOutcome::Success(result) => Some(result),
            ItemOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ItemError> {
        match &self.outcome {
            ItemOutcome::Success(_) => None,
            ItemOutcome::Failure(error) => Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total_images: usize,
    pub successful_predictions: usize,
    pub failed_predictions: usize,
    pub total_defects_found: usize,
}

impl BatchSummary {
    /// Recomputes the summary from the item list.
    pub fn compute(items: &[BatchItemResult]) -> Result<Self, SchemaError> {
        let mut successful = 0usize;
        let mut defects = 0usize;

        for result in items.iter().filter_map(BatchItemResult::result) {
            successful += 1;
            defects = defects
                .checked_add(result.total_defects())
                .ok_or(SchemaError::Overflow {
                    field: "total_defects_found",
                })?;
        }

        Ok(Self {
            total_images: items.len(),
            successful_predictions: successful,
            failed_predictions: items.len() - successful,
            total_defects_found: defects,
        })
    }
}

/// Per-item results in submission order plus their summary.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    batch_results: Vec<BatchItemResult>,
    summary: BatchSummary,
    timestamp: DateTime<Utc>,
}

impl BatchResponse {
    /// Computes the summary; on failure the items are handed back untouched.
    pub fn from_items(
        items: Vec<BatchItemResult>,
    ) -> Result<Self, (SchemaError, Vec<BatchItemResult>)> {
        match BatchSummary::compute(&items) {
            Ok(summary) => Ok(Self {
                batch_results: items,
                summary,
                timestamp: Utc::now(),
            }),
            Err(e) => Err((e, items)),
        }
    }

    pub fn items(&self) -> &[BatchItemResult] {
        &self.batch_results
    }

    pub fn summary(&self) -> BatchSummary {
        self.summary
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DegradedBatch {
    pub batch_results: Vec<BatchItemResult>,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl DegradedBatch {
    pub fn new(batch_results: Vec<BatchItemResult>, error: impl Into<String>) -> Self {
        Self {
            batch_results,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}
