//! Request-scoped data model shared by the inference client and the gateway.

pub mod detection;
pub mod errors;
pub mod image;
pub mod result;

pub use detection::{BoundingBox, Detection, RawDetection, RawDetections};
pub use errors::SchemaError;
pub use image::{CanonicalImage, ImageInfo, RGB_CHANNELS};
pub use result::{
    BatchItemResult, BatchReport, BatchResponse, BatchSummary, DegradedBatch,
    DegradedPrediction, Formatted, ItemError, ItemOutcome, PredictionResult, SingleReport,
};
