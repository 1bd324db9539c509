pub mod backend;
pub mod client;
pub mod config;
pub mod errors;
pub mod postprocessing;

pub use backend::{Device, InferenceBackend, InferenceOutput};
#[cfg(feature = "ort-backend")]
pub use backend::ort::OrtBackend;
pub use client::{InferenceRun, ModelClient, ModelInfo};
pub use config::{DEFAULT_CLASS_NAMES, ModelConfig};
pub use errors::InferenceError;
pub use postprocessing::decode_detections;
