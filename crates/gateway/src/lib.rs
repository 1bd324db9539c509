pub mod aggregator;
pub mod config;
pub mod decoder;
pub mod error;
pub mod filter;
pub mod logging;
pub mod orchestrator;
pub mod routes;
pub mod state;
pub mod validation;

pub use aggregator::ResponseAggregator;
pub use decoder::ImageDecoder;
pub use error::{DecodeError, InvalidInput, ServiceError};
pub use filter::DetectionFilter;
pub use orchestrator::{RawUpload, RequestOrchestrator, ServiceInfo, Stage};
pub use routes::build_router;
pub use state::{AppState, BodyLimits};
pub use validation::ImageValidator;
