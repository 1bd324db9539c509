use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Model not loaded")]
    ModelNotLoaded,

    /// Short description only; the full error chain is logged where it happens.
    #[error("Inference failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        assert_eq!(InferenceError::ModelNotLoaded.to_string(), "Model not loaded");
        assert_eq!(
            InferenceError::Failed("shape mismatch".to_string()).to_string(),
            "Inference failed: shape mismatch"
        );
    }
}
