//! Error types for background removal operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error types surfaced by the background removal pipeline
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// The inference runtime did not become ready within the allotted wait
    #[error("Inference runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// The source image could not be fetched or decoded
    #[error("Image load error: {0}")]
    ImageLoad(String),

    /// The saliency model could not be loaded or compiled
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// The composited output could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed input dimensions or buffers
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport errors while fetching images or models
    #[error("Network error: {0}")]
    Network(String),
}

impl BgRemovalError {
    /// Create a new runtime unavailable error
    pub fn runtime_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::RuntimeUnavailable(msg.into())
    }

    /// Create a new image load error
    pub fn image_load<S: Into<String>>(msg: S) -> Self {
        Self::ImageLoad(msg.into())
    }

    /// Create a new model load error
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a network error with the operation that failed
    pub fn network_error<E: std::fmt::Display>(operation: &str, error: E) -> Self {
        Self::Network(format!("{operation}: {error}"))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range})"
        ))
    }

    /// Single human-readable message shown to the user at the operation boundary
    #[must_use]
    pub fn user_message(&self) -> String {
        let detail = match self {
            Self::RuntimeUnavailable(_) => "the inference runtime is not available".to_string(),
            Self::ImageLoad(msg) => format!("could not load the image ({msg})"),
            Self::ModelLoad(msg) => format!("could not load the saliency model ({msg})"),
            Self::Encode(msg) => format!("could not export the result ({msg})"),
            Self::Inference(msg) => format!("model processing error ({msg})"),
            other => other.to_string(),
        };
        format!("Background removal failed: {detail}")
    }
}
