//! Error types shared by the tracking_ros crates

use thiserror::Error;

/// Result alias used across the workspace
pub type TrackingResult<T> = Result<T, TrackingError>;

/// Errors raised by the node runtime, the topic bus and the perception nodes
#[derive(Debug, Error)]
pub enum TrackingError {
    /// Missing or malformed startup parameter
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model could not be loaded onto the requested device
    #[error("Model error: {0}")]
    Model(String),

    /// Predictor failed while processing a frame
    #[error("Inference error: {0}")]
    Inference(String),

    /// Topic misuse (wrong message type, closed topic)
    #[error("Communication error: {0}")]
    Communication(String),

    /// A bounded wait expired
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// Message content the node cannot handle
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Image encoding or conversion failure
    #[error("Image error: {0}")]
    Image(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Message could not be encoded for, or decoded from, shared memory
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl TrackingError {
    /// True for errors that must stop the process at startup
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TrackingError::Config(_) | TrackingError::Model(_) | TrackingError::Timeout(_)
        )
    }
}
