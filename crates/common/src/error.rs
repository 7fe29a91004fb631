//! Common error types for PredictLoop
//!
//! This module defines all error types used across the PredictLoop system.
//! Errors fall into three classes: per-request errors that are reported back
//! to the peer, connection-fatal transport errors, and startup-fatal errors.

use thiserror::Error;

/// Main error type for PredictLoop
#[derive(Error, Debug)]
pub enum PredictLoopError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed request text
    #[error("Decode error: {0}")]
    Decode(String),

    /// Feature vector arity does not match the model
    #[error("Shape mismatch: expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Model output that has no decimal rendering (overflow, NaN)
    #[error("Model produced a non-finite prediction ({0})")]
    NonFinitePrediction(f64),

    /// Model loading or validation errors
    #[error("Model error: {0}")]
    Model(String),

    /// Transport failure on an open connection
    #[error("Transport error: {0}")]
    Transport(String),

    /// Listener could not bind
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for PredictLoopError {
    fn from(err: ::config::ConfigError) -> Self {
        PredictLoopError::Config(err.to_string())
    }
}

impl PredictLoopError {
    /// Whether the error only affects the current request.
    ///
    /// Request errors are answered with an error response and the
    /// connection keeps serving.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            PredictLoopError::Decode(_)
                | PredictLoopError::ShapeMismatch { .. }
                | PredictLoopError::NonFinitePrediction(_)
        )
    }

    /// Whether the error terminates the connection it occurred on
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, PredictLoopError::Transport(_) | PredictLoopError::Io(_))
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        PredictLoopError::Config(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        PredictLoopError::Decode(msg.into())
    }

    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        PredictLoopError::Model(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        PredictLoopError::Transport(msg.into())
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: usize, actual: usize) -> Self {
        PredictLoopError::ShapeMismatch { expected, actual }
    }
}

/// Result type alias for PredictLoop operations
pub type Result<T> = std::result::Result<T, PredictLoopError>;
