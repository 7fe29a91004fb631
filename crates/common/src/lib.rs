//! PredictLoop common library
//!
//! This crate contains the error taxonomy, configuration and metrics shared
//! by the PredictLoop server.

pub mod config;
pub mod error;
pub mod metrics;

// Re-export commonly used types
pub use crate::config::PredictLoopConfig;
pub use error::{PredictLoopError, Result};
pub use metrics::{LatencyTimer, MetricsRegistry, METRICS};
