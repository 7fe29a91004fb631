//! PredictLoop Server
//!
//! Serves point predictions from one in-memory model over WebSocket
//! connections. Each connection runs an independent request/response loop
//! against a shared, immutable [`ModelService`].

pub mod codec;
pub mod exporter;
pub mod handler;
pub mod model;
pub mod server;
pub mod service;
pub mod transport;

pub use exporter::MetricsExporter;
pub use handler::{ConnectionHandler, ConnectionSummary, HandlerState};
pub use model::{LinearModel, LogisticModel, ModelArtifact, Predictor};
pub use server::PredictionServer;
pub use service::{FeatureVector, ModelService, Prediction};
pub use transport::{Transport, WebSocketTransport};
