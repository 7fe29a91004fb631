//! Per-connection request/response loop
//!
//! Each accepted connection gets its own [`ConnectionHandler`], running as an
//! independent task. The handler alternates strictly between receiving one
//! request and sending one response, so responses are paired 1:1 and in
//! order with requests.

use crate::codec;
use crate::service::ModelService;
use crate::transport::Transport;
use predictloop_common::{LatencyTimer, MetricsRegistry, PredictLoopError, Result};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Longest message excerpt written to the debug log
const LOG_PREVIEW_BYTES: usize = 64;

/// Where the handler is in its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    AwaitingMessage,
    Decoding,
    Predicting,
    Encoding,
    Sending,
    /// Terminal: peer closed or transport failed
    Closed,
}

/// Counts reported when a connection ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub requests: u64,
    pub failed: u64,
}

/// Serves prediction requests on one connection
pub struct ConnectionHandler<T> {
    transport: T,
    service: Arc<ModelService>,
    metrics: MetricsRegistry,
    state: HandlerState,
    summary: ConnectionSummary,
}

impl<T: Transport> ConnectionHandler<T> {
    pub fn new(transport: T, service: Arc<ModelService>, metrics: MetricsRegistry) -> Self {
        Self {
            transport,
            service,
            metrics,
            state: HandlerState::AwaitingMessage,
            summary: ConnectionSummary::default(),
        }
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    pub fn summary(&self) -> ConnectionSummary {
        self.summary
    }

    /// Run until the peer closes or the transport fails
    ///
    /// Malformed or mis-sized requests are answered with an error response
    /// and do not end the loop. A clean close returns the summary; a
    /// transport failure is returned as an error.
    pub async fn run(&mut self) -> Result<ConnectionSummary> {
        loop {
            self.transition(HandlerState::AwaitingMessage);
            let message = match self.transport.receive().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!("Peer closed connection");
                    self.transition(HandlerState::Closed);
                    return Ok(self.summary);
                }
                Err(e) => {
                    self.transition(HandlerState::Closed);
                    return Err(e);
                }
            };

            debug!("< received {} bytes: {}", message.len(), preview(&message));
            self.summary.requests += 1;
            self.metrics.requests.requests_total.inc();

            let response = match self.respond(&message) {
                Ok(encoded) => {
                    self.metrics.requests.requests_success.inc();
                    encoded
                }
                Err(e) if e.is_request_error() => {
                    self.record_failure(&e);
                    codec::encode_error(&e)
                }
                Err(e) => {
                    self.transition(HandlerState::Closed);
                    return Err(e);
                }
            };

            self.transition(HandlerState::Sending);
            if let Err(e) = self.transport.send(response.clone()).await {
                self.transition(HandlerState::Closed);
                return Err(e);
            }
            debug!("> sent: {}", preview(&response));
        }
    }

    fn respond(&mut self, message: &str) -> Result<String> {
        self.transition(HandlerState::Decoding);
        let features = codec::decode_request(message)?;

        self.transition(HandlerState::Predicting);
        let service = &self.service;
        let prediction = self
            .metrics
            .requests
            .predict_duration
            .time(|| service.predict(&features))?;

        self.transition(HandlerState::Encoding);
        Ok(codec::encode_prediction(prediction))
    }

    fn record_failure(&mut self, err: &PredictLoopError) {
        self.summary.failed += 1;
        self.metrics.requests.requests_failed.inc();
        match err {
            PredictLoopError::ShapeMismatch { .. } => self.metrics.requests.shape_mismatches.inc(),
            PredictLoopError::Decode(_) => self.metrics.requests.decode_errors.inc(),
            _ => {}
        }
        warn!("Rejected request: {}", err);
    }

    fn transition(&mut self, next: HandlerState) {
        trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Leading part of a message, cut on a char boundary
fn preview(message: &str) -> std::borrow::Cow<'_, str> {
    if message.len() <= LOG_PREVIEW_BYTES {
        return message.into();
    }

    let mut end = LOG_PREVIEW_BYTES;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &message[..end]).into()
}
