//! WebSocket listener
//!
//! Accepts TCP connections, completes the WebSocket handshake and hands each
//! connection to its own [`ConnectionHandler`] task. The accept loop itself
//! never waits on a connection.

use crate::handler::ConnectionHandler;
use crate::service::ModelService;
use crate::transport::WebSocketTransport;
use predictloop_common::config::ServerConfig;
use predictloop_common::{MetricsRegistry, PredictLoopError, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Prediction server bound to a listening socket
pub struct PredictionServer {
    listener: TcpListener,
    service: Arc<ModelService>,
    metrics: MetricsRegistry,
    ws_config: WebSocketConfig,
    handshake_timeout: Duration,
}

impl PredictionServer {
    /// Bind the configured address
    pub async fn bind(
        config: &ServerConfig,
        service: Arc<ModelService>,
        metrics: MetricsRegistry,
    ) -> Result<Self> {
        let address = config.listen_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| PredictLoopError::Bind { address, source })?;

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(config.max_message_bytes);
        ws_config.max_frame_size = Some(config.max_message_bytes);

        Ok(Self {
            listener,
            service,
            metrics,
            ws_config,
            handshake_timeout: config.handshake_timeout(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Connections already being served keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Prediction server listening on ws://{} (model={}, features={})",
            self.local_addr()?,
            self.service.model_kind(),
            self.service.expected_arity()
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Listener stopped accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let service = Arc::clone(&self.service);
        let metrics = self.metrics.clone();
        let ws_config = self.ws_config;
        let handshake_timeout = self.handshake_timeout;
        let span = info_span!("connection", id = %Uuid::new_v4(), %peer);

        tokio::spawn(
            async move {
                let handshake = tokio_tungstenite::accept_async_with_config(stream, Some(ws_config));
                let stream = match tokio::time::timeout(handshake_timeout, handshake).await {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(e)) => {
                        warn!("WebSocket handshake failed: {}", e);
                        return;
                    }
                    Err(_) => {
                        warn!("WebSocket handshake timed out after {:?}", handshake_timeout);
                        return;
                    }
                };

                debug!("Connection opened");
                metrics.connections.opened_total.inc();
                metrics.connections.active.inc();

                let mut handler =
                    ConnectionHandler::new(WebSocketTransport::new(stream), service, metrics.clone());

                match handler.run().await {
                    Ok(summary) => info!(
                        "Connection closed: {} requests, {} failed",
                        summary.requests, summary.failed
                    ),
                    Err(e) => {
                        metrics.connections.failed_total.inc();
                        let summary = handler.summary();
                        warn!(
                            "Connection terminated after {} requests: {}",
                            summary.requests, e
                        );
                    }
                }

                metrics.connections.active.dec();
            }
            .instrument(span),
        );
    }
}
