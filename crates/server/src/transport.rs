//! Message transport
//!
//! The connection handler only needs whole messages in and whole messages
//! out. [`Transport`] captures that, and [`WebSocketTransport`] provides it
//! over a WebSocket stream.

use futures_util::{SinkExt, StreamExt};
use predictloop_common::{PredictLoopError, Result};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, trace};

/// Duplex, message-framed channel to one peer
pub trait Transport: Send {
    /// Wait for the next complete message
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    fn receive(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Send one complete message
    fn send(&mut self, message: String) -> impl Future<Output = Result<()>> + Send;
}

/// [`Transport`] over an accepted WebSocket stream
pub struct WebSocketTransport<S> {
    stream: WebSocketStream<S>,
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }

    async fn finish_close(&mut self) {
        // Flushes the close reply queued by the protocol layer.
        if let Err(e) = self.stream.close(None).await {
            trace!("Close handshake did not complete: {}", e);
        }
    }
}

impl<S> Transport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn receive(&mut self) -> Result<Option<String>> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Binary(bytes)) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(Message::Close(frame)) => {
                    debug!("Peer sent close frame: {:?}", frame);
                    self.finish_close().await;
                    return Ok(None);
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => return Ok(None),
                Err(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)) => {
                    debug!("Peer went away without a close handshake");
                    return Ok(None);
                }
                Err(e) => return Err(PredictLoopError::transport(e.to_string())),
            }
        }

        Ok(None)
    }

    async fn send(&mut self, message: String) -> Result<()> {
        self.stream
            .send(Message::Text(message))
            .await
            .map_err(|e| PredictLoopError::transport(e.to_string()))
    }
}
