//! Prometheus metrics endpoint
//!
//! Serves `GET /metrics` in the Prometheus text format on its own port.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use predictloop_common::{MetricsRegistry, PredictLoopError, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

pub struct MetricsExporter {
    listener: TcpListener,
    metrics: MetricsRegistry,
}

impl MetricsExporter {
    pub async fn bind(address: &str, metrics: MetricsRegistry) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| PredictLoopError::Bind {
                address: address.to_string(),
                source,
            })?;

        Ok(Self { listener, metrics })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve scrape requests forever
    ///
    /// `axum::serve` backs off and retries failed accepts, so a transient
    /// error such as fd exhaustion does not stop the endpoint.
    pub async fn serve(self) -> Result<()> {
        info!("Metrics endpoint listening on http://{}/metrics", self.local_addr()?);

        axum::serve(self.listener, router(self.metrics)).await?;
        Ok(())
    }
}

/// Routes served by the metrics endpoint
pub fn router(metrics: MetricsRegistry) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<MetricsRegistry>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.gather(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn scrape(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn start(metrics: MetricsRegistry) -> SocketAddr {
        let exporter = MetricsExporter::bind("127.0.0.1:0", metrics).await.unwrap();
        let addr = exporter.local_addr().unwrap();
        tokio::spawn(exporter.serve());
        addr
    }

    #[tokio::test]
    async fn test_serves_metrics() {
        let metrics = MetricsRegistry::new();
        metrics.requests.requests_total.inc_by(3);

        let response = scrape(start(metrics).await, "/metrics").await;

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("text/plain; version=0.0.4"));
        assert!(response.contains("predictloop_requests_total 3"));
    }

    #[tokio::test]
    async fn test_scrapes_see_live_counters() {
        let metrics = MetricsRegistry::new();
        let addr = start(metrics.clone()).await;

        assert!(scrape(addr, "/metrics").await.contains("predictloop_connections_opened_total 0"));

        metrics.connections.opened_total.inc();
        assert!(scrape(addr, "/metrics").await.contains("predictloop_connections_opened_total 1"));
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let response = scrape(start(MetricsRegistry::new()).await, "/").await;

        assert!(response.starts_with("HTTP/1.1 404 Not Found"));
    }
}
