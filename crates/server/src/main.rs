//! PredictLoop Server - Main Entry Point
//!
//! Loads the model artifact, starts the WebSocket listener and serves
//! predictions until interrupted.

use anyhow::Context;
use predictloop_common::{PredictLoopConfig, METRICS};
use predictloop_server::{MetricsExporter, ModelArtifact, ModelService, PredictionServer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = PathBuf::from(
        std::env::var("PREDICTLOOP_CONFIG").unwrap_or_else(|_| "configs/server-config.yaml".to_string()),
    );

    let config = PredictLoopConfig::load(Some(config_path.as_path()))
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("predictloop_server={}", config.observability.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PredictLoop Server");
    info!(
        "Configuration loaded: bind={}, model={}",
        config.server.listen_address(),
        config.model.path.display()
    );

    // Load model
    let artifact = ModelArtifact::load(&config.model.path)
        .with_context(|| format!("loading model from {}", config.model.path.display()))?;
    let service = Arc::new(ModelService::new(artifact, config.model.expected_arity)?);

    // Start metrics endpoint
    if config.observability.enable_metrics {
        let address = config.observability.metrics_address(&config.server);
        let exporter = MetricsExporter::bind(&address, METRICS.clone()).await?;

        tokio::spawn(async move {
            if let Err(e) = exporter.serve().await {
                error!("Metrics endpoint stopped: {}", e);
            }
        });
    }

    // Start listener
    let server = PredictionServer::bind(&config.server, service, METRICS.clone()).await?;

    server
        .run_until(async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal");
        })
        .await?;

    info!("PredictLoop Server shutdown complete");
    Ok(())
}
