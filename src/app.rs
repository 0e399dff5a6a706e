use crate::{
    classifier::OrtClassifier,
    config::Config,
    handler::UploadHandler,
    server::{AppState, HttpServer},
    status::{HealthProbe, StatusReporter},
    validation::RequestValidator,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{signal, sync::broadcast};

/// Loads the model and serves until ctrl-c or SIGTERM. Uptime counts from
/// `started`.
pub async fn start_app(config: Config, started: Instant) -> anyhow::Result<()> {
    let classifier = match OrtClassifier::new(&config.model, &config.labels) {
        Ok(classifier) => Arc::new(classifier),
        Err(e) => {
            tracing::error!("Failed to initialize classifier: {}", e);
            return Err(e.into());
        }
    };

    let probe = match &config.health.probe_image {
        Some(path) => HealthProbe::from_file(path)?,
        None => HealthProbe::synthetic()?,
    };
    tracing::info!("Health strategy: {:?}", config.health.strategy);

    let inference_timeout = match config.server.inference_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    let upload_handler = UploadHandler::new(
        RequestValidator::new(&config.validation),
        classifier,
        inference_timeout,
    );
    let status_reporter = StatusReporter::new(config.health.strategy, probe, started);
    let state = AppState::new(upload_handler, status_reporter)?;

    let server = HttpServer::new(state, &config.server).await?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let server_handle = server.run(shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
