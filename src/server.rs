use crate::{
    config::ServerConfig, counters::ProcessedCounters, error::not_found, handler::UploadHandler,
    routes::api_routes, status::StatusReporter, telemetry::Metrics,
};
use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

#[derive(Clone)]
pub struct AppState {
    pub upload_handler: UploadHandler,
    pub counters: Arc<ProcessedCounters>,
    pub status_reporter: Arc<StatusReporter>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        upload_handler: UploadHandler,
        status_reporter: StatusReporter,
    ) -> Result<Self, prometheus::Error> {
        Ok(Self {
            upload_handler,
            counters: Arc::new(ProcessedCounters::new()),
            status_reporter: Arc::new(status_reporter),
            metrics: Arc::new(Metrics::new()?),
        })
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .merge(api_routes())
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(state: AppState, config: &ServerConfig) -> anyhow::Result<Self> {
        let addr = config.get_address();
        let router = build_router(state, config.max_upload_bytes);
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        mut shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await?;
            Ok::<(), anyhow::Error>(())
        });

        Ok(server_handle)
    }
}
