mod metrics;
mod status;
mod upload_image;

use crate::{error::method_not_allowed, server::AppState};
use axum::{
    routing::{get, post},
    Router,
};

pub use metrics::metrics_handler;
pub use status::status;
pub use upload_image::upload_image;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/upload_image",
            post(upload_image).fallback(|| method_not_allowed("POST")),
        )
        .route(
            "/status",
            get(status).fallback(|| method_not_allowed("GET, HEAD")),
        )
        .route(
            "/metrics",
            get(metrics_handler).fallback(|| method_not_allowed("GET, HEAD")),
        )
}
