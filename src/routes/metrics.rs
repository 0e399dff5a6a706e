use crate::{error::ErrorResponse, server::AppState};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
                .into_response_with_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
