use crate::{server::AppState, status::StatusSnapshot};
use axum::{extract::State, response::Json};
use serde::Serialize;
use tracing::instrument;

#[derive(Serialize)]
pub struct StatusResponse {
    status: StatusSnapshot,
}

#[instrument(skip(state))]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state
        .status_reporter
        .snapshot(&state.upload_handler, &state.counters)
        .await;

    Json(StatusResponse { status })
}
