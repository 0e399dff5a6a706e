use crate::{
    classifier::ClassificationMatch,
    error::UploadError,
    server::AppState,
    validation::{UploadRequest, IMAGE_FIELD},
};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use std::time::Instant;
use tracing::instrument;

#[derive(Serialize)]
pub struct UploadResponse {
    matches: Vec<ClassificationMatch>,
}

#[instrument(skip(state, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, UploadError> {
    let started = Instant::now();

    let result = match read_image_field(multipart).await {
        Ok(upload) => {
            state
                .upload_handler
                .handle(upload, &state.counters)
                .await
        }
        Err(err) => {
            state.counters.record_failure();
            Err(err)
        }
    };

    let outcome = match &result {
        Ok(_) => "success",
        Err(err) => err.outcome(),
    };
    state
        .metrics
        .record_upload(outcome, started.elapsed().as_millis() as u64);

    let matches = result?;
    tracing::info!("Classified upload, top match {:?}", matches.first().map(|m| &m.name));

    Ok(Json(UploadResponse { matches }))
}

/// Pulls the `image` field out of the form. Other fields are skipped and a
/// request that is not multipart at all counts as a missing field.
async fn read_image_field(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Option<UploadRequest>, UploadError> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::debug!("Request is not multipart: {}", rejection.body_text());
            return Ok(None);
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            tracing::debug!("Skipping form field {:?}", field.name());
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let content = field.bytes().await.map_err(multipart_error)?;

        return Ok(Some(UploadRequest {
            filename,
            content,
            content_type,
        }));
    }

    Ok(None)
}

fn multipart_error(err: MultipartError) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::PayloadTooLarge
    } else {
        UploadError::MalformedUpload(err.body_text())
    }
}
