use crate::{classifier::ClassifierError, decoder::DecodeError, validation::ValidationError};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub http_status: u16,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                http_status: status.as_u16(),
                message: message.into(),
            },
        }
    }

    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Malformed multipart payload")]
    MalformedUpload(String),
    #[error("Uploaded file exceeds the size limit")]
    PayloadTooLarge,
    #[error("Unsupported image format")]
    UnrecognizedImageFormat,
    #[error("Internal server error: {kind}")]
    Internal { kind: &'static str, detail: String },
}

impl UploadError {
    pub fn internal(kind: &'static str, detail: impl ToString) -> Self {
        UploadError::Internal {
            kind,
            detail: detail.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::Validation(_) => StatusCode::BAD_REQUEST,
            UploadError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            UploadError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::UnrecognizedImageFormat => StatusCode::BAD_REQUEST,
            UploadError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            UploadError::Validation(ValidationError::MissingField(_)) => "missing_field",
            UploadError::Validation(ValidationError::EmptyPayload) => "empty_payload",
            UploadError::Validation(ValidationError::UnsupportedExtension { .. }) => {
                "unsupported_extension"
            }
            UploadError::MalformedUpload(_) => "malformed_upload",
            UploadError::PayloadTooLarge => "payload_too_large",
            UploadError::UnrecognizedImageFormat => "unrecognized_format",
            UploadError::Internal { .. } => "internal_error",
        }
    }
}

impl From<DecodeError> for UploadError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Unrecognized(_) => UploadError::UnrecognizedImageFormat,
            DecodeError::Internal(e) => UploadError::internal("image decoding failed", e),
        }
    }
}

impl From<ClassifierError> for UploadError {
    fn from(err: ClassifierError) -> Self {
        UploadError::internal("classification failed", err)
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            UploadError::Internal { detail, .. } => {
                tracing::error!("Upload failed: {}: {}", self, detail)
            }
            UploadError::MalformedUpload(detail) => {
                tracing::warn!("Upload rejected: {}: {}", self, detail)
            }
            _ => tracing::warn!("Upload rejected: {}", self),
        }
        ErrorResponse::new(status, self.to_string()).into_response_with_status(status)
    }
}

pub async fn method_not_allowed(allow: &'static str) -> Response {
    let mut response = ErrorResponse::new(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
        .into_response_with_status(StatusCode::METHOD_NOT_ALLOWED);
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(allow));
    response
}

pub async fn not_found() -> Response {
    ErrorResponse::new(StatusCode::NOT_FOUND, "Not Found")
        .into_response_with_status(StatusCode::NOT_FOUND)
}
