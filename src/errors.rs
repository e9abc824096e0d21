use crate::{
    auth::AuthError,
    services::{
        object_store::ObjectStoreError, playback::SigningError, upload_service::UploadError,
        video_store::StoreError,
    },
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use tracing::error;

/// A lightweight wrapper for general errors that keeps the message local.
///
/// Server-side failures carry a client-safe message; the underlying cause is
/// logged where the error is converted.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn payload_too_large(limit: u64) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("upload exceeds the {limit} byte limit"),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::new(StatusCode::UNAUTHORIZED, err.to_string())
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::NotFound(_) => AppError::not_found("video not found"),
            UploadError::Forbidden { .. } => {
                AppError::new(StatusCode::FORBIDDEN, "you do not own this video")
            }
            UploadError::UnsupportedMediaType(msg) => {
                AppError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, msg)
            }
            UploadError::PayloadTooLarge { limit } => AppError::payload_too_large(limit),
            UploadError::Io(_) | UploadError::Key(_) => {
                error!(error = %err, "upload staging failed");
                AppError::internal("failed to stage upload")
            }
            UploadError::Media(_) => {
                error!(error = %err, "media processing failed");
                AppError::internal("failed to process video")
            }
            UploadError::LookupFailed(_) => {
                error!(error = %err, "metadata lookup failed");
                AppError::internal("failed to load video")
            }
            UploadError::UploadFailed(_) => {
                error!(error = %err, "object upload failed");
                AppError::internal("failed to store video")
            }
            UploadError::PersistenceFailed(_) => {
                error!(error = %err, "metadata update failed");
                AppError::internal("failed to update video")
            }
            UploadError::SigningFailed(_) => {
                error!(error = %err, "signing playback url failed");
                AppError::internal("failed to sign video url")
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::not_found("video not found"),
            other => {
                error!(error = %other, "metadata store failed");
                AppError::internal("failed to load video")
            }
        }
    }
}

impl From<SigningError> for AppError {
    fn from(err: SigningError) -> Self {
        error!(error = %err, "signing playback url failed");
        AppError::internal("failed to sign video url")
    }
}

impl From<ObjectStoreError> for AppError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::NotFound { .. } => AppError::not_found("object not found"),
            ObjectStoreError::InvalidKey(msg) | ObjectStoreError::InvalidBucket(msg) => {
                AppError::bad_request(msg)
            }
            ObjectStoreError::SignatureRejected(reason) => {
                AppError::new(StatusCode::FORBIDDEN, reason)
            }
            other => {
                error!(error = %other, "object store failed");
                AppError::internal("failed to read object")
            }
        }
    }
}
