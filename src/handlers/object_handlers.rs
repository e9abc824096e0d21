//! Serves objects from the local object store behind presigned URLs.
//! Streams object bodies to avoid buffering in memory.

use crate::{errors::AppError, services::keys::content_type_for_key, state::AppState};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Query parameters appended by `LocalObjectStore::presign_get`.
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

/// `GET /objects/{bucket}/{*key}?expires=&signature=`
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(q): Query<SignedQuery>,
) -> Result<Response, AppError> {
    let Some(store) = state.local_objects.as_ref() else {
        return Err(AppError::not_found("object not found"));
    };

    store
        .verify(&bucket, &key, q.expires, &q.signature, Utc::now().timestamp())
        .map_err(|err| {
            debug!(%bucket, %key, error = %err, "rejected object url");
            AppError::new(StatusCode::FORBIDDEN, "invalid or expired signature")
        })?;

    let (file, len) = store.open_object(&bucket, &key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for_key(&key).unwrap_or("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("none"));

    Ok(response)
}
