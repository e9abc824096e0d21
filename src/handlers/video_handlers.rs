//! HTTP handlers for video upload and lookup.
//!
//! The upload body is streamed from the multipart field straight into the
//! staging area; nothing is buffered in memory beyond one chunk.

use crate::{auth::AuthUser, errors::AppError, models::video::VideoRecord, state::AppState};
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::MultipartError,
    },
    http::StatusCode,
};
use futures::StreamExt;
use std::io;
use tracing::info;
use uuid::Uuid;

/// Form field carrying the video file.
pub const VIDEO_FIELD: &str = "video";

fn parse_video_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request("Invalid ID"))
}

/// Multipart failures before the file body starts.
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(StatusCode::PAYLOAD_TOO_LARGE, err.body_text())
    } else {
        AppError::bad_request(err.body_text())
    }
}

/// Multipart failures inside the file body. The transport size limit is
/// surfaced as `FileTooLarge` so staging reports it as an oversized upload.
fn body_error(err: MultipartError) -> io::Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        io::Error::new(io::ErrorKind::FileTooLarge, err)
    } else {
        io::Error::other(err)
    }
}

/// `POST /api/video_upload/{video_id}`
///
/// Accepts `multipart/form-data` with the file in the `video` field. Fields
/// with other names are skipped.
pub async fn upload_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<VideoRecord>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    info!(%video_id, %user_id, "uploading video");

    let video = state.uploads.authorize(video_id, user_id).await?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request("video field has no content type"))?;

        let body = field.map(|chunk| chunk.map_err(body_error));
        let updated = state.uploads.ingest(video, &content_type, body).await?;
        return Ok(Json(updated));
    }

    Err(AppError::bad_request(format!(
        "missing `{VIDEO_FIELD}` form field"
    )))
}

/// `GET /api/videos/{video_id}`
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<VideoRecord>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let video = state
        .videos
        .get_video(video_id)
        .await?
        .ok_or_else(|| AppError::not_found("video not found"))?;

    Ok(Json(state.signer.sign_video(video).await?))
}

/// `GET /api/videos`: the caller's videos, newest first.
pub async fn list_videos(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<VideoRecord>>, AppError> {
    let videos = state.videos.list_videos_for_user(user_id).await?;

    let mut signed = Vec::with_capacity(videos.len());
    for video in videos {
        signed.push(state.signer.sign_video(video).await?);
    }
    Ok(Json(signed))
}
