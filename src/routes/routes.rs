//! Defines routes for the video API.
//!
//! ## Structure
//! - `POST /api/video_upload/{video_id}`: multipart upload of a video file
//! - `GET  /api/videos`: the caller's videos
//! - `GET  /api/videos/{video_id}`: one video, with a fresh playback URL
//! - `GET  /objects/{bucket}/{*key}`: presigned object download (local storage)
//! - `GET  /healthz`, `GET /readyz`: probes
//!
//! The wildcard `*key` allows nested keys like `landscape/abc.mp4`.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::get_object,
        video_handlers::{get_video, list_videos, upload_video},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the router. The upload route accepts bodies up to
/// `max_upload_bytes` plus multipart framing.
pub fn routes(max_upload_bytes: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/api/video_upload/{video_id}",
            post(upload_video).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/videos", get(list_videos))
        .route("/api/videos/{video_id}", get(get_video))
        .route("/objects/{bucket}/{*key}", get(get_object))
}
