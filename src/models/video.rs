//! Represents a video owned by a user, as persisted in the metadata store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A video record.
///
/// The record is created outside the ingest pipeline; the pipeline only ever
/// writes `video_url` (and bumps `updated_at`) after a successful upload.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct VideoRecord {
    /// Unique identifier of the video.
    pub id: Uuid,

    /// ID of the user that owns this video. Only the owner may upload media.
    pub user_id: Uuid,

    pub title: String,

    pub description: String,

    pub thumbnail_url: Option<String>,

    /// Playback reference.
    ///
    /// Persisted as `bucket,key` (see `StorageReference`). In API responses
    /// it carries a short-lived presigned URL instead; the signed form is
    /// never written back.
    pub video_url: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Build a fresh record with no media attached.
    pub fn new(user_id: Uuid, title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            description: description.into(),
            thumbnail_url: None,
            video_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}
