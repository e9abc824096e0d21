//! Drives a video upload from the request body to a signed
//! playback URL.
//!
//! Stages, in order: ownership check, declared type check, staging (with
//! size limit and container sniffing), probe, fast-start remux, key
//! derivation, object upload, metadata update, URL signing. Every staging
//! file created along the way is removed before `ingest` returns, whatever
//! the outcome.

use crate::{
    models::{orientation::Orientation, storage_ref::StorageReference, video::VideoRecord},
    services::{
        keys::{self, KeyError},
        media_tools::{MediaError, MediaTools, fast_start_path},
        object_store::{ObjectStore, ObjectStoreError},
        playback::{PlaybackSigner, SigningError},
        staging::{StagingArea, StagingError, StagingScope},
        video_store::{StoreError, VideoStore},
    },
};
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use std::{io, sync::Arc};
use thiserror::Error;
use tokio::fs::File;
use tracing::{debug, info};
use uuid::Uuid;

/// The only container the pipeline accepts.
pub const ACCEPTED_CONTENT_TYPE: &str = "video/mp4";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("video `{0}` not found")]
    NotFound(Uuid),
    #[error("user `{user_id}` does not own video `{video_id}`")]
    Forbidden { video_id: Uuid, user_id: Uuid },
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },
    #[error("staging I/O failed: {0}")]
    Io(#[source] io::Error),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("metadata lookup failed: {0}")]
    LookupFailed(#[source] StoreError),
    #[error("object upload failed: {0}")]
    UploadFailed(#[source] ObjectStoreError),
    #[error("metadata update failed: {0}")]
    PersistenceFailed(#[source] StoreError),
    #[error("signing playback url failed: {0}")]
    SigningFailed(#[from] SigningError),
}

impl From<StagingError> for UploadError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::TooLarge { limit } => UploadError::PayloadTooLarge { limit },
            StagingError::Io(err) => UploadError::Io(err),
        }
    }
}

pub type UploadResult<T> = Result<T, UploadError>;

#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Bucket every upload lands in.
    pub bucket: String,
    /// Largest accepted file, in bytes.
    pub max_upload_bytes: u64,
}

#[derive(Clone)]
pub struct UploadService {
    videos: Arc<dyn VideoStore>,
    objects: Arc<dyn ObjectStore>,
    media: Arc<dyn MediaTools>,
    staging: StagingArea,
    signer: PlaybackSigner,
    settings: UploadSettings,
}

impl UploadService {
    pub fn new(
        videos: Arc<dyn VideoStore>,
        objects: Arc<dyn ObjectStore>,
        media: Arc<dyn MediaTools>,
        staging: StagingArea,
        signer: PlaybackSigner,
        settings: UploadSettings,
    ) -> Self {
        Self {
            videos,
            objects,
            media,
            staging,
            signer,
            settings,
        }
    }

    /// Largest accepted file, in bytes. The router sizes its body limit from it.
    pub fn max_upload_bytes(&self) -> u64 {
        self.settings.max_upload_bytes
    }

    /// Resolve the target record and make sure `user_id` owns it.
    pub async fn authorize(&self, video_id: Uuid, user_id: Uuid) -> UploadResult<VideoRecord> {
        let video = self
            .videos
            .get_video(video_id)
            .await
            .map_err(UploadError::LookupFailed)?
            .ok_or(UploadError::NotFound(video_id))?;

        if !video.is_owned_by(user_id) {
            return Err(UploadError::Forbidden { video_id, user_id });
        }
        Ok(video)
    }

    /// Run the pipeline for an authorized record and the uploaded file body.
    ///
    /// Returns the updated record with `video_url` holding a presigned URL.
    /// The persisted record holds the `bucket,key` reference instead.
    pub async fn ingest<S>(
        &self,
        video: VideoRecord,
        declared_content_type: &str,
        body: S,
    ) -> UploadResult<VideoRecord>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let media_type = keys::essence(declared_content_type);
        if media_type != ACCEPTED_CONTENT_TYPE {
            return Err(UploadError::UnsupportedMediaType(format!(
                "expected {ACCEPTED_CONTENT_TYPE}, got {media_type}"
            )));
        }

        let mut scope = self.staging.scope();
        let result = self.process(&mut scope, video, &media_type, body).await;
        scope.cleanup().await;
        result
    }

    async fn process<S>(
        &self,
        scope: &mut StagingScope,
        mut video: VideoRecord,
        media_type: &str,
        body: S,
    ) -> UploadResult<VideoRecord>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let video_id = video.id;

        let mut raw = scope.create(keys::extension_for(media_type)?).await?;
        let staged = raw
            .write_stream(body, self.settings.max_upload_bytes)
            .await?;
        if !staged.has_mp4_signature() {
            return Err(UploadError::UnsupportedMediaType(
                "file is not a valid MP4".into(),
            ));
        }
        let raw_path = raw.path().to_path_buf();
        drop(raw);
        info!(%video_id, size_bytes = staged.size_bytes, "staged upload");

        let (width, height) = self.media.probe_dimensions(&raw_path).await?;
        let orientation = Orientation::from_dimensions(width, height);
        debug!(%video_id, width, height, %orientation, "probed upload");

        scope.track(fast_start_path(&raw_path));
        let normalized = self.media.remux_fast_start(&raw_path).await?;
        scope.track(&normalized);
        scope.remove(&raw_path).await;

        let key = keys::derive_key(media_type, orientation)?;
        let body = File::open(&normalized).await.map_err(UploadError::Io)?;
        let outcome = self
            .objects
            .put_object(&self.settings.bucket, &key, body, media_type)
            .await
            .map_err(UploadError::UploadFailed)?;
        info!(
            %video_id,
            bucket = %self.settings.bucket,
            key = %key,
            size_bytes = outcome.size_bytes,
            etag = ?outcome.etag,
            "uploaded normalized video"
        );
        scope.remove(&normalized).await;

        let reference = StorageReference::new(self.settings.bucket.clone(), key);
        video.video_url = Some(reference.to_string());
        video.updated_at = Utc::now();
        self.videos
            .update_video(&video)
            .await
            .map_err(UploadError::PersistenceFailed)?;

        Ok(self.signer.sign_video(video).await?)
    }
}
