//! Read-time conversion of stored references into presigned playback URLs.

use crate::{
    models::{
        storage_ref::{MalformedReference, StorageReference},
        video::VideoRecord,
    },
    services::object_store::{ObjectStore, ObjectStoreError},
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error(transparent)]
    MalformedReference(#[from] MalformedReference),
    #[error(transparent)]
    Presign(#[from] ObjectStoreError),
}

#[derive(Clone)]
pub struct PlaybackSigner {
    objects: Arc<dyn ObjectStore>,
    ttl: Duration,
}

impl PlaybackSigner {
    pub fn new(objects: Arc<dyn ObjectStore>, ttl: Duration) -> Self {
        Self { objects, ttl }
    }

    pub async fn sign(&self, reference: &StorageReference) -> Result<String, SigningError> {
        let url = self
            .objects
            .presign_get(&reference.bucket, &reference.key, self.ttl)
            .await?;
        Ok(url)
    }

    /// Replace a record's stored `bucket,key` reference with a presigned URL.
    ///
    /// Records without media come back unchanged.
    pub async fn sign_video(&self, mut video: VideoRecord) -> Result<VideoRecord, SigningError> {
        let Some(raw) = video.video_url.as_deref() else {
            return Ok(video);
        };
        let reference: StorageReference = raw.parse()?;
        video.video_url = Some(self.sign(&reference).await?);
        Ok(video)
    }
}
