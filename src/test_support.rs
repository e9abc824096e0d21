//! Fakes and fixtures shared by the service and router tests.

use crate::{
    auth::JwtAuthenticator,
    models::video::VideoRecord,
    services::{
        media_tools::{MediaError, MediaResult, MediaTools, fast_start_path},
        object_store::{
            ObjectStore, ObjectStoreError, ObjectStoreResult, PutOutcome, local::LocalObjectStore,
        },
        playback::PlaybackSigner,
        staging::StagingArea,
        upload_service::{UploadService, UploadSettings},
        video_store::{StoreError, StoreResult, VideoStore},
    },
    state::AppState,
};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tempfile::TempDir;
use tokio::fs::{self, File};
use uuid::Uuid;

pub(crate) const TEST_SECRET: &str = "test-secret";
pub(crate) const TEST_BUCKET: &str = "videos";
pub(crate) const TEST_BASE_URL: &str = "http://media.test";

/// A minimal ISO base media header followed by filler.
pub(crate) fn mp4_bytes() -> Vec<u8> {
    b"\0\0\0\x18ftypisom\0\0\x02\0isomiso2mp41 fake payload".to_vec()
}

#[derive(Default)]
pub(crate) struct MemoryVideoStore {
    videos: Mutex<HashMap<Uuid, VideoRecord>>,
    fail_reads: AtomicBool,
    fail_updates: AtomicBool,
}

impl MemoryVideoStore {
    pub(crate) fn get(&self, id: Uuid) -> Option<VideoRecord> {
        self.videos.lock().unwrap().get(&id).cloned()
    }

    pub(crate) fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn get_video(&self, id: Uuid) -> StoreResult<Option<VideoRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("injected read failure".into()));
        }
        Ok(self.get(id))
    }

    async fn update_video(&self, video: &VideoRecord) -> StoreResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("injected update failure".into()));
        }
        let mut videos = self.videos.lock().unwrap();
        match videos.get_mut(&video.id) {
            Some(slot) => {
                *slot = video.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(video.id)),
        }
    }

    async fn create_video(&self, video: &VideoRecord) -> StoreResult<()> {
        self.videos.lock().unwrap().insert(video.id, video.clone());
        Ok(())
    }

    async fn list_videos_for_user(&self, user_id: Uuid) -> StoreResult<Vec<VideoRecord>> {
        let mut videos: Vec<_> = self
            .videos
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

enum MediaBehavior {
    Dimensions(u32, u32),
    FailProbe,
    FailRemux,
}

/// Stand-in for ffprobe/ffmpeg. A successful remux copies the input.
pub(crate) struct FakeMedia(MediaBehavior);

impl FakeMedia {
    pub(crate) fn dimensions(width: u32, height: u32) -> Self {
        Self(MediaBehavior::Dimensions(width, height))
    }

    pub(crate) fn failing_probe() -> Self {
        Self(MediaBehavior::FailProbe)
    }

    /// Probes as 1920x1080, then leaves a partial output behind and fails.
    pub(crate) fn failing_remux() -> Self {
        Self(MediaBehavior::FailRemux)
    }
}

#[async_trait]
impl MediaTools for FakeMedia {
    async fn probe_dimensions(&self, _path: &Path) -> MediaResult<(u32, u32)> {
        match self.0 {
            MediaBehavior::Dimensions(w, h) => Ok((w, h)),
            MediaBehavior::FailProbe => Err(MediaError::ProbeUnavailable("injected".into())),
            MediaBehavior::FailRemux => Ok((1920, 1080)),
        }
    }

    async fn remux_fast_start(&self, path: &Path) -> MediaResult<PathBuf> {
        let output = fast_start_path(path);
        match self.0 {
            MediaBehavior::FailRemux => {
                fs::write(&output, b"partial")
                    .await
                    .map_err(|e| MediaError::NormalizationFailed(e.to_string()))?;
                Err(MediaError::NormalizationFailed("injected".into()))
            }
            _ => {
                fs::copy(path, &output)
                    .await
                    .map_err(|e| MediaError::NormalizationFailed(e.to_string()))?;
                Ok(output)
            }
        }
    }
}

pub(crate) struct FailingObjectStore;

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn put_object(
        &self,
        _bucket: &str,
        _key: &str,
        _body: File,
        _content_type: &str,
    ) -> ObjectStoreResult<PutOutcome> {
        Err(ObjectStoreError::Upload("injected upload failure".into()))
    }

    async fn presign_get(
        &self,
        _bucket: &str,
        _key: &str,
        _ttl: Duration,
    ) -> ObjectStoreResult<String> {
        Err(ObjectStoreError::Presign("injected presign failure".into()))
    }
}

/// A fully wired `UploadService` over temp directories.
pub(crate) struct Harness {
    pub(crate) dir: TempDir,
    pub(crate) owner: Uuid,
    pub(crate) videos: Arc<MemoryVideoStore>,
    pub(crate) objects: LocalObjectStore,
    pub(crate) staging: StagingArea,
    pub(crate) signer: PlaybackSigner,
    pub(crate) uploads: UploadService,
}

impl Harness {
    pub(crate) async fn new(media: FakeMedia) -> Self {
        Self::build(Arc::new(media), None, 1024 * 1024).await
    }

    pub(crate) async fn with_limit(media: FakeMedia, max_upload_bytes: u64) -> Self {
        Self::build(Arc::new(media), None, max_upload_bytes).await
    }

    pub(crate) async fn with_objects(media: FakeMedia, objects: Arc<dyn ObjectStore>) -> Self {
        Self::build(Arc::new(media), Some(objects), 1024 * 1024).await
    }

    /// Wire real media tooling, e.g. `FfmpegTools` pointed at scripts.
    pub(crate) async fn with_tools(media: Arc<dyn MediaTools>) -> Self {
        Self::build(media, None, 1024 * 1024).await
    }

    async fn build(
        media: Arc<dyn MediaTools>,
        upload_target: Option<Arc<dyn ObjectStore>>,
        max_upload_bytes: u64,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let objects = LocalObjectStore::new(dir.path().join("objects"), TEST_BASE_URL, TEST_SECRET);
        let staging = StagingArea::new(dir.path().join("staging")).await.unwrap();
        let videos = Arc::new(MemoryVideoStore::default());

        let local: Arc<dyn ObjectStore> = Arc::new(objects.clone());
        let upload_target = upload_target.unwrap_or_else(|| local.clone());
        let signer = PlaybackSigner::new(local, Duration::from_secs(3600));

        let uploads = UploadService::new(
            videos.clone(),
            upload_target,
            media,
            staging.clone(),
            signer.clone(),
            UploadSettings {
                bucket: TEST_BUCKET.into(),
                max_upload_bytes,
            },
        );

        Self {
            dir,
            owner: Uuid::new_v4(),
            videos,
            objects,
            staging,
            signer,
            uploads,
        }
    }

    pub(crate) async fn seed_video(&self) -> VideoRecord {
        let video = VideoRecord::new(self.owner, "clip", "");
        self.videos.create_video(&video).await.unwrap();
        video
    }

    /// Number of files under the object root, at any depth.
    pub(crate) fn stored_objects(&self) -> usize {
        count_files(&self.dir.path().join("objects"))
    }

    pub(crate) fn app_state(&self) -> AppState {
        AppState {
            uploads: self.uploads.clone(),
            videos: self.videos.clone(),
            signer: self.signer.clone(),
            auth: JwtAuthenticator::new(TEST_SECRET),
            local_objects: Some(self.objects.clone()),
            staging: self.staging.clone(),
        }
    }
}

pub(crate) fn staging_entries(h: &Harness) -> usize {
    std::fs::read_dir(h.staging.dir()).unwrap().count()
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .map(|e| e.unwrap().path())
        .map(|p| if p.is_dir() { count_files(&p) } else { 1 })
        .sum()
}

/// Write an executable shell script standing in for an external tool.
#[cfg(unix)]
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
