use crate::{
    auth::JwtAuthenticator,
    services::{
        object_store::local::LocalObjectStore, playback::PlaybackSigner, staging::StagingArea,
        upload_service::UploadService, video_store::VideoStore,
    },
};
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub uploads: UploadService,
    pub videos: Arc<dyn VideoStore>,
    pub signer: PlaybackSigner,
    pub auth: JwtAuthenticator,
    /// Set when objects live on local disk and this process serves them.
    pub local_objects: Option<LocalObjectStore>,
    pub staging: StagingArea,
}
