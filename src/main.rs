use anyhow::Result;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use config::{AppConfig, StorageBackend};
use services::{
    media_tools::FfmpegTools,
    object_store::{ObjectStore, local::LocalObjectStore},
    playback::PlaybackSigner,
    staging::StagingArea,
    upload_service::{UploadService, UploadSettings},
    video_store::{SqliteVideoStore, VideoStore},
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting video-ingest with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory and the file itself; SQLx will not.
    if !db_url.contains(":memory:") {
        let db_path_obj = Path::new(db_path);
        if let Some(parent) = db_path_obj.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }
        if let Err(e) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(db_path_obj)
        {
            tracing::warn!("Failed to open database file manually: {}", e);
        }
    }

    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?,
    );
    let videos = SqliteVideoStore::new(db);

    // --- Handle migration mode ---
    if migrate {
        videos.migrate().await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize services ---
    let staging = StagingArea::new(&cfg.staging_dir).await?;
    tracing::info!("Staging uploads in {}", staging.dir().display());

    let (objects, local_objects): (Arc<dyn ObjectStore>, Option<LocalObjectStore>) =
        match cfg.storage_backend {
            StorageBackend::Local => {
                tokio::fs::create_dir_all(&cfg.objects_dir).await?;
                let store = LocalObjectStore::new(
                    &cfg.objects_dir,
                    &cfg.public_base_url,
                    &cfg.url_signing_secret,
                );
                let objects: Arc<dyn ObjectStore> = Arc::new(store.clone());
                (objects, Some(store))
            }
            StorageBackend::S3 => (s3_store(&cfg)?, None),
        };

    let signer = PlaybackSigner::new(objects.clone(), Duration::from_secs(cfg.presign_ttl_secs));
    let videos: Arc<dyn VideoStore> = Arc::new(videos);
    let uploads = UploadService::new(
        videos.clone(),
        objects,
        Arc::new(FfmpegTools::new(&cfg.ffprobe_bin, &cfg.ffmpeg_bin)),
        staging.clone(),
        signer.clone(),
        UploadSettings {
            bucket: cfg.bucket.clone(),
            max_upload_bytes: cfg.max_upload_bytes,
        },
    );

    let body_limit = uploads.max_upload_bytes();
    let state = AppState {
        uploads,
        videos,
        signer,
        auth: auth::JwtAuthenticator::new(&cfg.jwt_secret),
        local_objects,
        staging,
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(body_limit).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "storage-s3")]
fn s3_store(cfg: &AppConfig) -> Result<Arc<dyn ObjectStore>> {
    let s3 = cfg
        .s3
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("S3 backend selected without S3 settings"))?;
    let store = services::object_store::s3::S3ObjectStore::new(
        &s3.endpoint,
        &s3.region,
        &s3.access_key,
        &s3.secret_key,
    )?;
    tracing::info!("Using S3 object storage at {}", s3.endpoint);
    Ok(Arc::new(store))
}

#[cfg(not(feature = "storage-s3"))]
fn s3_store(_cfg: &AppConfig) -> Result<Arc<dyn ObjectStore>> {
    anyhow::bail!("this build does not include the S3 backend (feature `storage-s3`)")
}
