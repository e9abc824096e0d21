use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr};

/// Where normalized videos are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// Files under `objects_dir`, served by this process via signed URLs.
    Local,
    /// An S3-compatible service.
    S3,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(s, true).map_err(|e| anyhow::anyhow!(e))
    }
}

/// S3 connection settings, required when the backend is `s3`.
#[derive(Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub staging_dir: String,
    pub max_upload_bytes: u64,
    pub presign_ttl_secs: u64,
    pub jwt_secret: String,
    pub url_signing_secret: String,
    pub ffprobe_bin: String,
    pub ffmpeg_bin: String,
    pub storage_backend: StorageBackend,
    pub bucket: String,
    pub objects_dir: String,
    pub public_base_url: String,
    pub s3: Option<S3Config>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("staging_dir", &self.staging_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("presign_ttl_secs", &self.presign_ttl_secs)
            .field("ffprobe_bin", &self.ffprobe_bin)
            .field("ffmpeg_bin", &self.ffmpeg_bin)
            .field("storage_backend", &self.storage_backend)
            .field("bucket", &self.bucket)
            .field("objects_dir", &self.objects_dir)
            .field("public_base_url", &self.public_base_url)
            .field("s3", &self.s3)
            .finish_non_exhaustive()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Video ingestion service")]
pub struct Args {
    /// Host to bind to (overrides VIDEO_INGEST_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VIDEO_INGEST_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides VIDEO_INGEST_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory for in-flight uploads (overrides VIDEO_INGEST_STAGING_DIR)
    #[arg(long)]
    pub staging_dir: Option<String>,

    /// Largest accepted upload in bytes (overrides VIDEO_INGEST_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<u64>,

    /// Lifetime of playback URLs in seconds (overrides VIDEO_INGEST_PRESIGN_TTL_SECS)
    #[arg(long)]
    pub presign_ttl_secs: Option<u64>,

    /// Path to ffprobe (overrides VIDEO_INGEST_FFPROBE_BIN)
    #[arg(long)]
    pub ffprobe_bin: Option<String>,

    /// Path to ffmpeg (overrides VIDEO_INGEST_FFMPEG_BIN)
    #[arg(long)]
    pub ffmpeg_bin: Option<String>,

    /// Object storage backend (overrides VIDEO_INGEST_STORAGE_BACKEND)
    #[arg(long, value_enum)]
    pub storage_backend: Option<StorageBackend>,

    /// Bucket for uploaded videos (overrides VIDEO_INGEST_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Root directory of the local backend (overrides VIDEO_INGEST_OBJECTS_DIR)
    #[arg(long)]
    pub objects_dir: Option<String>,

    /// Base of local playback URLs (overrides VIDEO_INGEST_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

/// Read an env var, parsing it when present.
fn env_parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("parsing {} value `{}`: {}", name, value, e)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn env_string(name: &str) -> Result<Option<String>> {
    env_parsed::<String>(name)
}

fn required(name: &str) -> Result<String> {
    match env_string(name)? {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("{} must be set", name),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args)?, migrate))
    }

    fn merge(args: Args) -> Result<Self> {
        let jwt_secret = required("VIDEO_INGEST_JWT_SECRET")?;
        let url_signing_secret =
            env_string("VIDEO_INGEST_URL_SIGNING_SECRET")?.unwrap_or_else(|| jwt_secret.clone());

        let storage_backend = match args.storage_backend {
            Some(backend) => backend,
            None => env_parsed("VIDEO_INGEST_STORAGE_BACKEND")?.unwrap_or(StorageBackend::Local),
        };
        let s3 = match storage_backend {
            StorageBackend::Local => None,
            StorageBackend::S3 => Some(S3Config {
                endpoint: required("VIDEO_INGEST_S3_ENDPOINT")?,
                region: env_string("VIDEO_INGEST_S3_REGION")?
                    .unwrap_or_else(|| "us-east-1".into()),
                access_key: required("VIDEO_INGEST_S3_ACCESS_KEY")?,
                secret_key: required("VIDEO_INGEST_S3_SECRET_KEY")?,
            }),
        };

        let cfg = Self {
            host: match args.host {
                Some(v) => v,
                None => env_string("VIDEO_INGEST_HOST")?.unwrap_or_else(|| "0.0.0.0".into()),
            },
            port: match args.port {
                Some(v) => v,
                None => env_parsed("VIDEO_INGEST_PORT")?.unwrap_or(3000),
            },
            database_url: match args.database_url {
                Some(v) => v,
                None => env_string("VIDEO_INGEST_DATABASE_URL")?
                    .unwrap_or_else(|| "sqlite://./data/meta/videos.db".into()),
            },
            staging_dir: match args.staging_dir {
                Some(v) => v,
                None => env_string("VIDEO_INGEST_STAGING_DIR")?
                    .unwrap_or_else(|| "./data/staging".into()),
            },
            max_upload_bytes: match args.max_upload_bytes {
                Some(v) => v,
                None => env_parsed("VIDEO_INGEST_MAX_UPLOAD_BYTES")?.unwrap_or(1 << 30),
            },
            presign_ttl_secs: match args.presign_ttl_secs {
                Some(v) => v,
                None => env_parsed("VIDEO_INGEST_PRESIGN_TTL_SECS")?.unwrap_or(3600),
            },
            jwt_secret,
            url_signing_secret,
            ffprobe_bin: match args.ffprobe_bin {
                Some(v) => v,
                None => env_string("VIDEO_INGEST_FFPROBE_BIN")?.unwrap_or_else(|| "ffprobe".into()),
            },
            ffmpeg_bin: match args.ffmpeg_bin {
                Some(v) => v,
                None => env_string("VIDEO_INGEST_FFMPEG_BIN")?.unwrap_or_else(|| "ffmpeg".into()),
            },
            storage_backend,
            bucket: match args.bucket {
                Some(v) => v,
                None => env_string("VIDEO_INGEST_BUCKET")?.unwrap_or_else(|| "videos".into()),
            },
            objects_dir: match args.objects_dir {
                Some(v) => v,
                None => env_string("VIDEO_INGEST_OBJECTS_DIR")?
                    .unwrap_or_else(|| "./data/objects".into()),
            },
            public_base_url: match args.public_base_url {
                Some(v) => v,
                None => env_string("VIDEO_INGEST_PUBLIC_BASE_URL")?
                    .unwrap_or_else(|| "http://localhost:3000".into()),
            },
            s3,
        };

        if cfg.max_upload_bytes == 0 {
            bail!("max upload size must be greater than zero");
        }
        if cfg.presign_ttl_secs == 0 {
            bail!("presigned URL lifetime must be greater than zero");
        }
        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
