//! On-disk object store with HMAC-signed retrieval URLs.
//!
//! Objects live at `root/{bucket}/{key}`. Presigned URLs take the form
//! `{public_base}/objects/{bucket}/{key}?expires={unix}&signature={hex}` where
//! the signature is HMAC-SHA256 over `{bucket}/{key}:{expires}`.

use super::{
    ObjectStore, ObjectStoreError, ObjectStoreResult, PutOutcome, ensure_bucket_name_safe,
    ensure_key_safe,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use hmac::{Hmac, Mac};
use md5::Context;
use sha2::Sha256;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
    signing_key: Vec<u8>,
}

impl std::fmt::Debug for LocalObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalObjectStore")
            .field("root", &self.root)
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

impl LocalObjectStore {
    pub fn new(
        root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
        signing_key: impl AsRef<[u8]>,
    ) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            signing_key: signing_key.as_ref().to_vec(),
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        path.push(bucket);
        path.push(key);
        path
    }

    fn mac(&self, bucket: &str, key: &str, expires: i64) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .expect("HMAC can take key of any size");
        mac.update(format!("{bucket}/{key}:{expires}").as_bytes());
        mac
    }

    /// Check a presigned URL's query parameters against the current time.
    pub fn verify(
        &self,
        bucket: &str,
        key: &str,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> ObjectStoreResult<()> {
        if now > expires {
            return Err(ObjectStoreError::SignatureRejected("url expired"));
        }
        let provided = hex::decode(signature)
            .map_err(|_| ObjectStoreError::SignatureRejected("malformed signature"))?;
        self.mac(bucket, key, expires)
            .verify_slice(&provided)
            .map_err(|_| ObjectStoreError::SignatureRejected("signature mismatch"))
    }

    /// Open a stored object for streaming out, with its size.
    pub async fn open_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<(File, u64)> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;

        let path = self.object_path(bucket, key);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                ObjectStoreError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    /// Copy `body` to a temp file beside the destination, computing the MD5
    /// etag as it goes, then fsync and rename into place. The temp file is
    /// removed on every failure.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: File,
        _content_type: &str,
    ) -> ObjectStoreResult<PutOutcome> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        match write_with_digest(&tmp_path, body).await {
            Ok((size_bytes, etag)) => {
                if let Err(err) = fs::rename(&tmp_path, &file_path).await {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(ObjectStoreError::Io(err));
                }
                debug!(bucket, key, size_bytes, etag = %etag, "stored object");
                Ok(PutOutcome {
                    size_bytes,
                    etag: Some(etag),
                })
            }
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                Err(ObjectStoreError::Io(err))
            }
        }
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> ObjectStoreResult<String> {
        ensure_bucket_name_safe(bucket)?;
        ensure_key_safe(key)?;

        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| ObjectStoreError::Presign("ttl out of range".into()))?;
        let expires = Utc::now().timestamp() + ttl_secs;
        let signature = hex::encode(self.mac(bucket, key, expires).finalize().into_bytes());

        Ok(format!(
            "{}/objects/{}/{}?expires={}&signature={}",
            self.public_base_url, bucket, key, expires, signature
        ))
    }
}

async fn write_with_digest(tmp_path: &Path, body: File) -> io::Result<(u64, String)> {
    let mut out = File::create(tmp_path).await?;
    let mut digest = Context::new();
    let mut size_bytes: u64 = 0;

    let mut stream = ReaderStream::new(body);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as u64;
        digest.consume(&chunk);
        out.write_all(&chunk).await?;
    }
    out.flush().await?;
    out.sync_all().await?;

    Ok((size_bytes, format!("{:x}", digest.compute())))
}
