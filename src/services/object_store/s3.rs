//! S3-compatible object store (AWS S3, MinIO, Cloudflare R2, ...).

use super::{
    ObjectStore, ObjectStoreError, ObjectStoreResult, PutOutcome, ensure_bucket_name_safe,
    ensure_key_safe,
};
use async_trait::async_trait;
use s3::{Bucket, Region, creds::Credentials};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tracing::{error, info};

/// Presigned S3 URLs cannot outlive seven days.
const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

pub struct S3ObjectStore {
    region: Region,
    credentials: Credentials,
}

impl S3ObjectStore {
    /// Build a store for `endpoint`. Path-style addressing is used so that
    /// MinIO and other self-hosted services work without DNS tricks.
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
    ) -> anyhow::Result<Self> {
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };
        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)?;
        Ok(Self {
            region,
            credentials,
        })
    }

    fn bucket(&self, name: &str) -> ObjectStoreResult<Box<Bucket>> {
        ensure_bucket_name_safe(name)?;
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|err| ObjectStoreError::InvalidBucket(format!("{name}: {err}")))?;
        Ok(bucket.with_path_style())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: File,
        content_type: &str,
    ) -> ObjectStoreResult<PutOutcome> {
        ensure_key_safe(key)?;
        let target = self.bucket(bucket)?;
        let start = Instant::now();

        let response = target
            .put_object_stream_with_content_type(&mut body, key, content_type)
            .await
            .map_err(|err| {
                error!(
                    error = %err,
                    bucket,
                    key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                ObjectStoreError::Upload(err.to_string())
            })?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(ObjectStoreError::Upload(format!(
                "S3 responded with status {status}"
            )));
        }

        let size_bytes = response.uploaded_bytes() as u64;
        info!(
            bucket,
            key,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(PutOutcome {
            size_bytes,
            etag: None,
        })
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> ObjectStoreResult<String> {
        ensure_key_safe(key)?;
        let target = self.bucket(bucket)?;
        let expiry_secs = u32::try_from(ttl.as_secs().min(MAX_PRESIGN_SECS))
            .map_err(|_| ObjectStoreError::Presign("ttl out of range".into()))?;

        target
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(|err| ObjectStoreError::Presign(err.to_string()))
    }
}
