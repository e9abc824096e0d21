//! Object storage for normalized uploads.
//!
//! Two backends implement `ObjectStore`:
//! - `local::LocalObjectStore` keeps objects on disk and signs its own
//!   retrieval URLs (served by `GET /objects/{bucket}/{*key}`).
//! - `s3::S3ObjectStore` talks to any S3-compatible service (feature
//!   `storage-s3`).

pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;

use async_trait::async_trait;
use std::{io, time::Duration};
use thiserror::Error;
use tokio::fs::File;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("invalid bucket `{0}`")]
    InvalidBucket(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("presign failed: {0}")]
    Presign(String),
    #[error("signature rejected: {0}")]
    SignatureRejected(&'static str),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// What the store reports back after a successful put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    pub size_bytes: u64,
    pub etag: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the whole of `body` under `bucket`/`key`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: File,
        content_type: &str,
    ) -> ObjectStoreResult<PutOutcome>;

    /// A URL granting read access to exactly this object for `ttl`.
    async fn presign_get(&self, bucket: &str, key: &str, ttl: Duration)
    -> ObjectStoreResult<String>;
}

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Basic key validation to avoid trivial path traversal vectors.
///
/// Rejects empty or oversized keys, keys beginning with `/`, keys containing
/// `..`, backslashes or control characters.
pub fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
    if key.is_empty()
        || key.len() > MAX_OBJECT_KEY_LEN
        || key.starts_with('/')
        || key.contains("..")
        || key.bytes().any(|b| b.is_ascii_control() || b == b'\\')
    {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// S3-style bucket names: 3–63 chars of lowercase letters, digits, dots and
/// hyphens, starting and ending with a letter or digit.
pub fn ensure_bucket_name_safe(name: &str) -> ObjectStoreResult<()> {
    let valid_chars = name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'));
    let valid_edges = name
        .chars()
        .next()
        .zip(name.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    if !(3..=63).contains(&name.len()) || !valid_chars || !valid_edges || name.contains("..") {
        return Err(ObjectStoreError::InvalidBucket(name.to_string()));
    }
    Ok(())
}
