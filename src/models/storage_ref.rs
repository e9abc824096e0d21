//! The durable pointer to an uploaded object.

use std::{fmt, str::FromStr};
use thiserror::Error;

/// A `(bucket, key)` pair identifying one object in the object store.
///
/// Stored in `VideoRecord::video_url` as `bucket,key`. Bucket names never
/// contain commas, so parsing splits at the first one and the key keeps any
/// later commas verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageReference {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed storage reference `{0}`")]
pub struct MalformedReference(pub String);

impl StorageReference {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for StorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.bucket, self.key)
    }
}

impl FromStr for StorageReference {
    type Err = MalformedReference;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.split_once(',') {
            Some((bucket, key)) if !bucket.trim().is_empty() && !key.trim().is_empty() => {
                Ok(Self::new(bucket.trim(), key.trim()))
            }
            _ => Err(MalformedReference(raw.to_string())),
        }
    }
}
