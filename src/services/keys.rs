//! Storage key derivation: `<orientation>/<random-token>.<extension>`.

use crate::models::orientation::Orientation;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use thiserror::Error;

/// Random bytes behind every key token (43 chars once encoded).
pub const TOKEN_BYTES: usize = 32;

const EXTENSIONS: [(&str, &str); 4] = [
    ("video/mp4", "mp4"),
    ("video/quicktime", "mov"),
    ("video/webm", "webm"),
    ("video/x-matroska", "mkv"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("no file extension known for content type `{0}`")]
    UnsupportedContentType(String),
}

/// Strip parameters (`; codecs=...`) and lowercase a declared content type.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// File extension for a declared content type.
pub fn extension_for(content_type: &str) -> Result<&'static str, KeyError> {
    let essence = essence(content_type);
    EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| KeyError::UnsupportedContentType(content_type.to_string()))
}

/// Reverse lookup used when serving objects straight from disk.
pub fn content_type_for_key(key: &str) -> Option<&'static str> {
    let ext = key.rsplit_once('.')?.1.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(_, candidate)| *candidate == ext)
        .map(|(mime, _)| *mime)
}

/// Derive a fresh storage key.
///
/// Keys are random rather than content-addressed, so re-uploading the same
/// bytes always produces a new object.
pub fn derive_key(content_type: &str, orientation: Orientation) -> Result<String, KeyError> {
    let ext = extension_for(content_type)?;
    Ok(format!("{}/{}.{}", orientation.key_prefix(), random_token(), ext))
}

fn random_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
