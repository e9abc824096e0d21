//! Local staging of uploaded bytes.
//!
//! Every request gets its own `StagingScope`. Each file the scope creates or
//! is told about is deleted when the scope is cleaned up, and again (best
//! effort, synchronously) when it is dropped, so a cancelled request future
//! leaves nothing behind either.

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind, SeekFrom},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, warn};
use uuid::Uuid;

/// Bytes kept from the start of an upload for container sniffing.
pub const SNIFF_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StagingResult<T> = Result<T, StagingError>;

/// Root directory for staging files.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Use `dir` for staging, creating it if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Open a new, empty scope for one request.
    pub fn scope(&self) -> StagingScope {
        StagingScope {
            dir: self.dir.clone(),
            paths: Vec::new(),
        }
    }
}

/// The set of staging files owned by one in-flight request.
#[derive(Debug)]
pub struct StagingScope {
    dir: PathBuf,
    paths: Vec<PathBuf>,
}

impl StagingScope {
    /// Create a uniquely named staging file, opened for read and write.
    pub async fn create(&mut self, extension: &str) -> StagingResult<StagingFile> {
        let path = self
            .dir
            .join(format!("upload-{}.{}", Uuid::new_v4(), extension));
        self.track(&path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        debug!("created staging file {}", path.display());

        Ok(StagingFile { path, file })
    }

    /// Take ownership of a path produced by someone else, e.g. a remux output.
    /// The file does not need to exist yet.
    pub fn track(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if !self.paths.iter().any(|p| p == path) {
            self.paths.push(path.to_path_buf());
        }
    }

    /// Delete one tracked file early, once a later stage has superseded it.
    pub async fn remove(&mut self, path: &Path) {
        remove_quietly(path).await;
        self.paths.retain(|p| p != path);
    }

    /// Delete every file this scope still tracks.
    pub async fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            remove_quietly(&path).await;
        }
    }

    #[cfg(test)]
    pub fn tracked(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for StagingScope {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(_) => debug!("removed staging file {} on drop", path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!("failed to remove staging file {}: {}", path.display(), err),
            }
        }
    }
}

async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(_) => debug!("removed staging file {}", path.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!("failed to remove staging file {}: {}", path.display(), err),
    }
}

/// Summary of a fully staged upload.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub size_bytes: u64,
    /// Up to `SNIFF_LEN` leading bytes.
    pub head: Vec<u8>,
}

impl StagedUpload {
    /// ISO base media files (MP4, MOV) open with an `ftyp` box.
    pub fn has_mp4_signature(&self) -> bool {
        self.head.windows(4).any(|w| w == b"ftyp")
    }
}

/// A staging file owned by a `StagingScope`.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
    file: File,
}

impl StagingFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream-copy `stream` into the file, then flush, sync and rewind it.
    ///
    /// Fails with `TooLarge` once more than `max_bytes` arrive, or when the
    /// source itself reports `ErrorKind::FileTooLarge` (the transport limit).
    pub async fn write_stream<S>(&mut self, stream: S, max_bytes: u64) -> StagingResult<StagedUpload>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let mut size_bytes: u64 = 0;
        let mut head = Vec::with_capacity(SNIFF_LEN);

        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = chunk_res.map_err(|err| {
                if err.kind() == ErrorKind::FileTooLarge {
                    StagingError::TooLarge { limit: max_bytes }
                } else {
                    StagingError::Io(err)
                }
            })?;

            size_bytes += chunk.len() as u64;
            if size_bytes > max_bytes {
                return Err(StagingError::TooLarge { limit: max_bytes });
            }
            if head.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }
            self.file.write_all(&chunk).await?;
        }

        self.file.flush().await?;
        self.file.sync_all().await?;
        self.rewind().await?;

        Ok(StagedUpload { size_bytes, head })
    }

    pub async fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tempfile::tempdir;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = io::Result<Bytes>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok::<_, io::Error>(Bytes::from_static(*p)))
                .collect::<Vec<_>>(),
        )
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn stages_and_cleans_up() {
        let dir = tempdir().unwrap();
        let area = StagingArea::new(dir.path()).await.unwrap();
        let mut scope = area.scope();

        let mut file = scope.create("mp4").await.unwrap();
        let staged = file
            .write_stream(chunks(&[b"\0\0\0\x18ft", b"ypisom", b"payload"]), 1024)
            .await
            .unwrap();

        assert_eq!(staged.size_bytes, 19);
        assert_eq!(staged.head, b"\0\0\0\x18ftypisom".to_vec());
        assert!(staged.has_mp4_signature());
        assert_eq!(std::fs::read(file.path()).unwrap().len(), 19);

        drop(file);
        scope.cleanup().await;
        assert_eq!(entries(dir.path()), 0);
        assert!(scope.tracked().is_empty());
    }

    #[tokio::test]
    async fn drop_removes_everything() {
        let dir = tempdir().unwrap();
        let area = StagingArea::new(dir.path()).await.unwrap();
        {
            let mut scope = area.scope();
            let mut file = scope.create("mp4").await.unwrap();
            file.write_stream(chunks(&[b"abc"]), 1024).await.unwrap();
            let extra = dir.path().join("remux-output.mp4");
            std::fs::write(&extra, b"partial").unwrap();
            scope.track(&extra);
            assert_eq!(entries(dir.path()), 2);
        }
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn enforces_size_limit() {
        let dir = tempdir().unwrap();
        let area = StagingArea::new(dir.path()).await.unwrap();
        let mut scope = area.scope();
        let mut file = scope.create("mp4").await.unwrap();

        let err = file
            .write_stream(chunks(&[b"0123456789", b"0123456789"]), 15)
            .await
            .unwrap_err();
        assert!(matches!(err, StagingError::TooLarge { limit: 15 }));
    }

    #[tokio::test]
    async fn transport_limit_maps_to_too_large() {
        let dir = tempdir().unwrap();
        let area = StagingArea::new(dir.path()).await.unwrap();
        let mut scope = area.scope();
        let mut file = scope.create("mp4").await.unwrap();

        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(io::Error::new(ErrorKind::FileTooLarge, "length limit exceeded")),
        ]);
        let err = file.write_stream(source, 1024).await.unwrap_err();
        assert!(matches!(err, StagingError::TooLarge { .. }));

        let source = stream::iter(vec![Err(io::Error::new(
            ErrorKind::ConnectionReset,
            "client went away",
        ))]);
        let err = file.write_stream(source, 1024).await.unwrap_err();
        assert!(matches!(err, StagingError::Io(_)));
    }

    #[tokio::test]
    async fn remove_drops_only_the_superseded_file() {
        let dir = tempdir().unwrap();
        let area = StagingArea::new(dir.path()).await.unwrap();
        let mut scope = area.scope();

        let raw = scope.create("mp4").await.unwrap();
        let normalized = scope.create("mp4").await.unwrap();
        let raw_path = raw.path().to_path_buf();
        drop(raw);

        scope.remove(&raw_path).await;
        assert!(!raw_path.exists());
        assert!(normalized.path().exists());
        assert_eq!(scope.tracked(), &[normalized.path().to_path_buf()]);
    }

    #[tokio::test]
    async fn scopes_never_share_names() {
        let dir = tempdir().unwrap();
        let area = StagingArea::new(dir.path()).await.unwrap();
        let mut a = area.scope();
        let mut b = area.scope();

        let fa = a.create("mp4").await.unwrap();
        let fb = b.create("mp4").await.unwrap();
        assert_ne!(fa.path(), fb.path());
    }

    #[test]
    fn signature_must_be_in_head() {
        let staged = StagedUpload {
            size_bytes: 12,
            head: b"RIFF\0\0\0\0AVI ".to_vec(),
        };
        assert!(!staged.has_mp4_signature());
    }
}
