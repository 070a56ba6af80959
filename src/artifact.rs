//! On-disk cache for downloaded renditions.
//!
//! Files are named deterministically from `(rendition, asset id)`, and the
//! existence of a file at its canonical path is the cache-hit signal —
//! content is never re-validated against the remote once present. Entries
//! only leave the cache through the age-based [`ArtifactCache::sweep`] or
//! an explicit [`ArtifactCache::clear`].

use bytes::Bytes;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A derived representation of a media asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendition {
  Thumbnail,
  PreviewPhoto,
  PreviewVideo,
  /// Originals keep the remote file name, nested per asset id.
  Original { file_name: String },
}

impl Rendition {
  /// Directory for this rendition, relative to the cache root.
  fn dir(&self, asset_id: &str) -> PathBuf {
    match self {
      Rendition::Thumbnail => PathBuf::from("thumbnail"),
      Rendition::PreviewPhoto => PathBuf::from("preview").join("photo"),
      Rendition::PreviewVideo => PathBuf::from("preview").join("video"),
      Rendition::Original { .. } => PathBuf::from("original").join(asset_id),
    }
  }

  fn file_name(&self, asset_id: &str) -> String {
    match self {
      Rendition::Thumbnail => format!("{asset_id}.webp"),
      Rendition::PreviewPhoto => format!("{asset_id}.jpeg"),
      Rendition::PreviewVideo => format!("{asset_id}.mp4"),
      Rendition::Original { file_name } => file_name.clone(),
    }
  }

  pub(crate) fn kind(&self) -> &'static str {
    match self {
      Rendition::Thumbnail => "thumbnail",
      Rendition::PreviewPhoto => "preview photo",
      Rendition::PreviewVideo => "preview video",
      Rendition::Original { .. } => "original",
    }
  }
}

/// Top-level directories holding cached renditions.
const RENDITION_ROOTS: [&str; 3] = ["thumbnail", "preview", "original"];

/// Download-once cache for rendition files.
pub struct ArtifactCache {
  root: PathBuf,
}

impl ArtifactCache {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Resolve `(rendition, asset_id)` to a local file, downloading on miss.
  ///
  /// Thumbnails are sniffed as WebP before being persisted; an invalid
  /// payload fails the call and leaves no file behind, so the next call
  /// retries instead of serving a cached bad result. Writes go through a
  /// unique temp file and are renamed into place, so a half-written file
  /// can never be mistaken for a hit, and two workers racing on the same
  /// asset simply overwrite each other with identical content.
  pub async fn resolve<F, Fut>(
    &self,
    rendition: &Rendition,
    asset_id: &str,
    fetch: F,
  ) -> Result<PathBuf>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Bytes>>,
  {
    let dir = self.root.join(rendition.dir(asset_id));
    let path = dir.join(rendition.file_name(asset_id));

    if path.is_file() {
      return Ok(path);
    }

    let data = fetch().await?;
    if matches!(rendition, Rendition::Thumbnail) && !is_webp(&data) {
      return Err(Error::CorruptArtifact {
        rendition: rendition.kind(),
        asset_id: asset_id.to_string(),
      });
    }

    std::fs::create_dir_all(&dir)?;
    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(&data)?;
    tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

    debug!(asset = asset_id, path = %path.display(), "stored rendition");
    Ok(path)
  }

  /// Delete cached files older than `retention_days`. Failures removing an
  /// individual file are logged and skipped. Returns the number of files
  /// removed.
  pub fn sweep(&self, retention_days: i64) -> usize {
    let age_limit = Duration::from_secs(retention_days.max(0) as u64 * 24 * 60 * 60);
    let now = SystemTime::now();
    let mut removed = 0;

    for dir in RENDITION_ROOTS {
      sweep_dir(&self.root.join(dir), now, age_limit, &mut removed);
    }
    removed
  }

  /// Remove every cached rendition.
  pub fn clear(&self) {
    for dir in RENDITION_ROOTS {
      let path = self.root.join(dir);
      if let Err(e) = std::fs::remove_dir_all(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
          warn!(path = %path.display(), error = %e, "failed to clear rendition directory");
        }
      }
    }
  }
}

fn sweep_dir(dir: &Path, now: SystemTime, age_limit: Duration, removed: &mut usize) {
  let entries = match std::fs::read_dir(dir) {
    Ok(entries) => entries,
    Err(_) => return, // missing rendition root, nothing cached yet
  };

  for entry in entries.flatten() {
    let path = entry.path();
    if path.is_dir() {
      sweep_dir(&path, now, age_limit, removed);
      continue;
    }

    let expired = entry
      .metadata()
      .and_then(|m| m.modified())
      .ok()
      .and_then(|modified| now.duration_since(modified).ok())
      .map(|age| age > age_limit)
      .unwrap_or(false);

    if expired {
      match std::fs::remove_file(&path) {
        Ok(()) => *removed += 1,
        Err(e) => debug!(path = %path.display(), error = %e, "could not remove expired file"),
      }
    }
  }
}

/// Minimal RIFF container check for WebP payloads.
fn is_webp(data: &[u8]) -> bool {
  data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}
