//! Error taxonomy for the cache layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes surfaced by the cache layer.
///
/// Callers can tell backend trouble apart from local storage trouble:
/// nothing reached through [`Error::Http`] or [`Error::Backend`] is ever
/// written to a cache, while [`Error::Storage`] is fatal to the call and
/// always propagates.
#[derive(Debug, Error)]
pub enum Error {
  /// Storage-engine failure (disk full, corruption, locking).
  #[error("storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  #[error("serialization error: {0}")]
  Serialize(#[from] serde_json::Error),

  /// Transport-level failure talking to the backend.
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// Backend answered with a non-success status.
  #[error("backend returned {status} for {context}")]
  Backend { status: u16, context: String },

  /// No server URL or token stored yet. Raised before any network I/O.
  #[error("no server credentials configured")]
  MissingCredentials,

  /// A downloaded rendition failed format validation. Nothing was written
  /// to disk, so the next call retries the download.
  #[error("corrupt {rendition} payload for asset {asset_id}")]
  CorruptArtifact {
    rendition: &'static str,
    asset_id: String,
  },

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("config error: {0}")]
  Config(String),

  #[error("malformed page cursor: {0}")]
  BadCursor(String),

  /// A connection lock was poisoned by a panicking writer.
  #[error("cache lock poisoned")]
  LockPoisoned,
}
