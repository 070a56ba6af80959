//! Domain types shared between the remote API and the cache layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filter parameters identifying a listing query, excluding any paging
/// cursor. Hashed canonically to key bucket indices and memoized results.
pub type QueryShape = BTreeMap<String, String>;

/// One asset row from a bucket or album listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
  pub id: String,
  /// Creation timestamp as returned by the backend (ISO 8601)
  pub created_at: String,
  /// Raw duration string for videos, `None` for photos
  pub duration: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
  #[serde(rename = "IMAGE")]
  Image,
  #[serde(rename = "VIDEO")]
  Video,
}

impl AssetKind {
  pub fn is_video(self) -> bool {
    matches!(self, AssetKind::Video)
  }
}

/// Metadata for a single asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
  pub name: String,
  pub kind: AssetKind,
  pub favorite: bool,
  pub archived: bool,
  pub trashed: bool,
}

/// One memory lane (e.g. "this day, N years ago").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
  pub title: String,
  pub assets: Vec<AssetRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRecord {
  pub id: String,
  pub name: String,
  pub asset_count: u64,
  pub shared: bool,
  /// Asset used as the album cover, when the album has one
  pub cover_asset_id: Option<String>,
}

/// One search result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
  pub id: String,
  pub title: String,
  pub created_at: String,
  pub duration: Option<String>,
}

/// A raw page of search results as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSearchPage {
  pub items: Vec<SearchHit>,
  /// Token of the next (older) backend page, if any
  pub next_page: Option<String>,
}

/// Payload for uploading a new asset.
#[derive(Debug, Clone)]
pub struct UploadRequest {
  pub file_name: String,
  pub data: bytes::Bytes,
  pub created_at: chrono::DateTime<chrono::Utc>,
  pub modified_at: chrono::DateTime<chrono::Utc>,
}
