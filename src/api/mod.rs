//! Remote media API contract and its HTTP implementation.

#[cfg(test)]
pub(crate) mod fake;
mod http;
pub mod types;
mod wire;

pub use http::HttpApi;

use async_trait::async_trait;
use bytes::Bytes;

use crate::artifact::Rendition;
use crate::error::Result;
use types::{
  AlbumRecord, AssetMetadata, AssetRecord, MemoryRecord, QueryShape, RawSearchPage, UploadRequest,
};

/// Stable contract to the remote photo service.
///
/// The cache layer only ever talks to the backend through this trait;
/// tests substitute an in-memory fake.
#[async_trait]
pub trait RemoteApi: Send + Sync {
  /// Ordered bucket tokens for a query shape, most recent first. The
  /// backend's order is authoritative and is not re-sorted.
  async fn list_buckets(&self, query: &QueryShape) -> Result<Vec<String>>;

  /// Assets inside one bucket, in the backend's display order.
  async fn list_bucket_assets(&self, bucket: &str, query: &QueryShape)
    -> Result<Vec<AssetRecord>>;

  async fn asset_metadata(&self, id: &str) -> Result<AssetMetadata>;

  /// Raw bytes of one rendition of an asset.
  async fn fetch_rendition(&self, id: &str, rendition: &Rendition) -> Result<Bytes>;

  async fn memories(&self) -> Result<Vec<MemoryRecord>>;

  async fn albums(&self) -> Result<Vec<AlbumRecord>>;

  async fn album_assets(&self, album_id: &str) -> Result<Vec<AssetRecord>>;

  async fn search(&self, query: &str, page: &str) -> Result<RawSearchPage>;

  async fn upload_asset(&self, upload: UploadRequest) -> Result<()>;

  async fn set_favorite(&self, id: &str, favorite: bool) -> Result<()>;

  async fn set_archived(&self, id: &str, archived: bool) -> Result<()>;

  async fn trash_assets(&self, ids: &[String]) -> Result<()>;

  async fn restore_assets(&self, ids: &[String]) -> Result<()>;

  /// Whether the stored token is still accepted by the server.
  async fn validate_token(&self) -> Result<bool>;
}
