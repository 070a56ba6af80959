//! Configurable in-memory backend used by unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::types::{
  AlbumRecord, AssetMetadata, AssetRecord, MemoryRecord, QueryShape, RawSearchPage, UploadRequest,
};
use super::RemoteApi;
use crate::artifact::Rendition;
use crate::error::{Error, Result};

/// Minimal valid WebP payload for thumbnail fetches.
pub(crate) fn webp_bytes() -> Bytes {
  let mut data = b"RIFF".to_vec();
  data.extend_from_slice(&[16, 0, 0, 0]);
  data.extend_from_slice(b"WEBPVP8 fake-payload");
  Bytes::from(data)
}

/// Convenience constructor for listing rows.
pub(crate) fn asset(id: &str, created_at: &str) -> AssetRecord {
  AssetRecord {
    id: id.to_string(),
    created_at: created_at.to_string(),
    duration: None,
  }
}

#[derive(Default)]
pub(crate) struct Calls {
  pub list_buckets: AtomicUsize,
  pub list_bucket_assets: AtomicUsize,
  pub asset_metadata: AtomicUsize,
  pub fetch_rendition: AtomicUsize,
  pub memories: AtomicUsize,
  pub albums: AtomicUsize,
  pub album_assets: AtomicUsize,
  pub search: AtomicUsize,
  pub uploads: AtomicUsize,
}

/// Backend fake: every response is seeded by the test, every call counted.
#[derive(Default)]
pub(crate) struct FakeApi {
  pub buckets: Vec<String>,
  pub bucket_assets: HashMap<String, Vec<AssetRecord>>,
  pub metadata: HashMap<String, AssetMetadata>,
  pub memories: Vec<MemoryRecord>,
  pub albums: Vec<AlbumRecord>,
  pub album_assets: HashMap<String, Vec<AssetRecord>>,
  pub search_pages: HashMap<String, RawSearchPage>,
  /// Asset ids whose rendition downloads fail with a backend error
  pub failing_renditions: HashSet<String>,
  pub calls: Calls,
  /// Mutations applied, in order ("favorite:a1:true", "trash:a2", ...)
  pub mutation_log: Mutex<Vec<String>>,
}

impl FakeApi {
  pub fn with_buckets(tokens: &[&str]) -> Self {
    Self {
      buckets: tokens.iter().map(|t| t.to_string()).collect(),
      ..Self::default()
    }
  }

  fn log_mutation(&self, entry: String) {
    self.mutation_log.lock().unwrap().push(entry);
  }
}

#[async_trait]
impl RemoteApi for FakeApi {
  async fn list_buckets(&self, _query: &QueryShape) -> Result<Vec<String>> {
    self.calls.list_buckets.fetch_add(1, Ordering::SeqCst);
    Ok(self.buckets.clone())
  }

  async fn list_bucket_assets(
    &self,
    bucket: &str,
    _query: &QueryShape,
  ) -> Result<Vec<AssetRecord>> {
    self.calls.list_bucket_assets.fetch_add(1, Ordering::SeqCst);
    Ok(self.bucket_assets.get(bucket).cloned().unwrap_or_default())
  }

  async fn asset_metadata(&self, id: &str) -> Result<AssetMetadata> {
    self.calls.asset_metadata.fetch_add(1, Ordering::SeqCst);
    self.metadata.get(id).cloned().ok_or(Error::Backend {
      status: 404,
      context: format!("asset metadata {id}"),
    })
  }

  async fn fetch_rendition(&self, id: &str, rendition: &Rendition) -> Result<Bytes> {
    self.calls.fetch_rendition.fetch_add(1, Ordering::SeqCst);
    if self.failing_renditions.contains(id) {
      return Err(Error::Backend {
        status: 500,
        context: format!("rendition {id}"),
      });
    }
    match rendition {
      Rendition::Thumbnail => Ok(webp_bytes()),
      _ => Ok(Bytes::from(format!("{}-{id}", rendition.kind()))),
    }
  }

  async fn memories(&self) -> Result<Vec<MemoryRecord>> {
    self.calls.memories.fetch_add(1, Ordering::SeqCst);
    Ok(self.memories.clone())
  }

  async fn albums(&self) -> Result<Vec<AlbumRecord>> {
    self.calls.albums.fetch_add(1, Ordering::SeqCst);
    Ok(self.albums.clone())
  }

  async fn album_assets(&self, album_id: &str) -> Result<Vec<AssetRecord>> {
    self.calls.album_assets.fetch_add(1, Ordering::SeqCst);
    Ok(self.album_assets.get(album_id).cloned().unwrap_or_default())
  }

  async fn search(&self, _query: &str, page: &str) -> Result<RawSearchPage> {
    self.calls.search.fetch_add(1, Ordering::SeqCst);
    Ok(self.search_pages.get(page).cloned().unwrap_or(RawSearchPage {
      items: Vec::new(),
      next_page: None,
    }))
  }

  async fn upload_asset(&self, _upload: UploadRequest) -> Result<()> {
    self.calls.uploads.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  async fn set_favorite(&self, id: &str, favorite: bool) -> Result<()> {
    self.log_mutation(format!("favorite:{id}:{favorite}"));
    Ok(())
  }

  async fn set_archived(&self, id: &str, archived: bool) -> Result<()> {
    self.log_mutation(format!("archive:{id}:{archived}"));
    Ok(())
  }

  async fn trash_assets(&self, ids: &[String]) -> Result<()> {
    self.log_mutation(format!("trash:{}", ids.join(",")));
    Ok(())
  }

  async fn restore_assets(&self, ids: &[String]) -> Result<()> {
    self.log_mutation(format!("restore:{}", ids.join(",")));
    Ok(())
  }

  async fn validate_token(&self) -> Result<bool> {
    Ok(true)
  }
}
