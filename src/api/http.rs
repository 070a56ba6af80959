//! reqwest-based implementation of the remote API contract, speaking the
//! Immich-style REST endpoints.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::multipart;
use reqwest::Response;
use serde_json::json;
use url::Url;

use super::types::{
  AlbumRecord, AssetMetadata, AssetRecord, MemoryRecord, QueryShape, RawSearchPage, UploadRequest,
};
use super::wire::{
  ApiAlbum, ApiAlbumDetail, ApiAsset, ApiBucketAssets, ApiMemory, ApiSearchResponse, ApiTimeBucket,
};
use super::RemoteApi;
use crate::artifact::Rendition;
use crate::error::{Error, Result};

/// HTTP client for the remote photo service.
pub struct HttpApi {
  client: reqwest::Client,
  base: Url,
  token: String,
}

impl HttpApi {
  pub fn new(base_url: &str, token: &str) -> Result<Self> {
    let base = Url::parse(base_url)
      .map_err(|e| Error::Config(format!("invalid server url {base_url}: {e}")))?;

    Ok(Self {
      client: reqwest::Client::new(),
      base,
      token: token.to_string(),
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| Error::Config(format!("invalid endpoint {path}: {e}")))
  }

  fn get(&self, url: Url) -> reqwest::RequestBuilder {
    self.client.get(url).bearer_auth(&self.token)
  }

  /// Map a non-success status to a distinguishable backend error.
  fn check(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
      Ok(response)
    } else {
      Err(Error::Backend {
        status: status.as_u16(),
        context: context.to_string(),
      })
    }
  }
}

#[async_trait]
impl RemoteApi for HttpApi {
  async fn list_buckets(&self, query: &QueryShape) -> Result<Vec<String>> {
    let response = self
      .get(self.endpoint("/api/timeline/buckets")?)
      .query(query)
      .send()
      .await?;
    let buckets: Vec<ApiTimeBucket> = Self::check(response, "list buckets")?.json().await?;
    Ok(buckets.into_iter().map(|b| b.time_bucket).collect())
  }

  async fn list_bucket_assets(
    &self,
    bucket: &str,
    query: &QueryShape,
  ) -> Result<Vec<AssetRecord>> {
    let response = self
      .get(self.endpoint("/api/timeline/bucket")?)
      .query(query)
      .query(&[("timeBucket", bucket)])
      .send()
      .await?;
    let assets: ApiBucketAssets = Self::check(response, "list bucket assets")?.json().await?;
    Ok(assets.into_records())
  }

  async fn asset_metadata(&self, id: &str) -> Result<AssetMetadata> {
    let response = self
      .get(self.endpoint(&format!("/api/assets/{id}"))?)
      .send()
      .await?;
    let asset: ApiAsset = Self::check(response, "asset metadata")?.json().await?;
    Ok(asset.into_metadata())
  }

  async fn fetch_rendition(&self, id: &str, rendition: &Rendition) -> Result<Bytes> {
    let request = match rendition {
      Rendition::Thumbnail => self
        .get(self.endpoint(&format!("/api/assets/{id}/thumbnail"))?)
        .query(&[("size", "thumbnail")]),
      Rendition::PreviewPhoto => self
        .get(self.endpoint(&format!("/api/assets/{id}/thumbnail"))?)
        .query(&[("size", "preview")]),
      Rendition::PreviewVideo => {
        self.get(self.endpoint(&format!("/api/assets/{id}/video/playback"))?)
      }
      Rendition::Original { .. } => self.get(self.endpoint(&format!("/api/assets/{id}/original"))?),
    };

    let response = request.send().await?;
    Ok(Self::check(response, rendition.kind())?.bytes().await?)
  }

  async fn memories(&self) -> Result<Vec<MemoryRecord>> {
    let response = self
      .get(self.endpoint("/api/memories")?)
      .query(&[("for", Utc::now().to_rfc3339())])
      .send()
      .await?;
    let memories: Vec<ApiMemory> = Self::check(response, "memories")?.json().await?;
    Ok(memories.into_iter().map(ApiMemory::into_record).collect())
  }

  async fn albums(&self) -> Result<Vec<AlbumRecord>> {
    let response = self.get(self.endpoint("/api/albums")?).send().await?;
    let albums: Vec<ApiAlbum> = Self::check(response, "albums")?.json().await?;
    Ok(albums.into_iter().map(ApiAlbum::into_record).collect())
  }

  async fn album_assets(&self, album_id: &str) -> Result<Vec<AssetRecord>> {
    let response = self
      .get(self.endpoint(&format!("/api/albums/{album_id}"))?)
      .query(&[("withoutAssets", "false")])
      .send()
      .await?;
    let detail: ApiAlbumDetail = Self::check(response, "album assets")?.json().await?;
    Ok(
      detail
        .assets
        .into_iter()
        .map(|asset| asset.into_record())
        .collect(),
    )
  }

  async fn search(&self, query: &str, page: &str) -> Result<RawSearchPage> {
    let response = self
      .client
      .post(self.endpoint("/api/search/smart")?)
      .bearer_auth(&self.token)
      .json(&json!({ "query": query, "page": page }))
      .send()
      .await?;
    let search: ApiSearchResponse = Self::check(response, "search")?.json().await?;
    Ok(RawSearchPage {
      items: search
        .assets
        .items
        .into_iter()
        .map(|item| item.into_hit())
        .collect(),
      next_page: search.assets.next_page,
    })
  }

  async fn upload_asset(&self, upload: UploadRequest) -> Result<()> {
    let device_asset_id = format!(
      "picshelf-{}-{}",
      upload.file_name,
      Utc::now().timestamp()
    );
    let part = multipart::Part::bytes(upload.data.to_vec()).file_name(upload.file_name.clone());
    let form = multipart::Form::new()
      .text("deviceAssetId", device_asset_id)
      .text("deviceId", "picshelf")
      .text("fileCreatedAt", upload.created_at.to_rfc3339())
      .text("fileModifiedAt", upload.modified_at.to_rfc3339())
      .part("assetData", part);

    let response = self
      .client
      .post(self.endpoint("/api/assets")?)
      .bearer_auth(&self.token)
      .multipart(form)
      .send()
      .await?;
    Self::check(response, "upload asset")?;
    Ok(())
  }

  async fn set_favorite(&self, id: &str, favorite: bool) -> Result<()> {
    let response = self
      .client
      .put(self.endpoint(&format!("/api/assets/{id}"))?)
      .bearer_auth(&self.token)
      .json(&json!({ "isFavorite": favorite }))
      .send()
      .await?;
    Self::check(response, "set favorite")?;
    Ok(())
  }

  async fn set_archived(&self, id: &str, archived: bool) -> Result<()> {
    let visibility = if archived { "archive" } else { "timeline" };
    let response = self
      .client
      .put(self.endpoint(&format!("/api/assets/{id}"))?)
      .bearer_auth(&self.token)
      .json(&json!({ "visibility": visibility }))
      .send()
      .await?;
    Self::check(response, "set archived")?;
    Ok(())
  }

  async fn trash_assets(&self, ids: &[String]) -> Result<()> {
    let response = self
      .client
      .delete(self.endpoint("/api/assets")?)
      .bearer_auth(&self.token)
      .json(&json!({ "ids": ids }))
      .send()
      .await?;
    Self::check(response, "trash assets")?;
    Ok(())
  }

  async fn restore_assets(&self, ids: &[String]) -> Result<()> {
    let response = self
      .client
      .post(self.endpoint("/api/trash/restore/assets")?)
      .bearer_auth(&self.token)
      .json(&json!({ "ids": ids }))
      .send()
      .await?;
    Self::check(response, "restore assets")?;
    Ok(())
  }

  async fn validate_token(&self) -> Result<bool> {
    let response = self
      .client
      .post(self.endpoint("/api/auth/validateToken")?)
      .bearer_auth(&self.token)
      .send()
      .await?;
    Ok(response.status().is_success())
  }
}
