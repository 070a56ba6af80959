//! Wire-format types for the backend's JSON responses, kept separate from
//! the domain types the rest of the crate consumes.

use serde::Deserialize;

use super::types::{AlbumRecord, AssetKind, AssetMetadata, AssetRecord, MemoryRecord, SearchHit};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTimeBucket {
  pub time_bucket: String,
}

/// Columnar bucket listing: parallel arrays indexed by asset position.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBucketAssets {
  #[serde(default)]
  pub id: Vec<String>,
  #[serde(default)]
  pub file_created_at: Vec<String>,
  #[serde(default)]
  pub duration: Vec<Option<String>>,
}

impl ApiBucketAssets {
  pub fn into_records(self) -> Vec<AssetRecord> {
    let mut durations = self.duration.into_iter();
    self
      .id
      .into_iter()
      .zip(self.file_created_at)
      .map(|(id, created_at)| AssetRecord {
        id,
        created_at,
        duration: durations.next().flatten(),
      })
      .collect()
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAsset {
  #[serde(default)]
  pub original_file_name: String,
  #[serde(rename = "type", default)]
  pub asset_type: String,
  #[serde(default)]
  pub is_favorite: bool,
  #[serde(default)]
  pub is_archived: bool,
  #[serde(default)]
  pub is_trashed: bool,
}

impl ApiAsset {
  pub fn into_metadata(self) -> AssetMetadata {
    AssetMetadata {
      name: self.original_file_name,
      kind: if self.asset_type == "VIDEO" {
        AssetKind::Video
      } else {
        AssetKind::Image
      },
      favorite: self.is_favorite,
      archived: self.is_archived,
      trashed: self.is_trashed,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiMemory {
  #[serde(default)]
  pub data: ApiMemoryData,
  #[serde(default)]
  pub assets: Vec<ApiMemoryAsset>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiMemoryData {
  pub year: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMemoryAsset {
  pub id: String,
  #[serde(default)]
  pub file_created_at: String,
  #[serde(default)]
  pub duration: Option<String>,
}

impl ApiMemory {
  pub fn into_record(self) -> MemoryRecord {
    MemoryRecord {
      title: self.data.year.map(|y| y.to_string()).unwrap_or_default(),
      assets: self
        .assets
        .into_iter()
        .map(|asset| AssetRecord {
          id: asset.id,
          created_at: asset.file_created_at,
          duration: asset.duration,
        })
        .collect(),
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAlbum {
  pub id: String,
  #[serde(default)]
  pub album_name: String,
  #[serde(default)]
  pub asset_count: u64,
  #[serde(default)]
  pub shared: bool,
  #[serde(default)]
  pub album_thumbnail_asset_id: Option<String>,
}

impl ApiAlbum {
  pub fn into_record(self) -> AlbumRecord {
    AlbumRecord {
      id: self.id,
      name: self.album_name,
      asset_count: self.asset_count,
      shared: self.shared,
      cover_asset_id: self.album_thumbnail_asset_id,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiAlbumDetail {
  #[serde(default)]
  pub assets: Vec<ApiAlbumAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAlbumAsset {
  pub id: String,
  #[serde(default)]
  pub file_created_at: String,
  #[serde(default)]
  pub duration: Option<String>,
}

impl ApiAlbumAsset {
  pub fn into_record(self) -> AssetRecord {
    AssetRecord {
      id: self.id,
      created_at: self.file_created_at,
      duration: self.duration,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiSearchResponse {
  #[serde(default)]
  pub assets: ApiSearchAssets,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSearchAssets {
  #[serde(default)]
  pub items: Vec<ApiSearchItem>,
  #[serde(default)]
  pub next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSearchItem {
  pub id: String,
  #[serde(default)]
  pub original_file_name: String,
  #[serde(default)]
  pub file_created_at: String,
  #[serde(default)]
  pub duration: Option<String>,
}

impl ApiSearchItem {
  pub fn into_hit(self) -> SearchHit {
    SearchHit {
      id: self.id,
      title: self.original_file_name,
      created_at: self.file_created_at,
      duration: self.duration,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn columnar_bucket_response_zips_into_records() {
    let api: ApiBucketAssets = serde_json::from_str(
      r#"{
        "id": ["a", "b"],
        "fileCreatedAt": ["2025-07-14T10:00:00Z", "2025-07-13T09:00:00Z"],
        "duration": [null, "0:01:30.000"]
      }"#,
    )
    .unwrap();

    let records = api.into_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "a");
    assert_eq!(records[0].duration, None);
    assert_eq!(records[1].duration.as_deref(), Some("0:01:30.000"));
  }

  #[test]
  fn asset_type_falls_back_to_image() {
    let api: ApiAsset = serde_json::from_str(r#"{"originalFileName": "x.jpg"}"#).unwrap();
    let metadata = api.into_metadata();
    assert_eq!(metadata.kind, AssetKind::Image);
    assert!(!metadata.favorite);
  }
}
