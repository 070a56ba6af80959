//! Cached media client: the facade the presentation layer talks to.
//!
//! Wraps a [`RemoteApi`] with the key-value store, the memoizer, the bucket
//! resolver and the artifact cache, so repeated visits to the same page,
//! preview or thumbnail are served locally within their TTL windows.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::api::types::{AssetKind, AssetMetadata, AssetRecord, QueryShape, SearchHit, UploadRequest};
use crate::api::{HttpApi, RemoteApi};
use crate::artifact::{ArtifactCache, Rendition};
use crate::bucket::BucketResolver;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::kv::KvStore;
use crate::memo::Memoizer;

// Memoization identities. Invalidating one drops every cached result of
// that operation regardless of arguments.
const MEMO_TIMELINE: &str = "timeline";
const MEMO_TIMELINE_BUCKET: &str = "timeline.bucket";
const MEMO_MEMORIES: &str = "memories";
const MEMO_ALBUMS: &str = "albums";
const MEMO_ALBUM_ASSETS: &str = "album.assets";
const MEMO_ALBUM_PAGE: &str = "album.page";
const MEMO_SEARCH: &str = "search";

/// Key-value namespaces owned by the cache layer. `clear_cache` removes
/// all of them; credentials and settings live outside this list.
pub const CACHE_NAMESPACES: [&str; 7] = [
  "photo", "album", "memory", "search", "asset", "bucket", "memoize",
];

/// Setting key for the artifact retention window, shared with the
/// maintenance binary.
pub const RETENTION_KEY: &str = "settings.cache.days";

/// Memory lanes rotate daily, so their sibling pointers go stale quickly.
const MEMORY_SIBLING_TTL_SECONDS: i64 = 600;

/// A thumbnail entry in a gallery page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
  pub file_path: PathBuf,
  pub id: String,
  /// Display duration ("03:45") for videos, `None` for photos
  pub duration: Option<String>,
}

/// One day's worth of images under a "<Month> <day>" heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
  pub date: String,
  pub images: Vec<Image>,
}

/// A rendered gallery page with opaque paging cursors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePage {
  pub month: String,
  pub days: Vec<Day>,
  /// Cursor toward more recent assets
  pub next: Option<String>,
  /// Cursor toward older assets
  pub previous: Option<String>,
}

impl TimelinePage {
  fn empty() -> Self {
    Self {
      month: String::new(),
      days: Vec::new(),
      next: None,
      previous: None,
    }
  }
}

/// One memory lane with its cover thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
  pub title: String,
  pub thumbnail_path: PathBuf,
  pub first_asset_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
  pub id: String,
  pub cover_path: PathBuf,
  pub name: String,
  pub asset_count: u64,
  pub shared: bool,
}

/// Full-screen view of one asset, with sibling navigation ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
  pub file_path: PathBuf,
  pub id: String,
  pub name: String,
  pub kind: AssetKind,
  pub previous: Option<String>,
  pub next: Option<String>,
  pub favorite: bool,
}

/// Detail view of one asset including its state flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
  pub file_path: PathBuf,
  pub id: String,
  pub name: String,
  pub kind: AssetKind,
  pub favorite: bool,
  pub archived: bool,
  pub trashed: bool,
  pub previous: Option<String>,
  pub next: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
  pub hits: Vec<SearchHit>,
  pub next: Option<String>,
  pub previous: Option<String>,
}

/// Which rendered surface an asset was last seen on. Selects the adjacency
/// namespace used for sibling navigation; pointers are only valid for the
/// most recent render under that namespace, and missing or stale pointers
/// read as "no neighbor".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
  Timeline,
  Memories,
  Album(String),
  Search,
}

impl Origin {
  fn adjacency_key(&self, asset_id: &str) -> String {
    match self {
      Origin::Timeline => format!("photo.{asset_id}"),
      Origin::Memories => format!("memory.{asset_id}"),
      Origin::Album(album_id) => format!("album.{album_id}.photo.{asset_id}"),
      Origin::Search => format!("search.{asset_id}"),
    }
  }
}

/// Persist server credentials for later [`MediaClient::connect`] calls.
pub fn store_credentials(config: &Config, url: &str, token: &str) -> Result<()> {
  let store = KvStore::open(&config.kv_path())?;
  let mut batch = store.batch();
  batch.put("auth.url", &url, None)?;
  batch.put("auth.token", &token, None)?;
  store.commit(batch)
}

/// Forget stored credentials. Cached data stays until cleared or swept.
pub fn clear_credentials(config: &Config) -> Result<()> {
  let store = KvStore::open(&config.kv_path())?;
  store.delete("auth.url")?;
  store.delete("auth.token")
}

/// Media client with transparent caching.
pub struct MediaClient {
  config: Config,
  store: Arc<KvStore>,
  artifacts: ArtifactCache,
  memo: Memoizer,
  buckets: BucketResolver,
  api: Arc<dyn RemoteApi>,
}

impl MediaClient {
  /// Connect using credentials stored by [`store_credentials`]. Fails with
  /// [`Error::MissingCredentials`] before any network I/O when unset.
  pub fn connect(config: Config) -> Result<Self> {
    let store = Arc::new(KvStore::open(&config.kv_path())?);

    let url: Option<String> = store.get("auth.url")?;
    let token: Option<String> = store.get("auth.token")?;
    let (url, token) = match (url, token) {
      (Some(url), Some(token)) => (url, token),
      _ => return Err(Error::MissingCredentials),
    };

    let api = Arc::new(HttpApi::new(&url, &token)?);
    Ok(Self::assemble(config, store, api))
  }

  /// Wire an explicit API implementation (tests, alternative transports).
  pub fn with_api(config: Config, api: Arc<dyn RemoteApi>) -> Result<Self> {
    let store = Arc::new(KvStore::open(&config.kv_path())?);
    Ok(Self::assemble(config, store, api))
  }

  fn assemble(config: Config, store: Arc<KvStore>, api: Arc<dyn RemoteApi>) -> Self {
    let artifacts = ArtifactCache::new(config.cache_dir.clone());
    let memo = Memoizer::new(Arc::clone(&store));
    let buckets = BucketResolver::new(
      Arc::clone(&store),
      Duration::seconds(config.ttl.bucket_index),
    );
    Self {
      config,
      store,
      artifacts,
      memo,
      buckets,
      api,
    }
  }

  /// Whether the stored token is still accepted by the server.
  pub async fn session_valid(&self) -> Result<bool> {
    self.api.validate_token().await
  }

  // ==========================================================================
  // Gallery pages
  // ==========================================================================

  /// One timeline page. `cursor` is an opaque `"<bucket>,<offset>"` token
  /// from a previous page, or `None` for the most recent page.
  pub async fn timeline(&self, cursor: Option<&str>) -> Result<TimelinePage> {
    let args = cursor.map(str::to_string);
    self
      .memo
      .cached(MEMO_TIMELINE, self.listing_ttl(), &args, || {
        let cursor = args.clone();
        async move { self.fetch_timeline_page(cursor.as_deref()).await }
      })
      .await
  }

  async fn fetch_timeline_page(&self, cursor: Option<&str>) -> Result<TimelinePage> {
    let query = timeline_query();
    let (bucket, offset) = parse_cursor(cursor)?;

    let chain = match self
      .buckets
      .resolve(self.api.as_ref(), &query, bucket.as_deref())
      .await?
    {
      Some(chain) => chain,
      None => return Ok(TimelinePage::empty()),
    };

    let assets = self.bucket_assets(&chain.current, &query).await?;
    let page_size = self.config.page_size;
    let start = offset.min(assets.len());
    let end = (offset + page_size).min(assets.len());
    let page = &assets[start..end];

    let ids: Vec<String> = page.iter().map(|asset| asset.id.clone()).collect();
    self.write_adjacency(&ids, |id| format!("photo.{id}"), None)?;

    // Walking "next" moves toward more recent assets: earlier offsets in
    // this bucket, then the next bucket in the chain. "previous" mirrors
    // that toward older assets.
    let next = if offset == 0 {
      chain.next.as_ref().map(|bucket| format!("{bucket},0"))
    } else {
      Some(format!(
        "{},{}",
        chain.current,
        offset.saturating_sub(page_size)
      ))
    };
    let previous = if end >= assets.len() {
      chain.previous.as_ref().map(|bucket| format!("{bucket},0"))
    } else {
      Some(format!("{},{}", chain.current, end))
    };

    let month = page
      .first()
      .map(|asset| month_name(&asset.created_at))
      .unwrap_or_default();
    let images = self.fetch_thumbnails(page).await;
    let days = group_days(page, images, &month);

    Ok(TimelinePage {
      month,
      days,
      next,
      previous,
    })
  }

  /// Assets of one timeline bucket, memoized per `(bucket, query shape)`.
  async fn bucket_assets(&self, bucket: &str, query: &QueryShape) -> Result<Vec<AssetRecord>> {
    let args = (bucket.to_string(), query.clone());
    self
      .memo
      .cached(MEMO_TIMELINE_BUCKET, self.listing_ttl(), &args, || {
        let (bucket, query) = args.clone();
        async move { self.api.list_bucket_assets(&bucket, &query).await }
      })
      .await
  }

  /// Memory lanes with their cover thumbnails.
  pub async fn memories(&self) -> Result<Vec<Memory>> {
    self
      .memo
      .cached(
        MEMO_MEMORIES,
        Duration::seconds(self.config.ttl.memories),
        &(),
        || async move { self.fetch_memories().await },
      )
      .await
  }

  async fn fetch_memories(&self) -> Result<Vec<Memory>> {
    let records = self.api.memories().await?;

    let mut lanes = Vec::new();
    for record in &records {
      let first = match record.assets.first() {
        Some(first) => first,
        None => continue,
      };

      let thumbnail = self
        .artifacts
        .resolve(&Rendition::Thumbnail, &first.id, || async move {
          self.api.fetch_rendition(&first.id, &Rendition::Thumbnail).await
        })
        .await;
      let thumbnail_path = match thumbnail {
        Ok(path) => path,
        Err(e) => {
          warn!(asset = %first.id, error = %e, "memory cover fetch failed, skipping lane");
          continue;
        }
      };

      let ids: Vec<String> = record.assets.iter().map(|asset| asset.id.clone()).collect();
      self.write_adjacency(
        &ids,
        |id| format!("memory.{id}"),
        Some(Duration::seconds(MEMORY_SIBLING_TTL_SECONDS)),
      )?;

      lanes.push(Memory {
        title: record.title.clone(),
        thumbnail_path,
        first_asset_id: first.id.clone(),
      });
    }

    Ok(lanes)
  }

  /// All albums with their cover thumbnails.
  pub async fn albums(&self) -> Result<Vec<Album>> {
    self
      .memo
      .cached(MEMO_ALBUMS, self.listing_ttl(), &(), || async move {
        self.fetch_albums().await
      })
      .await
  }

  async fn fetch_albums(&self) -> Result<Vec<Album>> {
    let records = self.api.albums().await?;

    let mut albums = Vec::new();
    for record in records {
      let cover_asset_id = match record.cover_asset_id.clone() {
        Some(id) => id,
        None => continue,
      };

      let cover = self
        .artifacts
        .resolve(&Rendition::Thumbnail, &cover_asset_id, || {
          let id = cover_asset_id.clone();
          async move { self.api.fetch_rendition(&id, &Rendition::Thumbnail).await }
        })
        .await;
      let cover_path = match cover {
        Ok(path) => path,
        Err(e) => {
          warn!(album = %record.id, error = %e, "album cover fetch failed, skipping album");
          continue;
        }
      };

      albums.push(Album {
        id: record.id,
        cover_path,
        name: record.name,
        asset_count: record.asset_count,
        shared: record.shared,
      });
    }

    Ok(albums)
  }

  /// One page of an album. `cursor` is an opaque offset token from a
  /// previous page, or `None` for the first page.
  pub async fn album_page(&self, album_id: &str, cursor: Option<&str>) -> Result<TimelinePage> {
    let args = (album_id.to_string(), cursor.map(str::to_string));
    self
      .memo
      .cached(MEMO_ALBUM_PAGE, self.listing_ttl(), &args, || {
        let (album_id, cursor) = args.clone();
        async move { self.fetch_album_page(&album_id, cursor.as_deref()).await }
      })
      .await
  }

  async fn fetch_album_page(&self, album_id: &str, cursor: Option<&str>) -> Result<TimelinePage> {
    let index: usize = match cursor {
      Some(raw) => raw
        .parse()
        .map_err(|_| Error::BadCursor(raw.to_string()))?,
      None => 0,
    };

    let assets = self.album_assets(album_id).await?;
    if index >= assets.len() {
      return Ok(TimelinePage::empty());
    }
    let remaining = &assets[index..];

    // A page never crosses a month boundary, so every day group on it
    // shares one month heading.
    let month = month_name(&remaining[0].created_at);
    let mut count = 0;
    for asset in remaining {
      if count >= self.config.page_size || month_name(&asset.created_at) != month {
        break;
      }
      count += 1;
    }
    let page = &remaining[..count];

    let ids: Vec<String> = page.iter().map(|asset| asset.id.clone()).collect();
    self.write_adjacency(&ids, |id| format!("album.{album_id}.photo.{id}"), None)?;

    let next = if index == 0 {
      None
    } else {
      Some(index.saturating_sub(self.config.page_size).to_string())
    };
    let previous = if index + count >= assets.len() {
      None
    } else {
      Some((index + count).to_string())
    };

    let images = self.fetch_thumbnails(page).await;
    let days = group_days(page, images, &month);

    Ok(TimelinePage {
      month,
      days,
      next,
      previous,
    })
  }

  /// Asset list of one album, memoized separately from the page layout.
  async fn album_assets(&self, album_id: &str) -> Result<Vec<AssetRecord>> {
    let args = album_id.to_string();
    self
      .memo
      .cached(MEMO_ALBUM_ASSETS, self.listing_ttl(), &args, || {
        let album_id = args.clone();
        async move { self.api.album_assets(&album_id).await }
      })
      .await
  }

  /// Smart search with page-number cursors.
  pub async fn search(&self, query: &str, page: Option<&str>) -> Result<SearchPage> {
    let args = (query.to_string(), page.map(str::to_string));
    self
      .memo
      .cached(MEMO_SEARCH, self.listing_ttl(), &args, || {
        let (query, page) = args.clone();
        async move { self.fetch_search_page(&query, page.as_deref()).await }
      })
      .await
  }

  async fn fetch_search_page(&self, query: &str, page: Option<&str>) -> Result<SearchPage> {
    let current = page.unwrap_or("1");
    let raw = self.api.search(query, current).await?;

    let ids: Vec<String> = raw.items.iter().map(|hit| hit.id.clone()).collect();
    self.write_adjacency(&ids, |id| format!("search.{id}"), None)?;

    // Backend pages count away from the most recent results, so its
    // next page is our "previous" and the page before it is our "next".
    let next = match current.parse::<u64>() {
      Ok(n) if n > 1 => Some((n - 1).to_string()),
      _ => None,
    };

    Ok(SearchPage {
      hits: raw.items,
      next,
      previous: raw.next_page,
    })
  }

  // ==========================================================================
  // Single assets
  // ==========================================================================

  /// Full-screen preview of one asset, with sibling ids taken from the
  /// adjacency index of the surface it was rendered on.
  pub async fn preview(&self, origin: &Origin, asset_id: &str) -> Result<Preview> {
    let metadata = self.asset_metadata(asset_id).await?;

    let prefix = origin.adjacency_key(asset_id);
    let previous = self.store.get(&format!("{prefix}.previous"))?;
    let next = self.store.get(&format!("{prefix}.next"))?;

    let rendition = if metadata.kind.is_video() {
      Rendition::PreviewVideo
    } else {
      Rendition::PreviewPhoto
    };
    let file_path = self
      .artifacts
      .resolve(&rendition, asset_id, || {
        let rendition = rendition.clone();
        async move { self.api.fetch_rendition(asset_id, &rendition).await }
      })
      .await?;

    Ok(Preview {
      file_path,
      id: asset_id.to_string(),
      name: metadata.name,
      kind: metadata.kind,
      previous,
      next,
      favorite: metadata.favorite,
    })
  }

  /// Detail view of one asset: preview path, favorite/archived/trashed
  /// flags and sibling ids from the requested namespace.
  pub async fn asset_info(&self, origin: &Origin, asset_id: &str) -> Result<AssetInfo> {
    let metadata = self.asset_metadata(asset_id).await?;

    let prefix = origin.adjacency_key(asset_id);
    let previous = self.store.get(&format!("{prefix}.previous"))?;
    let next = self.store.get(&format!("{prefix}.next"))?;

    let rendition = if metadata.kind.is_video() {
      Rendition::PreviewVideo
    } else {
      Rendition::PreviewPhoto
    };
    let file_path = self
      .artifacts
      .resolve(&rendition, asset_id, || {
        let rendition = rendition.clone();
        async move { self.api.fetch_rendition(asset_id, &rendition).await }
      })
      .await?;

    Ok(AssetInfo {
      file_path,
      id: asset_id.to_string(),
      name: metadata.name,
      kind: metadata.kind,
      favorite: metadata.favorite,
      archived: metadata.archived,
      trashed: metadata.trashed,
      previous,
      next,
    })
  }

  /// Local path of the original file, downloaded on first access.
  pub async fn original(&self, asset_id: &str) -> Result<PathBuf> {
    let metadata = self.asset_metadata(asset_id).await?;

    // The backend may omit the original name; fall back to the asset id.
    let file_name = if metadata.name.is_empty() {
      asset_id.to_string()
    } else {
      metadata.name.clone()
    };

    let rendition = Rendition::Original { file_name };
    self
      .artifacts
      .resolve(&rendition, asset_id, || {
        let rendition = rendition.clone();
        async move { self.api.fetch_rendition(asset_id, &rendition).await }
      })
      .await
  }

  /// Asset metadata with a short KV cache in front of the backend lookup.
  ///
  /// The fields live as separate keys under `asset.<id>.` so a namespace
  /// clear drops them together with everything else. This lookup is
  /// indispensable for previews, so a backend failure propagates instead
  /// of degrading.
  async fn asset_metadata(&self, asset_id: &str) -> Result<AssetMetadata> {
    let name: Option<String> = self.store.get(&format!("asset.{asset_id}.name"))?;
    let kind: Option<AssetKind> = self.store.get(&format!("asset.{asset_id}.kind"))?;
    let favorite: Option<bool> = self.store.get(&format!("asset.{asset_id}.favorite"))?;
    let archived: Option<bool> = self.store.get(&format!("asset.{asset_id}.archived"))?;
    let trashed: Option<bool> = self.store.get(&format!("asset.{asset_id}.trashed"))?;

    if let (Some(name), Some(kind), Some(favorite), Some(archived), Some(trashed)) =
      (name, kind, favorite, archived, trashed)
    {
      return Ok(AssetMetadata {
        name,
        kind,
        favorite,
        archived,
        trashed,
      });
    }

    let metadata = self.api.asset_metadata(asset_id).await?;
    let ttl = Some(self.metadata_ttl());
    let mut batch = self.store.batch();
    batch.put(&format!("asset.{asset_id}.name"), &metadata.name, ttl)?;
    batch.put(&format!("asset.{asset_id}.kind"), &metadata.kind, ttl)?;
    batch.put(&format!("asset.{asset_id}.favorite"), &metadata.favorite, ttl)?;
    batch.put(&format!("asset.{asset_id}.archived"), &metadata.archived, ttl)?;
    batch.put(&format!("asset.{asset_id}.trashed"), &metadata.trashed, ttl)?;
    self.store.commit(batch)?;

    Ok(metadata)
  }

  // ==========================================================================
  // Mutations
  // ==========================================================================

  /// Upload a local file, carrying its filesystem timestamps.
  pub async fn upload(&self, path: &Path) -> Result<()> {
    let data = std::fs::read(path)?;
    let stat = std::fs::metadata(path)?;
    let modified_at = stat
      .modified()
      .map(DateTime::<Utc>::from)
      .unwrap_or_else(|_| Utc::now());
    let created_at = stat
      .created()
      .map(DateTime::<Utc>::from)
      .unwrap_or(modified_at);
    let file_name = path
      .file_name()
      .and_then(|name| name.to_str())
      .unwrap_or("upload")
      .to_string();

    self
      .api
      .upload_asset(UploadRequest {
        file_name,
        data: Bytes::from(data),
        created_at,
        modified_at,
      })
      .await
  }

  /// Mark or unmark an asset as favorite, updating the cached flag in
  /// place rather than dropping whole listings.
  pub async fn set_favorite(&self, asset_id: &str, favorite: bool) -> Result<()> {
    self.api.set_favorite(asset_id, favorite).await?;
    self.store.put(
      &format!("asset.{asset_id}.favorite"),
      &favorite,
      Some(self.metadata_ttl()),
    )
  }

  /// Archive an asset and drop the caches the change invalidates.
  pub async fn archive(&self, asset_id: &str) -> Result<()> {
    self.api.set_archived(asset_id, true).await?;
    self.invalidate_after_mutation(asset_id)
  }

  /// Move an asset to the trash and drop the caches the change invalidates.
  pub async fn delete(&self, asset_id: &str) -> Result<()> {
    self.api.trash_assets(&[asset_id.to_string()]).await?;
    self.invalidate_after_mutation(asset_id)
  }

  /// Restore a trashed asset and drop the caches the change invalidates.
  pub async fn restore(&self, asset_id: &str) -> Result<()> {
    self.api.restore_assets(&[asset_id.to_string()]).await?;
    self.invalidate_after_mutation(asset_id)
  }

  /// Memoized listings, sibling pointers and cached flags all reflect the
  /// pre-mutation state, so they go together. Bucket indices survive: the
  /// bucket set itself is assumed stable within its TTL.
  fn invalidate_after_mutation(&self, asset_id: &str) -> Result<()> {
    for identity in [
      MEMO_TIMELINE,
      MEMO_TIMELINE_BUCKET,
      MEMO_MEMORIES,
      MEMO_ALBUMS,
      MEMO_ALBUM_ASSETS,
      MEMO_ALBUM_PAGE,
      MEMO_SEARCH,
    ] {
      self.memo.invalidate(identity)?;
    }
    self.store.delete_partial("photo")?;
    self.store.delete_partial("memory")?;
    self.store.delete_partial("album")?;
    self.store.delete_partial("search")?;
    self.store.delete_partial(&format!("asset.{asset_id}"))?;
    Ok(())
  }

  // ==========================================================================
  // Cache management
  // ==========================================================================

  /// Drop every cached listing, pointer, metadata entry, bucket index and
  /// downloaded rendition. Credentials and settings survive.
  pub fn clear_cache(&self) -> Result<()> {
    for namespace in CACHE_NAMESPACES {
      self.store.delete_partial(namespace)?;
    }
    self.artifacts.clear();
    Ok(())
  }

  pub fn set_cache_retention_days(&self, days: i64) -> Result<()> {
    self.store.put(RETENTION_KEY, &days, None)
  }

  /// Retention window in days. The configured default is persisted on
  /// first read so later reads are stable.
  pub fn cache_retention_days(&self) -> Result<i64> {
    self
      .store
      .get_or(RETENTION_KEY, self.config.retention_days, true)
  }

  /// Age-based artifact eviction honoring the retention setting. Returns
  /// the number of files removed.
  pub fn sweep_cache(&self) -> Result<usize> {
    let days = self.cache_retention_days()?;
    Ok(self.artifacts.sweep(days))
  }

  // ==========================================================================
  // Internals
  // ==========================================================================

  /// Download thumbnails for one page with bounded parallelism.
  ///
  /// Results join by index, so the backend's order survives regardless of
  /// completion order. A failed download yields `None` and the asset is
  /// dropped from the page.
  async fn fetch_thumbnails(&self, assets: &[AssetRecord]) -> Vec<Option<Image>> {
    let workers = std::thread::available_parallelism()
      .map(|n| n.get())
      .unwrap_or(4);

    stream::iter(assets.iter().map(|asset| self.thumbnail_image(asset)))
      .buffered(workers)
      .collect()
      .await
  }

  async fn thumbnail_image(&self, asset: &AssetRecord) -> Option<Image> {
    let result = self
      .artifacts
      .resolve(&Rendition::Thumbnail, &asset.id, || async move {
        self.api.fetch_rendition(&asset.id, &Rendition::Thumbnail).await
      })
      .await;

    match result {
      Ok(path) => Some(Image {
        file_path: path,
        id: asset.id.clone(),
        duration: display_duration(asset.duration.as_deref()),
      }),
      Err(e) => {
        warn!(asset = %asset.id, error = %e, "thumbnail fetch failed, dropping from page");
        None
      }
    }
  }

  /// Record previous/next sibling pointers for a rendered page. All pairs
  /// land in one batched commit.
  fn write_adjacency<F>(&self, ids: &[String], prefix: F, ttl: Option<Duration>) -> Result<()>
  where
    F: Fn(&str) -> String,
  {
    if ids.is_empty() {
      return Ok(());
    }

    let mut batch = self.store.batch();
    for (i, id) in ids.iter().enumerate() {
      let key = prefix(id);
      if i > 0 {
        batch.put(&format!("{key}.previous"), &ids[i - 1], ttl)?;
      }
      if i + 1 < ids.len() {
        batch.put(&format!("{key}.next"), &ids[i + 1], ttl)?;
      }
    }
    self.store.commit(batch)
  }

  fn listing_ttl(&self) -> Duration {
    Duration::seconds(self.config.ttl.listing)
  }

  fn metadata_ttl(&self) -> Duration {
    Duration::seconds(self.config.ttl.metadata)
  }
}

fn timeline_query() -> QueryShape {
  QueryShape::from([("visibility".to_string(), "timeline".to_string())])
}

/// `"<bucket>,<offset>"` → (token, offset); `None` selects the default
/// bucket at offset 0.
fn parse_cursor(cursor: Option<&str>) -> Result<(Option<String>, usize)> {
  let raw = match cursor {
    Some(raw) => raw,
    None => return Ok((None, 0)),
  };

  let (bucket, offset) = raw
    .rsplit_once(',')
    .ok_or_else(|| Error::BadCursor(raw.to_string()))?;
  let offset = offset
    .parse()
    .map_err(|_| Error::BadCursor(raw.to_string()))?;

  Ok((Some(bucket.to_string()), offset))
}

/// Month heading from a backend timestamp; empty when unparseable.
fn month_name(created_at: &str) -> String {
  if let Ok(date) = DateTime::parse_from_rfc3339(created_at) {
    return date.format("%B").to_string();
  }
  created_at
    .get(..19)
    .and_then(|s| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
    .map(|date| date.format("%B").to_string())
    .unwrap_or_default()
}

/// Display duration ("03:45") from the backend's "0:03:45.123". All-zero
/// durations mean "not a video" and map to `None`.
fn display_duration(raw: Option<&str>) -> Option<String> {
  let raw = raw?;
  let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
  if digits.is_empty() || digits.chars().all(|c| c == '0') {
    return None;
  }
  raw.get(3..8).map(str::to_string)
}

/// Group a page's surviving images under "<Month> <day>" headings,
/// preserving backend order.
fn group_days(assets: &[AssetRecord], images: Vec<Option<Image>>, month: &str) -> Vec<Day> {
  let mut days: Vec<Day> = Vec::new();
  for (asset, image) in assets.iter().zip(images) {
    let image = match image {
      Some(image) => image,
      None => continue,
    };
    let day = asset.created_at.get(8..10).unwrap_or("");
    let date = format!("{month} {day}");
    match days.last_mut() {
      Some(last) if last.date == date => last.images.push(image),
      _ => days.push(Day {
        date,
        images: vec![image],
      }),
    }
  }
  days
}
