//! Bucket chain resolution for O(1) timeline paging.
//!
//! The backend only exposes a bulk listing of time buckets per query shape;
//! there is no "bucket after X" endpoint. The resolver fetches the complete
//! ordered token list once, writes per-token neighbor pointers into the
//! key-value store, and serves every later navigation from two local reads
//! until the index expires.

use chrono::Duration;
use std::sync::Arc;

use crate::api::types::QueryShape;
use crate::api::RemoteApi;
use crate::error::Result;
use crate::kv::KvStore;
use crate::memo;

/// Neighbors of one bucket inside a resolved chain.
///
/// `next` points toward more recent buckets, `previous` toward older ones,
/// matching the backend's reverse-chronological listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketCursor {
  pub current: String,
  pub next: Option<String>,
  pub previous: Option<String>,
}

/// Cache-first resolver over the backend's bucket listing.
pub struct BucketResolver {
  store: Arc<KvStore>,
  ttl: Duration,
}

impl BucketResolver {
  /// All index entries for one query shape share `ttl`, so a chain expires
  /// as a whole and is re-synced on the next resolution.
  pub fn new(store: Arc<KvStore>, ttl: Duration) -> Self {
    Self { store, ttl }
  }

  /// Cursor for `current`, or for the chain's first bucket when `None`.
  ///
  /// Builds the index first if missing or expired; returns `None` only
  /// when the backend has no buckets at all for this query shape.
  pub async fn resolve(
    &self,
    api: &dyn RemoteApi,
    query: &QueryShape,
    current: Option<&str>,
  ) -> Result<Option<BucketCursor>> {
    let shape = memo::hash_args(query)?;
    self.ensure_index(api, &shape, query).await?;
    self.lookup(&shape, current)
  }

  /// Fetch and index the complete bucket list unless a live index exists.
  ///
  /// One bulk call buys unbounded O(1) lookups afterwards; the backend's
  /// bucket set for a fixed shape is assumed stable within the TTL. The
  /// pointers and the `cached` flag land in one batch, so a reader never
  /// sees the flag without the chain behind it.
  async fn ensure_index(&self, api: &dyn RemoteApi, shape: &str, query: &QueryShape) -> Result<()> {
    let built: bool = self
      .store
      .get(&format!("bucket.{shape}.cached"))?
      .unwrap_or(false);
    if built {
      return Ok(());
    }

    let tokens = api.list_buckets(query).await?;

    let mut batch = self.store.batch();
    for (i, token) in tokens.iter().enumerate() {
      if i == 0 {
        batch.put(&format!("bucket.{shape}.first"), token, Some(self.ttl))?;
      }
      // Index 0 is the most recent bucket; walking "next" moves toward it.
      if i > 0 {
        batch.put(
          &format!("bucket.{shape}.{token}.next"),
          &tokens[i - 1],
          Some(self.ttl),
        )?;
      }
      if i + 1 < tokens.len() {
        batch.put(
          &format!("bucket.{shape}.{token}.previous"),
          &tokens[i + 1],
          Some(self.ttl),
        )?;
      }
    }
    batch.put(&format!("bucket.{shape}.cached"), &true, Some(self.ttl))?;
    self.store.commit(batch)?;

    Ok(())
  }

  /// Serve a cursor from the already-built index.
  fn lookup(&self, shape: &str, current: Option<&str>) -> Result<Option<BucketCursor>> {
    let current = match current {
      Some(token) => token.to_string(),
      None => match self.store.get::<String>(&format!("bucket.{shape}.first"))? {
        Some(first) => first,
        None => return Ok(None),
      },
    };

    let next = self.store.get(&format!("bucket.{shape}.{current}.next"))?;
    let previous = self
      .store
      .get(&format!("bucket.{shape}.{current}.previous"))?;

    Ok(Some(BucketCursor {
      current,
      next,
      previous,
    }))
  }

  /// Drop every cached bucket chain, forcing a re-fetch on next use.
  pub fn invalidate_all(&self) -> Result<()> {
    self.store.delete_partial("bucket")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::fake::FakeApi;
  use std::sync::atomic::Ordering;

  fn resolver(ttl_seconds: i64) -> BucketResolver {
    BucketResolver::new(
      Arc::new(KvStore::open_in_memory().unwrap()),
      Duration::seconds(ttl_seconds),
    )
  }

  #[tokio::test]
  async fn chain_links_follow_backend_order() {
    let api = FakeApi::with_buckets(&["b0", "b1", "b2"]);
    let resolver = resolver(3600);
    let query = QueryShape::new();

    let cursor = resolver
      .resolve(&api, &query, Some("b1"))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(cursor.current, "b1");
    assert_eq!(cursor.next.as_deref(), Some("b0"));
    assert_eq!(cursor.previous.as_deref(), Some("b2"));

    // Ends of the chain have no neighbor on the outside.
    let first = resolver
      .resolve(&api, &query, Some("b0"))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(first.next, None);
    assert_eq!(first.previous.as_deref(), Some("b1"));

    let last = resolver
      .resolve(&api, &query, Some("b2"))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(last.next.as_deref(), Some("b1"));
    assert_eq!(last.previous, None);
  }

  #[tokio::test]
  async fn no_token_resolves_to_the_first_bucket() {
    let api = FakeApi::with_buckets(&["b0", "b1"]);
    let resolver = resolver(3600);

    let cursor = resolver
      .resolve(&api, &QueryShape::new(), None)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(cursor.current, "b0");
    assert_eq!(cursor.previous.as_deref(), Some("b1"));
  }

  #[tokio::test]
  async fn index_is_built_with_one_backend_call() {
    let api = FakeApi::with_buckets(&["b0", "b1", "b2"]);
    let resolver = resolver(3600);
    let query = QueryShape::new();

    for token in [None, Some("b0"), Some("b1"), Some("b2"), Some("b1")] {
      resolver.resolve(&api, &query, token).await.unwrap();
    }

    assert_eq!(api.calls.list_buckets.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn distinct_query_shapes_get_distinct_indices() {
    let api = FakeApi::with_buckets(&["b0"]);
    let resolver = resolver(3600);

    let mut favorites = QueryShape::new();
    favorites.insert("isFavorite".into(), "true".into());

    resolver.resolve(&api, &QueryShape::new(), None).await.unwrap();
    resolver.resolve(&api, &favorites, None).await.unwrap();

    assert_eq!(api.calls.list_buckets.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn expired_index_is_refetched() {
    let api = FakeApi::with_buckets(&["b0"]);
    let resolver = resolver(-1);
    let query = QueryShape::new();

    resolver.resolve(&api, &query, None).await.unwrap();
    resolver.resolve(&api, &query, None).await.unwrap();

    assert_eq!(api.calls.list_buckets.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn empty_backend_listing_yields_no_cursor() {
    let api = FakeApi::with_buckets(&[]);
    let resolver = resolver(3600);

    let cursor = resolver.resolve(&api, &QueryShape::new(), None).await.unwrap();
    assert_eq!(cursor, None);
  }

  #[tokio::test]
  async fn invalidate_all_forces_a_rebuild() {
    let api = FakeApi::with_buckets(&["b0"]);
    let resolver = resolver(3600);
    let query = QueryShape::new();

    resolver.resolve(&api, &query, None).await.unwrap();
    resolver.invalidate_all().unwrap();
    resolver.resolve(&api, &query, None).await.unwrap();

    assert_eq!(api.calls.list_buckets.load(Ordering::SeqCst), 2);
  }
}
