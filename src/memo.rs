//! Function-result memoization on top of the key-value store.

use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::kv::KvStore;

/// Stable hex digest of a computation identity string.
pub fn hash_identity(identity: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(identity.as_bytes());
  hex::encode(hasher.finalize())
}

/// Stable hex digest of an argument set.
///
/// Arguments are serialized to JSON and canonicalized by recursively
/// sorting object keys, so two argument sets that differ only in key order
/// hash identically.
pub fn hash_args<A: Serialize>(args: &A) -> Result<String> {
  let value = serde_json::to_value(args)?;
  let mut canonical = String::new();
  write_canonical(&value, &mut canonical);

  let mut hasher = Sha256::new();
  hasher.update(canonical.as_bytes());
  Ok(hex::encode(hasher.finalize()))
}

fn write_canonical(value: &Value, out: &mut String) {
  match value {
    Value::Object(map) => {
      let mut keys: Vec<&String> = map.keys().collect();
      keys.sort();
      out.push('{');
      for (i, key) in keys.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        out.push_str(&Value::String((*key).clone()).to_string());
        out.push(':');
        write_canonical(&map[key.as_str()], out);
      }
      out.push('}');
    }
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        write_canonical(item, out);
      }
      out.push(']');
    }
    other => out.push_str(&other.to_string()),
  }
}

/// Caches whole computation results in the key-value store.
///
/// Keys are `memoize.<identity hash>.<args hash>`, which lets
/// [`Memoizer::invalidate`] drop every cached result of one computation
/// with a single prefix delete, independent of argument values. That is
/// the only invalidation granularity.
#[derive(Clone)]
pub struct Memoizer {
  store: Arc<KvStore>,
}

impl Memoizer {
  pub fn new(store: Arc<KvStore>) -> Self {
    Self { store }
  }

  /// Run `compute` through the cache.
  ///
  /// Only successful results are stored; a failing computation is
  /// re-attempted on every call. Two concurrent callers missing on the
  /// same key both compute and both write — last write wins, which is
  /// harmless for idempotent computations.
  pub async fn cached<A, T, F, Fut>(
    &self,
    identity: &str,
    ttl: Duration,
    args: &A,
    compute: F,
  ) -> Result<T>
  where
    A: Serialize,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let key = format!("memoize.{}.{}", hash_identity(identity), hash_args(args)?);

    if let Some(cached) = self.store.get(&key)? {
      return Ok(cached);
    }

    let result = compute().await?;
    self.store.put(&key, &result, Some(ttl))?;
    Ok(result)
  }

  /// Drop every cached result of `identity`, regardless of arguments.
  pub fn invalidate(&self, identity: &str) -> Result<()> {
    self
      .store
      .delete_partial(&format!("memoize.{}", hash_identity(identity)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::Error;
  use serde::{Deserialize, Serialize};
  use std::sync::atomic::{AtomicUsize, Ordering};

  // Same logical argument set, fields declared in opposite order.
  #[derive(Serialize)]
  struct ArgsXy {
    x: i32,
    y: i32,
  }

  #[derive(Serialize)]
  struct ArgsYx {
    y: i32,
    x: i32,
  }

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Listing {
    ids: Vec<String>,
  }

  fn memoizer() -> Memoizer {
    Memoizer::new(Arc::new(KvStore::open_in_memory().unwrap()))
  }

  #[test]
  fn arg_hash_ignores_key_order() {
    let a = hash_args(&ArgsXy { x: 1, y: 2 }).unwrap();
    let b = hash_args(&ArgsYx { y: 2, x: 1 }).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn arg_hash_distinguishes_values() {
    let a = hash_args(&ArgsXy { x: 1, y: 2 }).unwrap();
    let b = hash_args(&ArgsXy { x: 2, y: 1 }).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn canonical_form_sorts_nested_objects() {
    let value = serde_json::json!({
      "outer": { "b": [1, 2], "a": { "z": 1, "y": 2 } }
    });
    let mut out = String::new();
    write_canonical(&value, &mut out);
    assert_eq!(out, r#"{"outer":{"a":{"y":2,"z":1},"b":[1,2]}}"#);
  }

  #[tokio::test]
  async fn second_call_hits_the_cache() {
    let memo = memoizer();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
      let result: Listing = memo
        .cached("timeline", Duration::seconds(300), &("b1", 0), || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(Listing {
            ids: vec!["a".into()],
          })
        })
        .await
        .unwrap();
      assert_eq!(result.ids, vec!["a"]);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn errors_are_not_cached() {
    let memo = memoizer();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
      let result: Result<Listing> = memo
        .cached("timeline", Duration::seconds(300), &(), || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Err(Error::Backend {
            status: 503,
            context: "timeline".into(),
          })
        })
        .await;
      assert!(result.is_err());
    }

    // The failed computation was re-attempted on the second call.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn invalidate_is_scoped_to_one_identity() {
    let memo = memoizer();
    let f_calls = AtomicUsize::new(0);
    let g_calls = AtomicUsize::new(0);

    for round in 0..2 {
      let _: i64 = memo
        .cached("f", Duration::seconds(300), &(1,), || async {
          f_calls.fetch_add(1, Ordering::SeqCst);
          Ok(1i64)
        })
        .await
        .unwrap();
      let _: i64 = memo
        .cached("g", Duration::seconds(300), &(1,), || async {
          g_calls.fetch_add(1, Ordering::SeqCst);
          Ok(2i64)
        })
        .await
        .unwrap();

      if round == 0 {
        memo.invalidate("f").unwrap();
      }
    }

    // f recomputed after invalidation, g stayed cached.
    assert_eq!(f_calls.load(Ordering::SeqCst), 2);
    assert_eq!(g_calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn expired_entry_recomputes() {
    let memo = memoizer();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
      let _: i64 = memo
        .cached("stale", Duration::seconds(-1), &(), || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(7i64)
        })
        .await
        .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
