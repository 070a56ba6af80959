//! Batched write handle.

use chrono::Duration;
use serde::Serialize;

use super::store::expiry_timestamp;
use crate::error::Result;

/// Accumulates writes in memory for a single grouped commit.
///
/// Page renders queue one adjacency pair per asset; paying a storage
/// round-trip per pointer would dominate the render, so rows are staged
/// here and written in one transaction by [`super::KvStore::commit`].
pub struct WriteBatch {
  rows: Vec<(String, String, Option<i64>)>,
}

impl WriteBatch {
  pub(crate) fn new() -> Self {
    Self { rows: Vec::new() }
  }

  /// Stage an upsert. The expiry is fixed at staging time, matching a
  /// direct `put` issued at the same moment.
  pub fn put<T: Serialize>(&mut self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
    let encoded = serde_json::to_string(value)?;
    self.rows.push((key.to_string(), encoded, expiry_timestamp(ttl)));
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub(crate) fn into_rows(self) -> Vec<(String, String, Option<i64>)> {
    self.rows
  }
}
