use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Directory holding downloaded renditions (default: XDG cache dir)
  #[serde(default = "default_cache_dir")]
  pub cache_dir: PathBuf,
  /// Directory holding the key-value database (default: XDG data dir)
  #[serde(default = "default_data_dir")]
  pub data_dir: PathBuf,
  /// Assets per gallery page
  #[serde(default = "default_page_size")]
  pub page_size: usize,
  /// Artifact retention in days, used until the user stores their own value
  #[serde(default = "default_retention_days")]
  pub retention_days: i64,
  #[serde(default)]
  pub ttl: TtlConfig,
}

/// Cache windows in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TtlConfig {
  /// Memoized listing results (timeline pages, albums, search)
  #[serde(default = "default_listing_ttl")]
  pub listing: i64,
  /// Memories refresh twice a day
  #[serde(default = "default_memories_ttl")]
  pub memories: i64,
  /// Bucket index re-sync window
  #[serde(default = "default_bucket_ttl")]
  pub bucket_index: i64,
  /// Cached asset metadata (name, kind, flags)
  #[serde(default = "default_metadata_ttl")]
  pub metadata: i64,
}

fn default_cache_dir() -> PathBuf {
  dirs::cache_dir()
    .unwrap_or_else(|| PathBuf::from(".cache"))
    .join("picshelf")
}

fn default_data_dir() -> PathBuf {
  dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .unwrap_or_else(|| PathBuf::from(".local/share"))
    .join("picshelf")
}

fn default_page_size() -> usize {
  100
}

fn default_retention_days() -> i64 {
  30
}

fn default_listing_ttl() -> i64 {
  300
}

fn default_memories_ttl() -> i64 {
  43200
}

fn default_bucket_ttl() -> i64 {
  3600
}

fn default_metadata_ttl() -> i64 {
  300
}

impl Default for TtlConfig {
  fn default() -> Self {
    Self {
      listing: default_listing_ttl(),
      memories: default_memories_ttl(),
      bucket_index: default_bucket_ttl(),
      metadata: default_metadata_ttl(),
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      cache_dir: default_cache_dir(),
      data_dir: default_data_dir(),
      page_size: default_page_size(),
      retention_days: default_retention_days(),
      ttl: TtlConfig::default(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./picshelf.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/picshelf/config.yaml
  ///
  /// Every field has a default, so a missing file yields the default
  /// configuration rather than an error.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(Error::Config(format!(
          "config file not found: {}",
          p.display()
        )));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("picshelf.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("picshelf").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;

    serde_yaml::from_str(&contents)
      .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
  }

  /// Location of the key-value database file.
  pub fn kv_path(&self) -> PathBuf {
    self.data_dir.join("kv.db")
  }
}
