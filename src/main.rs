use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use picshelf::artifact::ArtifactCache;
use picshelf::client::{CACHE_NAMESPACES, RETENTION_KEY};
use picshelf::config::Config;
use picshelf::kv::KvStore;

#[derive(Parser, Debug)]
#[command(name = "picshelf")]
#[command(about = "Cache maintenance for the picshelf media cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/picshelf/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Delete cached renditions older than the retention window
  Sweep,
  /// Drop every cached entry and downloaded rendition
  Clear,
  /// Physically remove expired key-value rows
  Compact,
}

fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  match args.command {
    Command::Sweep => {
      let store = KvStore::open(&config.kv_path())?;
      let days = store.get_or(RETENTION_KEY, config.retention_days, true)?;
      let removed = ArtifactCache::new(config.cache_dir.clone()).sweep(days);
      info!(days, removed, "sweep finished");
      println!("removed {removed} files older than {days} days");
    }
    Command::Clear => {
      let store = KvStore::open(&config.kv_path())?;
      for namespace in CACHE_NAMESPACES {
        store.delete_partial(namespace)?;
      }
      ArtifactCache::new(config.cache_dir.clone()).clear();
      println!("cache cleared");
    }
    Command::Compact => {
      let store = KvStore::open(&config.kv_path())?;
      let removed = store.compact()?;
      println!("removed {removed} expired entries");
    }
  }

  Ok(())
}
