//! Response cache for idempotent GET requests.
//!
//! This module is transport-agnostic:
//! - `key` derives a stable digest from an endpoint and its query parameters
//! - `codec` wraps response bodies in a zlib envelope
//! - `CacheStore` is the get/set seam every backend implements: a file tree,
//!   Redis, memcached, SQLite or process memory
//!
//! The cache is best-effort. Callers must behave identically with no store.

mod codec;
mod filetree;
mod key;
mod memcache_store;
mod redis_store;
mod sqlite;
mod store;

use clap::ValueEnum;
use color_eyre::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::CacheConfig;

pub use codec::{decode, encode};
pub use filetree::FileTreeStore;
pub use key::derive_key;
pub use memcache_store::MemcacheStore;
pub use redis_store::RedisStore;
pub use sqlite::SqliteStore;
pub use store::{CacheStore, MemoryStore};

/// Query parameters of a request, kept sorted by name.
pub type Params = BTreeMap<String, String>;

/// Cache backend selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackend {
  /// One file per response under the cache directory
  File,
  /// A Redis server (`REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_DB`)
  Redis,
  /// Memcached servers (`MEMCACHE_SERVERS`)
  Memcache,
  /// A single SQLite database
  Sqlite,
  /// In-process only, gone on exit
  Memory,
}

/// Open the store for `backend`, or `None` when caching is disabled.
pub fn open_store(
  backend: Option<CacheBackend>,
  config: &CacheConfig,
) -> Result<Option<Arc<dyn CacheStore>>> {
  let store: Arc<dyn CacheStore> = match backend {
    None => return Ok(None),
    Some(CacheBackend::File) => Arc::new(FileTreeStore::new(&config.dir)),
    Some(CacheBackend::Redis) => Arc::new(RedisStore::connect(&config.redis)?),
    Some(CacheBackend::Memcache) => Arc::new(MemcacheStore::connect(&config.memcache)?),
    Some(CacheBackend::Sqlite) => {
      let path = match &config.sqlite_path {
        Some(p) => p.clone(),
        None => SqliteStore::default_path()?,
      };
      Arc::new(SqliteStore::open(&path)?)
    }
    Some(CacheBackend::Memory) => Arc::new(MemoryStore::new()),
  };
  Ok(Some(store))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_backend_names() {
    let names: Vec<String> = CacheBackend::value_variants()
      .iter()
      .filter_map(|b| b.to_possible_value())
      .map(|v| v.get_name().to_string())
      .collect();
    assert_eq!(names, ["file", "redis", "memcache", "sqlite", "memory"]);
  }

  #[test]
  fn test_memcache_backend_without_servers_fails() {
    let mut config = CacheConfig::default();
    config.memcache.servers.clear();
    assert!(open_store(Some(CacheBackend::Memcache), &config).is_err());
  }

  #[test]
  fn test_no_backend_disables_cache() {
    let config = CacheConfig::default();
    assert!(open_store(None, &config).unwrap().is_none());
  }

  #[test]
  fn test_memory_backend_stores_values() {
    let config = CacheConfig::default();
    let store = open_store(Some(CacheBackend::Memory), &config)
      .unwrap()
      .unwrap();
    store.set("k", b"v").unwrap();
    assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
  }

  #[test]
  fn test_sqlite_backend_uses_configured_path() {
    let dir = std::env::temp_dir().join(format!("itch-open-store-{}", std::process::id()));
    let config = CacheConfig {
      sqlite_path: Some(dir.join("cache.db")),
      ..CacheConfig::default()
    };

    let store = open_store(Some(CacheBackend::Sqlite), &config)
      .unwrap()
      .unwrap();
    store.set("k", b"v").unwrap();
    assert!(dir.join("cache.db").is_file());

    drop(store);
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
