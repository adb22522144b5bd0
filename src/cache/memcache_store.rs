//! Memcached cache store.

use color_eyre::{eyre::eyre, Result};
use tracing::debug;

use super::store::CacheStore;
use crate::config::MemcacheConfig;

/// Cache store spread across one or more memcached servers.
pub struct MemcacheStore {
  client: memcache::Client,
}

impl MemcacheStore {
  pub fn connect(config: &MemcacheConfig) -> Result<Self> {
    let urls = server_urls(&config.servers);
    if urls.is_empty() {
      return Err(eyre!("No memcache servers configured"));
    }

    let client = memcache::Client::connect(urls.clone())
      .map_err(|e| eyre!("Failed to connect to memcache at {}: {}", urls.join(","), e))?;

    debug!(servers = %urls.join(","), "connected to memcache");
    Ok(Self { client })
  }
}

/// Turn `host:port` entries into the `memcache://` URLs the client expects.
fn server_urls(servers: &[String]) -> Vec<String> {
  servers
    .iter()
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .map(|s| {
      if s.contains("://") {
        s.to_string()
      } else {
        format!("memcache://{}", s)
      }
    })
    .collect()
}

impl CacheStore for MemcacheStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let data: Option<Vec<u8>> = self
      .client
      .get(key)
      .map_err(|e| eyre!("Failed to read cache entry from memcache: {}", e))?;

    if data.is_some() {
      debug!(key, "cache hit");
    } else {
      debug!(key, "cache miss");
    }
    Ok(data)
  }

  fn set(&self, key: &str, value: &[u8]) -> Result<()> {
    // Expiration 0 keeps the entry until evicted
    self
      .client
      .set(key, value, 0)
      .map_err(|e| eyre!("Failed to store cache entry in memcache: {}", e))?;

    debug!(key, "cache write");
    Ok(())
  }
}
