//! File tree cache store.
//!
//! A key `abcdef...` is stored at `<root>/ab/cd/ef/.../v`, which keeps every
//! directory small even with millions of cached responses.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::store::CacheStore;

/// Distinguishes temp files of concurrent writers within one process.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Cache store that keeps one file per key under a root directory.
pub struct FileTreeStore {
  root: PathBuf,
}

impl FileTreeStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Path of the file holding `key`.
  fn entry_path(&self, key: &str) -> PathBuf {
    let mut path = self.root.clone();
    let chars: Vec<char> = key.chars().collect();
    for pair in chars.chunks(2) {
      path.push(pair.iter().collect::<String>());
    }
    path.push("v");
    path
  }
}

impl CacheStore for FileTreeStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let path = self.entry_path(key);
    if !path.is_file() {
      debug!(key, "cache miss");
      return Ok(None);
    }

    let data = std::fs::read(&path)
      .map_err(|e| eyre!("Failed to read cache file {}: {}", path.display(), e))?;
    debug!(key, "cache hit");
    Ok(Some(data))
  }

  fn set(&self, key: &str, value: &[u8]) -> Result<()> {
    let path = self.entry_path(key);
    let dir = path
      .parent()
      .ok_or_else(|| eyre!("Cache path has no parent: {}", path.display()))?;

    std::fs::create_dir_all(dir)
      .map_err(|e| eyre!("Failed to create cache directory {}: {}", dir.display(), e))?;

    // Write beside the target and rename so readers never see a partial file
    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = dir.join(format!("v.{}.{}.tmp", std::process::id(), seq));
    std::fs::write(&tmp, value)
      .map_err(|e| eyre!("Failed to write cache file {}: {}", tmp.display(), e))?;
    std::fs::rename(&tmp, &path)
      .map_err(|e| eyre!("Failed to move cache file into {}: {}", path.display(), e))?;

    debug!(key, "cache write");
    Ok(())
  }
}
