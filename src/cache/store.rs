//! Cache store trait and in-memory implementation.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// Trait for cache storage backends.
///
/// A store maps an opaque key to opaque bytes. Stores are shared between
/// independent sequences, so implementations must tolerate concurrent access
/// to distinct keys. Racing writers to the same key may land in any order.
pub trait CacheStore: Send + Sync {
  /// Read the bytes stored under `key`, if any.
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

  /// Store `value` under `key`, replacing any previous value.
  fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Process-local store, dropped with the process.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of cached entries.
  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.entries.lock().map(|e| e.len()).unwrap_or(0)
  }
}

impl CacheStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(key).cloned())
  }

  fn set(&self, key: &str, value: &[u8]) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert(key.to_string(), value.to_vec());
    Ok(())
  }
}
