//! Cache key derivation for GET requests.

use sha2::{Digest, Sha256};

use super::Params;

/// Derive the cache key for a request from its endpoint and query parameters.
///
/// Parameters are hashed in sorted key order, so insertion order never
/// matters. Every component is length-prefixed before hashing; the key
/// boundaries cannot be forged by values containing separators.
pub fn derive_key(endpoint: &str, params: &Params) -> String {
  let mut hasher = Sha256::new();
  update_field(&mut hasher, endpoint);

  // BTreeMap iterates in key order
  for (key, value) in params {
    update_field(&mut hasher, key);
    update_field(&mut hasher, value);
  }

  hex::encode(hasher.finalize())
}

fn update_field(hasher: &mut Sha256, field: &str) {
  hasher.update((field.len() as u64).to_be_bytes());
  hasher.update(field.as_bytes());
}
