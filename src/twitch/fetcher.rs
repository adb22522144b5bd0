//! Cached GET with bounded retry on malformed bodies.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::{decode, derive_key, encode, CacheStore, Params};
use crate::config::FetchConfig;
use crate::error::ApiError;

use super::transport::Transport;

/// Media type selecting version 3 of the Kraken API.
pub const KRAKEN_V3_ACCEPT: &str = "application/vnd.twitchtv.v3+json";

const CLIENT_ID: HeaderName = HeaderName::from_static("client-id");

/// Fetches JSON documents, serving repeated requests from an optional store.
///
/// Cache hits never touch the network. Bodies carrying an `error` field or a
/// non-empty `errors` list are never written back, and the `error` check runs
/// on hits as well.
pub struct CachedFetcher<T> {
  transport: T,
  store: Option<Arc<dyn CacheStore>>,
  headers: HeaderMap,
  attempts: u32,
  backoff: Duration,
}

impl<T: Transport> CachedFetcher<T> {
  pub fn new(
    transport: T,
    store: Option<Arc<dyn CacheStore>>,
    client_id: Option<&str>,
    fetch: &FetchConfig,
  ) -> Result<Self, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(KRAKEN_V3_ACCEPT));
    if let Some(id) = client_id {
      let value = HeaderValue::from_str(id)
        .map_err(|e| ApiError::InvalidHeader(format!("client id: {}", e)))?;
      headers.insert(CLIENT_ID, value);
    }

    Ok(Self {
      transport,
      store,
      headers,
      attempts: fetch.attempts.max(1),
      backoff: fetch.backoff(),
    })
  }

  /// GET `url` with `params` and return the decoded JSON document.
  pub async fn get(&self, url: &str, params: &Params) -> Result<Value, ApiError> {
    debug!(url, ?params, "GET");
    let key = derive_key(url, params);

    if let Some(value) = self.lookup(&key) {
      check_remote_error(&value)?;
      return Ok(value);
    }

    let value = self.fetch_json(url, params).await?;
    check_remote_error(&value)?;
    if carries_errors(&value) {
      debug!(url, "not caching response with errors");
    } else {
      self.remember(&key, &value);
    }
    Ok(value)
  }

  /// Read and decode a cached document. Unreadable entries count as misses.
  fn lookup(&self, key: &str) -> Option<Value> {
    let store = self.store.as_ref()?;

    let bytes = match store.get(key) {
      Ok(Some(bytes)) => bytes,
      Ok(None) => return None,
      Err(e) => {
        warn!(key, error = %e, "cache read failed");
        return None;
      }
    };

    match decode(&bytes) {
      Ok(value) => {
        debug!(key, "served from cache");
        Some(value)
      }
      Err(e) => {
        warn!(key, error = %e, "ignoring corrupt cache entry");
        None
      }
    }
  }

  fn remember(&self, key: &str, value: &Value) {
    let Some(store) = &self.store else {
      return;
    };

    let bytes = match encode(value) {
      Ok(bytes) => bytes,
      Err(e) => {
        warn!(key, error = %e, "failed to encode response for cache");
        return;
      }
    };
    if let Err(e) = store.set(key, &bytes) {
      warn!(key, error = %e, "cache write failed");
    }
  }

  /// Issue the request until the body parses as JSON or attempts run out.
  /// Transport failures are returned immediately.
  async fn fetch_json(&self, url: &str, params: &Params) -> Result<Value, ApiError> {
    let mut attempt = 1;
    loop {
      let body = self.transport.get(url, params, &self.headers).await?;

      match serde_json::from_slice(&body) {
        Ok(value) => return Ok(value),
        Err(source) if attempt >= self.attempts => {
          return Err(ApiError::Decode {
            url: url.to_string(),
            attempts: attempt,
            source,
          });
        }
        Err(e) => {
          warn!(url, attempt, error = %e, "malformed response, retrying");
          tokio::time::sleep(self.backoff).await;
          attempt += 1;
        }
      }
    }
  }
}

/// Fail when the document carries a non-empty `error` field.
fn check_remote_error(value: &Value) -> Result<(), ApiError> {
  let error = match value.get("error") {
    None | Some(Value::Null) | Some(Value::Bool(false)) => return Ok(()),
    Some(Value::String(s)) if s.is_empty() => return Ok(()),
    Some(Value::Array(a)) if a.is_empty() => return Ok(()),
    Some(Value::Object(o)) if o.is_empty() => return Ok(()),
    Some(Value::String(s)) => s.clone(),
    Some(other) => other.to_string(),
  };

  Err(ApiError::Remote {
    error,
    status: value
      .get("status")
      .and_then(Value::as_u64)
      .and_then(|s| u16::try_from(s).ok()),
    message: value
      .get("message")
      .and_then(Value::as_str)
      .map(String::from),
  })
}

/// Rechat reports range and lookup failures as a JSON:API `errors` list.
/// Such responses are returned to the caller but never cached.
fn carries_errors(value: &Value) -> bool {
  value
    .get("errors")
    .and_then(Value::as_array)
    .is_some_and(|errors| !errors.is_empty())
}
