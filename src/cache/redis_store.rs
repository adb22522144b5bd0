//! Redis cache store.

use color_eyre::{eyre::eyre, Result};
use redis::{Commands, ConnectionInfo, IntoConnectionInfo};
use std::sync::Mutex;
use tracing::debug;

use super::store::CacheStore;
use crate::config::RedisConfig;

/// Cache store backed by a single Redis connection.
pub struct RedisStore {
  conn: Mutex<redis::Connection>,
}

impl RedisStore {
  /// Connect to the server described by `config`.
  pub fn connect(config: &RedisConfig) -> Result<Self> {
    let client = redis::Client::open(connection_info(config)?)
      .map_err(|e| eyre!("Invalid Redis configuration: {}", e))?;

    let conn = client.get_connection().map_err(|e| {
      eyre!(
        "Failed to connect to Redis at {}:{}: {}",
        config.host,
        config.port,
        e
      )
    })?;

    debug!(host = %config.host, port = config.port, db = config.db, "connected to redis");
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }
}

fn connection_info(config: &RedisConfig) -> Result<ConnectionInfo> {
  let mut info = format!("redis://{}:{}", config.host, config.port)
    .into_connection_info()
    .map_err(|e| eyre!("Invalid Redis address: {}", e))?;
  info.redis.db = config.db;
  info.redis.password = config.password.clone();
  Ok(info)
}

impl CacheStore for RedisStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data: Option<Vec<u8>> = conn
      .get(key)
      .map_err(|e| eyre!("Failed to read cache entry from Redis: {}", e))?;

    if data.is_some() {
      debug!(key, "cache hit");
    } else {
      debug!(key, "cache miss");
    }
    Ok(data)
  }

  fn set(&self, key: &str, value: &[u8]) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .set::<_, _, ()>(key, value)
      .map_err(|e| eyre!("Failed to store cache entry in Redis: {}", e))?;

    debug!(key, "cache write");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use redis::ConnectionAddr;

  #[test]
  fn test_connection_info_from_config() {
    let config = RedisConfig {
      host: "cache.internal".to_string(),
      port: 6380,
      password: Some("hunter2".to_string()),
      db: 4,
    };

    let info = connection_info(&config).unwrap();
    assert!(matches!(&info.addr, ConnectionAddr::Tcp(host, 6380) if host == "cache.internal"));
    assert_eq!(info.redis.db, 4);
    assert_eq!(info.redis.password.as_deref(), Some("hunter2"));
  }

  #[test]
  fn test_connection_info_defaults() {
    let info = connection_info(&RedisConfig::default()).unwrap();
    assert!(matches!(&info.addr, ConnectionAddr::Tcp(host, 6379) if host == "localhost"));
    assert_eq!(info.redis.db, 1);
    assert!(info.redis.password.is_none());
  }
}
