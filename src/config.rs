use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Twitch client id sent as the `Client-Id` header
  pub client_id: Option<String>,
  pub endpoints: EndpointsConfig,
  pub paging: PagingConfig,
  pub fetch: FetchConfig,
  pub cache: CacheConfig,
}

/// Base URLs of the three services the client talks to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
  pub kraken: String,
  pub rechat: String,
  pub tmi: String,
}

impl Default for EndpointsConfig {
  fn default() -> Self {
    Self {
      kraken: "https://api.twitch.tv/kraken".to_string(),
      rechat: "https://rechat.twitch.tv/rechat-messages".to_string(),
      tmi: "https://tmi.twitch.tv".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
  /// Largest page the API will serve in one request
  pub max_page_size: usize,
  /// Width of one chat replay window, in seconds of video
  pub replay_step: u64,
}

impl Default for PagingConfig {
  fn default() -> Self {
    Self {
      max_page_size: 100,
      replay_step: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
  /// Network attempts per request when the body is not valid JSON
  pub attempts: u32,
  /// Pause between those attempts
  pub backoff_ms: u64,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      attempts: 3,
      backoff_ms: 300,
    }
  }
}

impl FetchConfig {
  pub fn backoff(&self) -> Duration {
    Duration::from_millis(self.backoff_ms)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Root of the file tree cache
  pub dir: PathBuf,
  /// SQLite database file (default: $XDG_DATA_HOME/itch/cache.db)
  pub sqlite_path: Option<PathBuf>,
  pub redis: RedisConfig,
  pub memcache: MemcacheConfig,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      dir: PathBuf::from("/tmp/itch"),
      sqlite_path: None,
      redis: RedisConfig::default(),
      memcache: MemcacheConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
  pub host: String,
  pub port: u16,
  pub password: Option<String>,
  pub db: i64,
}

impl Default for RedisConfig {
  fn default() -> Self {
    Self {
      host: "localhost".to_string(),
      port: 6379,
      password: None,
      db: 1,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemcacheConfig {
  /// `host:port` pairs; keys are spread across all of them
  pub servers: Vec<String>,
}

impl Default for MemcacheConfig {
  fn default() -> Self {
    Self {
      servers: vec!["127.0.0.1:11211".to_string()],
    }
  }
}

impl Config {
  /// Load configuration from file, then apply environment overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./itch.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/itch/config.yaml
  ///
  /// Built-in defaults are used when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    let config = config.with_env_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("itch.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("itch").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Apply `TWITCH_CLIENT_ID`, `TWITCH_CACHE_TEMP`, `REDIS_*` and
  /// `MEMCACHE_SERVERS`. Empty variables are ignored.
  fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let var = |name: &str| var(name).filter(|s| !s.is_empty());

    if let Some(id) = var("TWITCH_CLIENT_ID") {
      self.client_id = Some(id);
    }
    if let Some(dir) = var("TWITCH_CACHE_TEMP") {
      self.cache.dir = PathBuf::from(dir);
    }

    let redis = &mut self.cache.redis;
    if let Some(host) = var("REDIS_HOST") {
      redis.host = host;
    }
    if let Some(port) = var("REDIS_PORT") {
      redis.port = port
        .parse()
        .map_err(|e| eyre!("Invalid REDIS_PORT '{}': {}", port, e))?;
    }
    if let Some(password) = var("REDIS_PASSWORD") {
      redis.password = Some(password);
    }
    if let Some(db) = var("REDIS_DB") {
      redis.db = db
        .parse()
        .map_err(|e| eyre!("Invalid REDIS_DB '{}': {}", db, e))?;
    }

    if let Some(servers) = var("MEMCACHE_SERVERS") {
      self.cache.memcache.servers = servers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    }

    Ok(self)
  }

  fn validate(&self) -> Result<()> {
    for (name, base) in [
      ("kraken", &self.endpoints.kraken),
      ("rechat", &self.endpoints.rechat),
      ("tmi", &self.endpoints.tmi),
    ] {
      url::Url::parse(base).map_err(|e| eyre!("Invalid {} endpoint '{}': {}", name, base, e))?;
    }

    if self.paging.max_page_size == 0 {
      return Err(eyre!("paging.max_page_size must be at least 1"));
    }
    if self.paging.replay_step == 0 {
      return Err(eyre!("paging.replay_step must be at least 1"));
    }
    if self.fetch.attempts == 0 {
      return Err(eyre!("fetch.attempts must be at least 1"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.paging.max_page_size, 100);
    assert_eq!(config.paging.replay_step, 30);
    assert_eq!(config.fetch.attempts, 3);
    assert_eq!(config.fetch.backoff(), Duration::from_millis(300));
    assert_eq!(config.endpoints.kraken, "https://api.twitch.tv/kraken");
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let config = Config::parse(
      "client_id: abc123\npaging:\n  replay_step: 60\ncache:\n  dir: /var/cache/itch\n",
    )
    .unwrap();

    assert_eq!(config.client_id.as_deref(), Some("abc123"));
    assert_eq!(config.paging.replay_step, 60);
    assert_eq!(config.paging.max_page_size, 100);
    assert_eq!(config.cache.dir, PathBuf::from("/var/cache/itch"));
  }

  #[test]
  fn test_empty_file_is_default() {
    let config = Config::parse("  \n").unwrap();
    assert!(config.client_id.is_none());
  }

  #[test]
  fn test_env_overrides() {
    let config = Config::default()
      .with_env_overrides(|name| match name {
        "TWITCH_CLIENT_ID" => Some("from-env".to_string()),
        "TWITCH_CACHE_TEMP" => Some("/scratch".to_string()),
        "REDIS_PASSWORD" => Some(String::new()),
        _ => None,
      })
      .unwrap();

    assert_eq!(config.client_id.as_deref(), Some("from-env"));
    assert_eq!(config.cache.dir, PathBuf::from("/scratch"));
    assert!(config.cache.redis.password.is_none());
  }

  #[test]
  fn test_cache_server_defaults() {
    let config = Config::default();
    assert_eq!(config.cache.redis.host, "localhost");
    assert_eq!(config.cache.redis.port, 6379);
    assert_eq!(config.cache.redis.db, 1);
    assert_eq!(config.cache.memcache.servers, ["127.0.0.1:11211"]);
  }

  #[test]
  fn test_cache_server_env_overrides() {
    let config = Config::default()
      .with_env_overrides(|name| match name {
        "REDIS_HOST" => Some("cache.internal".to_string()),
        "REDIS_PORT" => Some("6380".to_string()),
        "REDIS_PASSWORD" => Some("hunter2".to_string()),
        "REDIS_DB" => Some("4".to_string()),
        "MEMCACHE_SERVERS" => Some("10.0.0.1:11211, 10.0.0.2:11211,".to_string()),
        _ => None,
      })
      .unwrap();

    let redis = &config.cache.redis;
    assert_eq!(redis.host, "cache.internal");
    assert_eq!(redis.port, 6380);
    assert_eq!(redis.password.as_deref(), Some("hunter2"));
    assert_eq!(redis.db, 4);
    assert_eq!(
      config.cache.memcache.servers,
      ["10.0.0.1:11211", "10.0.0.2:11211"]
    );
  }

  #[test]
  fn test_bad_redis_port_is_rejected() {
    let result = Config::default().with_env_overrides(|name| match name {
      "REDIS_PORT" => Some("sixty".to_string()),
      _ => None,
    });
    assert!(result.is_err());
  }

  #[test]
  fn test_cache_servers_from_file() {
    let config = Config::parse(
      "cache:\n  redis:\n    host: redis.local\n  memcache:\n    servers: [\"a:1\", \"b:2\"]\n",
    )
    .unwrap();

    assert_eq!(config.cache.redis.host, "redis.local");
    assert_eq!(config.cache.redis.port, 6379);
    assert_eq!(config.cache.memcache.servers, ["a:1", "b:2"]);
  }

  #[test]
  fn test_validate_rejects_bad_endpoint() {
    let mut config = Config::default();
    config.endpoints.tmi = "not a url".to_string();
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_validate_rejects_zero_step() {
    let mut config = Config::default();
    config.paging.replay_step = 0;
    assert!(config.validate().is_err());
  }
}
