//! Error taxonomy for the Kraken client core.

/// Errors surfaced by the fetcher, the paginator and the replay windower.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  /// The request never produced a response body.
  #[error("transport error: {0}")]
  Transport(String),

  /// The body was not valid JSON after every retry.
  #[error("failed to decode response from {url} after {attempts} attempts: {source}")]
  Decode {
    url: String,
    attempts: u32,
    #[source]
    source: serde_json::Error,
  },

  /// A well-formed response that carries an application-level `error` field.
  #[error("remote error: {error}{}", detail(.message))]
  Remote {
    error: String,
    status: Option<u16>,
    message: Option<String>,
  },

  /// The replay boundary probe did not yield the expected error shape.
  #[error("protocol error: {0}")]
  Protocol(String),

  /// A cached payload is not valid compressed JSON.
  #[error("corrupt cache payload: {0}")]
  CorruptPayload(String),

  /// A record did not match the model it was decoded into.
  #[error("failed to decode {model}: {source}")]
  Model {
    model: &'static str,
    #[source]
    source: serde_json::Error,
  },

  /// The configured client id cannot be sent as a header.
  #[error("invalid header value: {0}")]
  InvalidHeader(String),
}

fn detail(message: &Option<String>) -> String {
  message
    .as_deref()
    .map(|m| format!(" ({m})"))
    .unwrap_or_default()
}
