//! Scripted transport for exercising the client without a network.

use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::cache::Params;
use crate::error::ApiError;

use super::transport::Transport;

/// A request the scripted transport received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
  pub url: String,
  pub params: Params,
  pub headers: HeaderMap,
}

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
  responses: Mutex<VecDeque<Result<Vec<u8>, String>>>,
  requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn push_json(&self, value: Value) {
    self.push_body(value.to_string().as_bytes());
  }

  pub fn push_body(&self, body: &[u8]) {
    self.responses.lock().unwrap().push_back(Ok(body.to_vec()));
  }

  pub fn push_failure(&self, message: &str) {
    self
      .responses
      .lock()
      .unwrap()
      .push_back(Err(message.to_string()));
  }

  pub fn requests(&self) -> Vec<RecordedRequest> {
    self.requests.lock().unwrap().clone()
  }

  pub fn request_count(&self) -> usize {
    self.requests.lock().unwrap().len()
  }
}

impl Transport for Arc<ScriptedTransport> {
  async fn get(
    &self,
    url: &str,
    params: &Params,
    headers: &HeaderMap,
  ) -> Result<Vec<u8>, ApiError> {
    self.requests.lock().unwrap().push(RecordedRequest {
      url: url.to_string(),
      params: params.clone(),
      headers: headers.clone(),
    });

    match self.responses.lock().unwrap().pop_front() {
      Some(Ok(body)) => Ok(body),
      Some(Err(message)) => Err(ApiError::Transport(message)),
      None => Err(ApiError::Transport(format!("no scripted response for {}", url))),
    }
  }
}

/// Build a parameter map from literal pairs.
pub fn params(pairs: &[(&str, &str)]) -> Params {
  pairs
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
