//! HTTP transport seam.

use reqwest::header::HeaderMap;
use std::future::Future;

use crate::cache::Params;
use crate::error::ApiError;

/// A black-box HTTP GET.
///
/// The status code is ignored: Kraken reports failures in the JSON body,
/// which the fetcher inspects.
pub trait Transport: Send + Sync {
  fn get(
    &self,
    url: &str,
    params: &Params,
    headers: &HeaderMap,
  ) -> impl Future<Output = Result<Vec<u8>, ApiError>> + Send;
}

/// Transport backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpTransport {
  http: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> Result<Self, ApiError> {
    let http = reqwest::Client::builder()
      .gzip(true)
      .deflate(true)
      .build()
      .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {}", e)))?;

    Ok(Self { http })
  }
}

impl Transport for HttpTransport {
  async fn get(
    &self,
    url: &str,
    params: &Params,
    headers: &HeaderMap,
  ) -> Result<Vec<u8>, ApiError> {
    let response = self
      .http
      .get(url)
      .query(params)
      .headers(headers.clone())
      .send()
      .await
      .map_err(|e| ApiError::Transport(format!("GET {} failed: {}", url, e)))?;

    let body = response
      .bytes()
      .await
      .map_err(|e| ApiError::Transport(format!("reading body of {} failed: {}", url, e)))?;

    Ok(body.to_vec())
  }
}
