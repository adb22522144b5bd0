//! Compression envelope for cached response bodies.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::Value;

use crate::error::ApiError;

/// Serialize a response to canonical JSON and zlib-compress it.
pub fn encode(value: &Value) -> Result<Vec<u8>, ApiError> {
  let json =
    serde_json::to_vec(value).map_err(|e| ApiError::CorruptPayload(e.to_string()))?;

  let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
  encoder.write_all(&json).map_err(compression_failed)?;
  encoder.finish().map_err(compression_failed)
}

fn compression_failed(e: std::io::Error) -> ApiError {
  ApiError::CorruptPayload(format!("compression failed: {}", e))
}

/// Inverse of [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Value, ApiError> {
  let mut json = Vec::new();
  ZlibDecoder::new(bytes)
    .read_to_end(&mut json)
    .map_err(|e| ApiError::CorruptPayload(format!("not a zlib stream: {}", e)))?;

  serde_json::from_slice(&json)
    .map_err(|e| ApiError::CorruptPayload(format!("not valid JSON: {}", e)))
}
