//! Chat replay reconstruction from the windowed rechat endpoint.
//!
//! The endpoint only answers "messages around offset `start`", and
//! consecutive windows overlap. Replaying a video therefore means:
//! 1. Probe with `start=0`, which the endpoint rejects with a message naming
//!    the valid range (`0 is not between 1469000000 and 1469003600`).
//! 2. Walk that range in fixed steps, dropping messages the previous window
//!    already produced.
//!
//! Only the previous window's ids are remembered, so memory stays bounded by
//! two windows no matter how long the video is.

use futures::stream::{self, Stream};
use regex::Regex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;
use tracing::debug;

use crate::cache::Params;
use crate::error::ApiError;

use super::fetcher::CachedFetcher;
use super::transport::Transport;

static BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^\d+ is not between (\d+) and (\d+)").expect("boundary pattern is valid")
});

/// Replay request for one video.
#[derive(Debug, Clone)]
pub struct ReplaySpec {
  pub url: String,
  pub video_id: String,
  /// Distance between consecutive window starts
  pub step: u64,
}

impl ReplaySpec {
  fn params(&self, start: u64) -> Params {
    let mut params = Params::new();
    params.insert("video_id".to_string(), self.video_id.clone());
    params.insert("start".to_string(), start.to_string());
    params
  }
}

enum ReplayState {
  ProbingBoundary,
  Windowing(ReplayWindow),
  Exhausted,
}

struct ReplayWindow {
  /// Start of the next window to fetch, `None` once past `u64::MAX`
  start: Option<u64>,
  end: u64,
  step: u64,
  /// Ids of the window fetched before the current one (read only)
  previous: HashSet<String>,
  /// Ids of the current window
  current: HashSet<String>,
  /// New messages of the current window not yet yielded
  pending: VecDeque<Value>,
}

impl ReplayWindow {
  fn new(start: u64, end: u64, step: u64) -> Self {
    Self {
      start: Some(start),
      end,
      step: step.max(1),
      previous: HashSet::new(),
      current: HashSet::new(),
      pending: VecDeque::new(),
    }
  }

  /// Start of the next window, if it still lies within the boundary.
  fn next_start(&self) -> Option<u64> {
    self.start.filter(|start| *start <= self.end)
  }

  /// Queue the messages of a freshly fetched window and move to the next one.
  fn absorb(&mut self, messages: Vec<Value>) {
    std::mem::swap(&mut self.previous, &mut self.current);
    self.current.clear();

    for message in messages {
      let Some(id) = message_id(&message) else {
        self.pending.push_back(message);
        continue;
      };

      let repeated = self.previous.contains(&id);
      if self.current.insert(id) && !repeated {
        self.pending.push_back(message);
      }
    }

    self.start = self.start.and_then(|start| start.checked_add(self.step));
  }
}

fn message_id(message: &Value) -> Option<String> {
  match message.get("id")? {
    Value::String(s) => Some(s.clone()),
    Value::Null => None,
    other => Some(other.to_string()),
  }
}

/// Extract `(start, end)` from the boundary probe's error document.
pub fn parse_boundary(response: &Value) -> Result<(u64, u64), ApiError> {
  let detail = response
    .get("errors")
    .and_then(|errors| errors.get(0))
    .and_then(|error| error.get("detail"))
    .and_then(Value::as_str)
    .ok_or_else(|| {
      ApiError::Protocol("expected chat replay boundary error message".to_string())
    })?;

  let captures = BOUNDARY
    .captures(detail)
    .ok_or_else(|| ApiError::Protocol(format!("unrecognized replay boundary: {}", detail)))?;

  let bound = |i: usize| {
    captures[i]
      .parse::<u64>()
      .map_err(|e| ApiError::Protocol(format!("replay boundary out of range: {}", e)))
  };
  Ok((bound(1)?, bound(2)?))
}

/// Stream the deduplicated chat log of `spec.video_id`.
pub fn replay<'a, T: Transport>(
  fetcher: &'a CachedFetcher<T>,
  spec: ReplaySpec,
) -> impl Stream<Item = Result<Value, ApiError>> + 'a {
  stream::try_unfold(
    (spec, ReplayState::ProbingBoundary),
    move |(spec, state)| next_message(fetcher, spec, state),
  )
}

type Step = Option<(Value, (ReplaySpec, ReplayState))>;

async fn next_message<T: Transport>(
  fetcher: &CachedFetcher<T>,
  spec: ReplaySpec,
  mut state: ReplayState,
) -> Result<Step, ApiError> {
  loop {
    state = match state {
      ReplayState::Exhausted => return Ok(None),

      ReplayState::ProbingBoundary => {
        let response = fetcher.get(&spec.url, &spec.params(0)).await?;
        let (start, end) = parse_boundary(&response)?;
        debug!(video_id = %spec.video_id, start, end, "replay boundary");
        ReplayState::Windowing(ReplayWindow::new(start, end, spec.step))
      }

      ReplayState::Windowing(mut window) => {
        if let Some(message) = window.pending.pop_front() {
          return Ok(Some((message, (spec, ReplayState::Windowing(window)))));
        }

        match window.next_start() {
          None => ReplayState::Exhausted,
          Some(start) => match fetcher.get(&spec.url, &spec.params(start)).await {
            Ok(response) if response.get("errors").is_some() => {
              debug!(video_id = %spec.video_id, start, "replay ended early");
              ReplayState::Exhausted
            }
            Err(ApiError::Remote { error, .. }) => {
              debug!(video_id = %spec.video_id, start, %error, "replay ended early");
              ReplayState::Exhausted
            }
            Ok(mut response) => {
              let messages = match response.get_mut("data").map(Value::take) {
                Some(Value::Array(messages)) => messages,
                _ => Vec::new(),
              };
              window.absorb(messages);
              ReplayState::Windowing(window)
            }
            Err(e) => return Err(e),
          },
        }
      }
    };
  }
}
