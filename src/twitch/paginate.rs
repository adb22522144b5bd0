//! Lazy pagination over cursor- and link-continued Kraken listings.
//!
//! A listing is exposed as a `Stream` of items. Pages are fetched on demand:
//! the next page is requested only after every item of the current one has
//! been consumed, and never once the caller's limit has been reached.

use futures::stream::{self, Stream};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::debug;
use url::Url;

use crate::cache::Params;
use crate::error::ApiError;

use super::fetcher::CachedFetcher;
use super::transport::Transport;

/// How a listing points at its next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
  /// Echo `_cursor` back as `cursor`; fall back to `_links.next`.
  Cursor,
  /// Follow `_links.next` until absent.
  Link,
}

/// Seed request of a paginated listing.
#[derive(Debug, Clone)]
pub struct PageSpec {
  pub url: String,
  pub params: Params,
  /// Name of the array holding the page's records (e.g. `follows`)
  pub items_field: &'static str,
  pub continuation: Continuation,
  /// Total number of items to yield across all pages
  pub limit: Option<usize>,
  /// Largest `limit` a single request may ask for
  pub max_page_size: usize,
}

impl PageSpec {
  pub fn new(url: impl Into<String>, items_field: &'static str, continuation: Continuation) -> Self {
    Self {
      url: url.into(),
      params: Params::new(),
      items_field,
      continuation,
      limit: None,
      max_page_size: 100,
    }
  }

  pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
    self.params.insert(key.to_string(), value.into());
    self
  }

  pub fn limit(mut self, limit: Option<usize>) -> Self {
    self.limit = limit;
    self
  }

  pub fn max_page_size(mut self, max_page_size: usize) -> Self {
    self.max_page_size = max_page_size.max(1);
    self
  }

  /// Parameters for a request to `target`, sized to what is still wanted.
  fn request_params(&self, target: &Target, emitted: usize) -> Params {
    let mut params = target.params.clone();
    if target.sized {
      let size = match self.limit {
        Some(limit) => limit.saturating_sub(emitted).min(self.max_page_size),
        None => self.max_page_size,
      };
      params.insert("limit".to_string(), size.to_string());
    }
    params
  }
}

/// One record of a listing, tagged with the page's reported total.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedItem {
  pub item: Value,
  pub total: Option<u64>,
}

/// One response of a listing.
#[derive(Debug, Default)]
pub struct Page {
  pub items: Vec<Value>,
  pub cursor: Option<String>,
  pub next_link: Option<String>,
  pub total: Option<u64>,
}

impl Page {
  pub fn from_response(mut response: Value, items_field: &str) -> Self {
    let items = match response.get_mut(items_field).map(Value::take) {
      Some(Value::Array(items)) => items,
      _ => Vec::new(),
    };

    Self {
      items,
      cursor: non_empty(response.get("_cursor")),
      next_link: non_empty(response.get("_links").and_then(|links| links.get("next"))),
      total: response.get("_total").and_then(Value::as_u64),
    }
  }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
  value
    .and_then(Value::as_str)
    .filter(|s| !s.is_empty())
    .map(String::from)
}

/// Where the next page is requested from.
#[derive(Debug, Clone)]
struct Target {
  url: String,
  params: Params,
  /// Whether the request carries our own `limit`. Followed links already
  /// encode their page size and are requested verbatim.
  sized: bool,
}

impl Target {
  fn link(current: &str, link: &str) -> Self {
    let url = Url::parse(current)
      .and_then(|base| base.join(link))
      .map(String::from)
      .unwrap_or_else(|_| link.to_string());

    Self {
      url,
      params: Params::new(),
      sized: false,
    }
  }
}

/// Mutable state of one in-flight listing.
struct PageCursor {
  next: Option<Target>,
  buffered: VecDeque<Value>,
  total: Option<u64>,
  emitted: usize,
}

impl PageCursor {
  fn start(spec: &PageSpec) -> Self {
    Self {
      next: Some(Target {
        url: spec.url.clone(),
        params: spec.params.clone(),
        sized: true,
      }),
      buffered: VecDeque::new(),
      total: None,
      emitted: 0,
    }
  }

  fn advance(&mut self, continuation: Continuation, fetched: Target, page: Page) {
    self.total = page.total;

    // An empty page ends the listing whatever it points at
    self.next = if page.items.is_empty() {
      None
    } else {
      match (continuation, page.cursor) {
        (Continuation::Cursor, Some(cursor)) => {
          let mut params = fetched.params;
          params.insert("cursor".to_string(), cursor);
          Some(Target {
            url: fetched.url,
            params,
            sized: fetched.sized,
          })
        }
        _ => page
          .next_link
          .map(|link| Target::link(&fetched.url, &link)),
      }
    };

    self.buffered.extend(page.items);
  }
}

/// Stream every item of the listing described by `spec`.
///
/// Fetch failures are yielded as the stream's last item.
pub fn paginate<'a, T: Transport>(
  fetcher: &'a CachedFetcher<T>,
  spec: PageSpec,
) -> impl Stream<Item = Result<PagedItem, ApiError>> + 'a {
  let cursor = PageCursor::start(&spec);
  stream::try_unfold((spec, cursor), move |(spec, cursor)| {
    next_item(fetcher, spec, cursor)
  })
}

type Step = Option<(PagedItem, (PageSpec, PageCursor))>;

async fn next_item<T: Transport>(
  fetcher: &CachedFetcher<T>,
  spec: PageSpec,
  mut cursor: PageCursor,
) -> Result<Step, ApiError> {
  loop {
    if spec.limit.is_some_and(|limit| cursor.emitted >= limit) {
      debug!(url = %spec.url, emitted = cursor.emitted, "pagination limit reached");
      return Ok(None);
    }

    if let Some(item) = cursor.buffered.pop_front() {
      cursor.emitted += 1;
      let item = PagedItem {
        item,
        total: cursor.total,
      };
      return Ok(Some((item, (spec, cursor))));
    }

    let Some(target) = cursor.next.take() else {
      return Ok(None);
    };

    let params = spec.request_params(&target, cursor.emitted);
    let response = fetcher.get(&target.url, &params).await?;
    let page = Page::from_response(response, spec.items_field);
    debug!(url = %target.url, items = page.items.len(), total = ?page.total, "fetched page");

    cursor.advance(spec.continuation, target, page);
  }
}
