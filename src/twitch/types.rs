//! Serde-deserializable Kraken records.
//!
//! Nested records are decoded through their field types, so a follow's
//! `user` is a [`User`] and a stream's `channel` is a [`Channel`] by
//! declaration rather than by inspecting key names at runtime.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ApiError;

use super::paginate::PagedItem;

/// Sort order of follow listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
  Asc,
  Desc,
}

impl Direction {
  pub fn as_param(self) -> &'static str {
    match self {
      Direction::Asc => "ASC",
      Direction::Desc => "DESC",
    }
  }
}

/// A record decodable from a Kraken JSON document.
pub trait Record: DeserializeOwned {
  /// Name used in decode errors
  const NAME: &'static str;

  /// Attach the listing total reported by the record's page.
  fn with_total(self, _total: Option<u64>) -> Self {
    self
  }

  fn from_value(value: Value) -> Result<Self, ApiError> {
    serde_json::from_value(value).map_err(|source| ApiError::Model {
      model: Self::NAME,
      source,
    })
  }

  fn from_paged(paged: PagedItem) -> Result<Self, ApiError> {
    Ok(Self::from_value(paged.item)?.with_total(paged.total))
  }
}

/// Kraken ids are numbers on some endpoints and strings on others.
#[derive(Deserialize)]
#[serde(untagged)]
enum Id {
  Text(String),
  Number(u64),
}

impl From<Id> for String {
  fn from(id: Id) -> Self {
    match id {
      Id::Text(s) => s,
      Id::Number(n) => n.to_string(),
    }
  }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  Id::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<Id>::deserialize(deserializer)?.map(String::from))
}

// ============================================================================
// Users and channels
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct User {
  #[serde(rename = "_id", deserialize_with = "string_or_number")]
  pub id: String,
  pub name: String,
  pub display_name: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: Option<DateTime<Utc>>,
  pub bio: Option<String>,
  pub logo: Option<String>,
}

impl Record for User {
  const NAME: &'static str = "user";
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
  #[serde(rename = "_id", deserialize_with = "string_or_number")]
  pub id: String,
  pub name: String,
  pub display_name: Option<String>,
  /// Stream title
  pub status: Option<String>,
  pub game: Option<String>,
  pub url: Option<String>,
  #[serde(default)]
  pub followers: u64,
  #[serde(default)]
  pub views: u64,
  pub created_at: DateTime<Utc>,
  pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Channel {
  const NAME: &'static str = "channel";
}

// ============================================================================
// Follows
// ============================================================================

/// A user following a channel, from the channel's follower listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Follower {
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub notifications: bool,
  pub user: User,
  #[serde(skip)]
  pub total: Option<u64>,
}

impl Record for Follower {
  const NAME: &'static str = "follower";

  fn with_total(mut self, total: Option<u64>) -> Self {
    self.total = total;
    self
  }
}

/// A channel a user follows, from the user's following listing.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowedChannel {
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub notifications: bool,
  pub channel: Channel,
  #[serde(skip)]
  pub total: Option<u64>,
}

impl Record for FollowedChannel {
  const NAME: &'static str = "followed channel";

  fn with_total(mut self, total: Option<u64>) -> Self {
    self.total = total;
    self
  }
}

// ============================================================================
// Videos and live streams
// ============================================================================

/// The short channel reference embedded in video records.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelRef {
  pub name: String,
  pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
  #[serde(rename = "_id", deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default)]
  pub title: String,
  pub status: Option<String>,
  pub broadcast_type: Option<String>,
  pub recorded_at: Option<DateTime<Utc>>,
  /// Duration in seconds
  #[serde(default)]
  pub length: u64,
  #[serde(default)]
  pub views: u64,
  pub url: Option<String>,
  pub channel: Option<ChannelRef>,
  #[serde(skip)]
  pub total: Option<u64>,
}

impl Record for Video {
  const NAME: &'static str = "video";

  fn with_total(mut self, total: Option<u64>) -> Self {
    self.total = total;
    self
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Preview {
  pub small: Option<String>,
  pub medium: Option<String>,
  pub large: Option<String>,
  pub template: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveStream {
  #[serde(rename = "_id", deserialize_with = "string_or_number")]
  pub id: String,
  pub game: Option<String>,
  #[serde(default)]
  pub viewers: u64,
  pub created_at: DateTime<Utc>,
  pub channel: Channel,
  pub preview: Option<Preview>,
}

impl Record for LiveStream {
  const NAME: &'static str = "stream";
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Deserialize)]
struct ApiChatMessage {
  #[serde(default, deserialize_with = "optional_string_or_number")]
  id: Option<String>,
  attributes: ApiChatAttributes,
}

#[derive(Deserialize)]
struct ApiChatAttributes {
  #[serde(default)]
  from: String,
  #[serde(default)]
  message: String,
  /// Wall clock, milliseconds since the epoch
  timestamp: Option<i64>,
  /// Milliseconds into the video
  #[serde(rename = "video-offset")]
  video_offset: Option<i64>,
  #[serde(default)]
  tags: ApiChatTags,
}

#[derive(Default, Deserialize)]
struct ApiChatTags {
  #[serde(default)]
  subscriber: bool,
}

/// One replayed chat line, flattened from the rechat envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "ApiChatMessage")]
pub struct ChatMessage {
  /// Absent on some archived lines
  pub id: Option<String>,
  pub from: String,
  pub message: String,
  pub subscriber: bool,
  pub timestamp: Option<i64>,
  pub video_offset: Option<i64>,
}

impl From<ApiChatMessage> for ChatMessage {
  fn from(api: ApiChatMessage) -> Self {
    let attributes = api.attributes;
    Self {
      id: api.id,
      from: attributes.from,
      message: attributes.message,
      subscriber: attributes.tags.subscriber,
      timestamp: attributes.timestamp,
      video_offset: attributes.video_offset,
    }
  }
}

impl Record for ChatMessage {
  const NAME: &'static str = "chat message";
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatterGroups {
  #[serde(default)]
  pub moderators: Vec<String>,
  #[serde(default)]
  pub staff: Vec<String>,
  #[serde(default)]
  pub admins: Vec<String>,
  #[serde(default)]
  pub global_mods: Vec<String>,
  #[serde(default)]
  pub viewers: Vec<String>,
}

/// Users currently connected to a channel's chat.
#[derive(Debug, Clone, Deserialize)]
pub struct Chatters {
  #[serde(rename = "chatter_count", default)]
  pub count: u64,
  #[serde(rename = "chatters", default)]
  pub groups: ChatterGroups,
}

impl Record for Chatters {
  const NAME: &'static str = "chatters";
}
