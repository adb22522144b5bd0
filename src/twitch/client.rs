//! High-level Twitch client built on the cached fetcher.

use futures::stream::{Stream, StreamExt};
use std::sync::Arc;

use crate::cache::{CacheStore, Params};
use crate::config::{Config, EndpointsConfig, PagingConfig};
use crate::error::ApiError;

use super::fetcher::CachedFetcher;
use super::paginate::{paginate, Continuation, PageSpec};
use super::replay::{replay, ReplaySpec};
use super::transport::{HttpTransport, Transport};
use super::types::{
  Channel, ChatMessage, Chatters, Direction, FollowedChannel, Follower, LiveStream, Record, User,
  Video,
};

/// Twitch API client.
///
/// Listings are returned as lazy streams: nothing is fetched until the
/// stream is polled, and dropping it stops further requests.
pub struct TwitchClient<T> {
  fetcher: CachedFetcher<T>,
  endpoints: EndpointsConfig,
  paging: PagingConfig,
}

impl TwitchClient<HttpTransport> {
  /// Build a client talking HTTP, caching into `store` when given.
  pub fn from_config(config: &Config, store: Option<Arc<dyn CacheStore>>) -> Result<Self, ApiError> {
    let fetcher = CachedFetcher::new(
      HttpTransport::new()?,
      store,
      config.client_id.as_deref(),
      &config.fetch,
    )?;
    Ok(Self::new(fetcher, config))
  }
}

impl<T: Transport> TwitchClient<T> {
  pub fn new(fetcher: CachedFetcher<T>, config: &Config) -> Self {
    Self {
      fetcher,
      endpoints: config.endpoints.clone(),
      paging: config.paging.clone(),
    }
  }

  /// Get a channel by name.
  pub async fn channel(&self, name: &str) -> Result<Channel, ApiError> {
    let url = format!("{}/channels/{}", self.endpoints.kraken, normalize(name));
    self.get_record(&url).await
  }

  /// Get a user by name.
  pub async fn user(&self, name: &str) -> Result<User, ApiError> {
    let url = format!("{}/users/{}", self.endpoints.kraken, normalize(name));
    self.get_record(&url).await
  }

  /// Users following `channel`.
  pub fn followers(
    &self,
    channel: &str,
    direction: Direction,
    limit: Option<usize>,
  ) -> impl Stream<Item = Result<Follower, ApiError>> + '_ {
    let url = format!("{}/channels/{}/follows", self.endpoints.kraken, normalize(channel));
    let spec = self.follow_spec(url, direction, limit);
    paginate(&self.fetcher, spec).map(|item| item.and_then(Follower::from_paged))
  }

  /// Channels `user` follows.
  pub fn following(
    &self,
    user: &str,
    direction: Direction,
    limit: Option<usize>,
  ) -> impl Stream<Item = Result<FollowedChannel, ApiError>> + '_ {
    let url = format!("{}/users/{}/follows/channels", self.endpoints.kraken, normalize(user));
    let spec = self.follow_spec(url, direction, limit);
    paginate(&self.fetcher, spec).map(|item| item.and_then(FollowedChannel::from_paged))
  }

  /// Number of channels `user` follows, read from a one-item listing.
  pub async fn count_following(&self, user: &str) -> Result<u64, ApiError> {
    let listing = self.following(user, Direction::Asc, Some(1));
    futures::pin_mut!(listing);
    match listing.next().await {
      Some(follow) => Ok(follow?.total.unwrap_or(0)),
      None => Ok(0),
    }
  }

  /// The channel's current broadcast, if it is live.
  pub async fn live_stream(&self, channel: &str) -> Result<Option<LiveStream>, ApiError> {
    let url = format!("{}/streams/{}", self.endpoints.kraken, normalize(channel));
    let mut response = self.fetcher.get(&url, &Params::new()).await?;

    match response.get_mut("stream").map(serde_json::Value::take) {
      Some(stream) if !stream.is_null() => LiveStream::from_value(stream).map(Some),
      _ => Ok(None),
    }
  }

  /// Archived broadcasts of `channel`, newest first.
  pub fn past_broadcasts(
    &self,
    channel: &str,
    limit: Option<usize>,
  ) -> impl Stream<Item = Result<Video, ApiError>> + '_ {
    let url = format!("{}/channels/{}/videos", self.endpoints.kraken, normalize(channel));
    let spec = PageSpec::new(url, "videos", Continuation::Link)
      .param("broadcasts", "true")
      .limit(limit)
      .max_page_size(self.paging.max_page_size);
    paginate(&self.fetcher, spec).map(|item| item.and_then(Video::from_paged))
  }

  /// Get a video by id (e.g. `v106400740`).
  pub async fn video(&self, id: &str) -> Result<Video, ApiError> {
    let url = format!("{}/videos/{}", self.endpoints.kraken, id.trim());
    self.get_record(&url).await
  }

  /// The deduplicated chat log of a past broadcast.
  pub fn chat_replay(&self, video_id: &str) -> impl Stream<Item = Result<ChatMessage, ApiError>> + '_ {
    let spec = ReplaySpec {
      url: self.endpoints.rechat.clone(),
      video_id: video_id.trim().to_string(),
      step: self.paging.replay_step,
    };
    replay(&self.fetcher, spec).map(|message| message.and_then(ChatMessage::from_value))
  }

  /// A single archived chat line by id.
  pub async fn chat_message(&self, id: &str) -> Result<ChatMessage, ApiError> {
    let url = format!("{}/rechat-message/{}", self.endpoints.rechat, id.trim());
    self.get_record(&url).await
  }

  /// Users currently in `channel`'s chat.
  pub async fn chatters(&self, channel: &str) -> Result<Chatters, ApiError> {
    let url = format!("{}/group/user/{}/chatters", self.endpoints.tmi, normalize(channel));
    self.get_record(&url).await
  }

  fn follow_spec(&self, url: String, direction: Direction, limit: Option<usize>) -> PageSpec {
    PageSpec::new(url, "follows", Continuation::Cursor)
      .param("direction", direction.as_param())
      .limit(limit)
      .max_page_size(self.paging.max_page_size)
  }

  async fn get_record<R: Record>(&self, url: &str) -> Result<R, ApiError> {
    let response = self.fetcher.get(url, &Params::new()).await?;
    R::from_value(response)
  }
}

fn normalize(name: &str) -> String {
  name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::twitch::testing::{params, ScriptedTransport};
  use futures::TryStreamExt;
  use serde_json::{json, Value};

  fn client(transport: &Arc<ScriptedTransport>) -> TwitchClient<Arc<ScriptedTransport>> {
    let config = Config::default();
    let fetcher = CachedFetcher::new(Arc::clone(transport), None, None, &config.fetch).unwrap();
    TwitchClient::new(fetcher, &config)
  }

  fn user(name: &str, created_at: &str) -> Value {
    json!({ "_id": 1, "name": name, "created_at": created_at })
  }

  fn channel(name: &str) -> Value {
    json!({ "_id": 2, "name": name, "created_at": "2012-01-01T00:00:00Z", "followers": 10 })
  }

  #[tokio::test]
  async fn test_channel_name_is_normalized() {
    let transport = ScriptedTransport::new();
    transport.push_json(channel("foo"));

    let found = client(&transport).channel("  Foo ").await.unwrap();
    assert_eq!(found.name, "foo");
    assert_eq!(found.followers, 10);
    assert_eq!(
      transport.requests()[0].url,
      "https://api.twitch.tv/kraken/channels/foo"
    );
  }

  #[tokio::test]
  async fn test_missing_channel_is_a_remote_error() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({ "error": "Not Found", "status": 404, "message": "Channel 'nope' does not exist" }));

    let err = client(&transport).channel("nope").await.unwrap_err();
    assert!(matches!(err, ApiError::Remote { status: Some(404), .. }));
  }

  #[tokio::test]
  async fn test_followers_stream() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({
      "_total": 2,
      "_cursor": "next",
      "follows": [
        { "created_at": "2017-01-02T00:00:00Z", "user": user("a", "2016-01-01T00:00:00Z") },
        { "created_at": "2017-01-03T00:00:00Z", "user": user("b", "2016-01-01T00:00:00Z") }
      ]
    }));
    transport.push_json(json!({ "_total": 2, "follows": [] }));
    let client = client(&transport);

    let followers: Vec<Follower> = client
      .followers("Foo", Direction::Desc, None)
      .try_collect()
      .await
      .unwrap();

    let names: Vec<&str> = followers.iter().map(|f| f.user.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    assert!(followers.iter().all(|f| f.total == Some(2)));

    let requests = transport.requests();
    assert_eq!(requests[0].url, "https://api.twitch.tv/kraken/channels/foo/follows");
    assert_eq!(
      requests[0].params,
      params(&[("direction", "DESC"), ("limit", "100")])
    );
    assert_eq!(requests[1].params["cursor"], "next");
  }

  #[tokio::test]
  async fn test_count_following_reads_total() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({
      "_total": 57,
      "_cursor": "more",
      "follows": [{ "created_at": "2017-01-02T00:00:00Z", "channel": channel("bar") }]
    }));
    let client = client(&transport);

    assert_eq!(client.count_following("foo").await.unwrap(), 57);
    assert_eq!(transport.request_count(), 1);
    assert_eq!(
      transport.requests()[0].params,
      params(&[("direction", "ASC"), ("limit", "1")])
    );
  }

  #[tokio::test]
  async fn test_count_following_empty_listing() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({ "_total": 0, "follows": [] }));

    assert_eq!(client(&transport).count_following("foo").await.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_live_stream_offline() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({ "stream": null, "_links": {} }));

    assert!(client(&transport).live_stream("foo").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_live_stream_online() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({
      "stream": {
        "_id": 23366709968i64,
        "game": "Overwatch",
        "viewers": 2123,
        "created_at": "2016-09-01T18:00:00Z",
        "channel": channel("foo"),
        "preview": { "small": "s.jpg", "template": "{width}x{height}.jpg" }
      }
    }));

    let stream = client(&transport).live_stream("foo").await.unwrap().unwrap();
    assert_eq!(stream.id, "23366709968");
    assert_eq!(stream.viewers, 2123);
    assert_eq!(stream.channel.name, "foo");
    assert_eq!(stream.preview.unwrap().small.as_deref(), Some("s.jpg"));
  }

  #[tokio::test]
  async fn test_past_broadcasts_follow_links_and_limit() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({
      "_total": 5,
      "_links": { "next": "https://api.twitch.tv/kraken/channels/foo/videos?broadcasts=true&limit=100&offset=100" },
      "videos": [{ "_id": "v1", "title": "one" }, { "_id": "v2", "title": "two" }]
    }));
    transport.push_json(json!({
      "_total": 5,
      "videos": [{ "_id": "v3", "title": "three" }]
    }));
    let client = client(&transport);

    let videos: Vec<Video> = client.past_broadcasts("foo", Some(3)).try_collect().await.unwrap();
    let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, ["v1", "v2", "v3"]);
    assert_eq!(videos[0].total, Some(5));
    assert_eq!(
      transport.requests()[0].params,
      params(&[("broadcasts", "true"), ("limit", "3")])
    );
  }

  #[tokio::test]
  async fn test_chat_replay_decodes_messages() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({ "errors": [{ "detail": "0 is not between 100 and 100" }] }));
    transport.push_json(json!({
      "data": [{
        "id": "m1",
        "attributes": { "from": "viewer", "message": "hi", "video-offset": 1500, "tags": {} }
      }]
    }));
    let client = client(&transport);

    let messages: Vec<ChatMessage> = client.chat_replay("v42").try_collect().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].from, "viewer");
    assert!(!messages[0].subscriber);
    assert_eq!(
      transport.requests()[0].url,
      "https://rechat.twitch.tv/rechat-messages"
    );
  }

  #[tokio::test]
  async fn test_chat_replay_keeps_messages_without_id() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({ "errors": [{ "detail": "0 is not between 0 and 0" }] }));
    transport.push_json(json!({
      "data": [
        { "attributes": { "from": "a", "message": "first" } },
        { "id": "m2", "attributes": { "from": "b", "message": "second" } }
      ]
    }));
    let client = client(&transport);

    let messages: Vec<ChatMessage> = client.chat_replay("v42").try_collect().await.unwrap();
    let lines: Vec<&str> = messages.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(lines, ["first", "second"]);
    assert!(messages[0].id.is_none());
  }

  #[tokio::test]
  async fn test_chat_message_by_id() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({
      "type": "rechat-message",
      "id": "chat-9",
      "attributes": { "from": "viewer", "message": "gg", "tags": { "subscriber": true } }
    }));

    let message = client(&transport).chat_message(" chat-9 ").await.unwrap();
    assert_eq!(message.id.as_deref(), Some("chat-9"));
    assert_eq!(message.message, "gg");
    assert!(message.subscriber);
    assert_eq!(
      transport.requests()[0].url,
      "https://rechat.twitch.tv/rechat-messages/rechat-message/chat-9"
    );
  }

  #[tokio::test]
  async fn test_chatters_endpoint() {
    let transport = ScriptedTransport::new();
    transport.push_json(json!({ "chatter_count": 1, "chatters": { "viewers": ["a"] } }));

    let chatters = client(&transport).chatters("Foo").await.unwrap();
    assert_eq!(chatters.count, 1);
    assert_eq!(
      transport.requests()[0].url,
      "https://tmi.twitch.tv/group/user/foo/chatters"
    );
  }
}
