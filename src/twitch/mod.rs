//! Twitch API access: cached fetching, pagination and chat replay.

mod client;
mod fetcher;
mod paginate;
mod replay;
#[cfg(test)]
pub(crate) mod testing;
mod transport;
mod types;

pub use client::TwitchClient;
pub use fetcher::{CachedFetcher, KRAKEN_V3_ACCEPT};
pub use paginate::{paginate, Continuation, Page, PageSpec, PagedItem};
pub use replay::{parse_boundary, replay, ReplaySpec};
pub use transport::{HttpTransport, Transport};
pub use types::{
  Channel, ChannelRef, ChatMessage, ChatterGroups, Chatters, Direction, FollowedChannel, Follower,
  LiveStream, Preview, Record, User, Video,
};
