//! Tab-separated reports over the Twitch client.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use color_eyre::{eyre::eyre, Result};
use futures::{StreamExt, TryStreamExt};
use std::io::Write;

use crate::twitch::{Direction, Transport, TwitchClient};

/// Available reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Report {
  /// Users following a channel
  Followers,
  /// Channels a user follows
  Following,
  /// Archived broadcasts of a channel
  Videos,
  /// Chat log of a past broadcast (target is a video id)
  Replay,
  /// Users in a channel's chat right now
  Chatters,
  /// The channel's live broadcast, if any
  Stream,
}

/// Arguments shared by every report.
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
  /// Channel or user name, or a video id for [`Report::Replay`]
  pub target: Option<String>,
  pub direction: Option<Direction>,
  pub limit: Option<usize>,
  /// Append each user's following count to follow reports
  pub count_following: bool,
}

impl ReportOptions {
  fn target(&self) -> Result<&str> {
    self
      .target
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or_else(|| eyre!("Channel not given"))
  }

  fn direction(&self) -> Direction {
    self.direction.unwrap_or(Direction::Desc)
  }
}

/// Run `report`, writing one line per record to `out`.
pub async fn run<T: Transport, W: Write>(
  report: Report,
  client: &TwitchClient<T>,
  options: &ReportOptions,
  out: &mut W,
) -> Result<()> {
  match report {
    Report::Followers => followers(client, options, out).await,
    Report::Following => following(client, options, out).await,
    Report::Videos => videos(client, options, out).await,
    Report::Replay => chat_replay(client, options, out).await,
    Report::Chatters => chatters(client, options, out).await,
    Report::Stream => stream(client, options, out).await,
  }?;
  out.flush()?;
  Ok(())
}

async fn followers<T: Transport, W: Write>(
  client: &TwitchClient<T>,
  options: &ReportOptions,
  out: &mut W,
) -> Result<()> {
  let channel = client.channel(options.target()?).await?;

  let listing = client.followers(&channel.name, options.direction(), options.limit);
  futures::pin_mut!(listing);
  while let Some(follow) = listing.try_next().await? {
    let user = &follow.user;
    let mut line = vec![
      user.name.clone(),
      channel.name.clone(),
      user.created_at.timestamp().to_string(),
      follow.created_at.timestamp().to_string(),
      seconds_between(&user.created_at, &follow.created_at).to_string(),
    ];
    if options.count_following {
      line.push(client.count_following(&user.name).await?.to_string());
    }
    write_line(out, &line)?;
  }
  Ok(())
}

async fn following<T: Transport, W: Write>(
  client: &TwitchClient<T>,
  options: &ReportOptions,
  out: &mut W,
) -> Result<()> {
  let user = client.user(options.target()?).await?;
  let count = if options.count_following {
    Some(client.count_following(&user.name).await?)
  } else {
    None
  };

  let listing = client.following(&user.name, options.direction(), options.limit);
  futures::pin_mut!(listing);
  while let Some(follow) = listing.try_next().await? {
    let mut line = vec![
      user.name.clone(),
      follow.channel.name.clone(),
      user.created_at.timestamp().to_string(),
      follow.created_at.timestamp().to_string(),
      seconds_between(&user.created_at, &follow.created_at).to_string(),
    ];
    if let Some(count) = count {
      line.push(count.to_string());
    }
    write_line(out, &line)?;
  }
  Ok(())
}

async fn videos<T: Transport, W: Write>(
  client: &TwitchClient<T>,
  options: &ReportOptions,
  out: &mut W,
) -> Result<()> {
  let listing = client.past_broadcasts(options.target()?, options.limit);
  futures::pin_mut!(listing);
  while let Some(video) = listing.try_next().await? {
    write_line(
      out,
      &[
        video.id.clone(),
        video
          .recorded_at
          .map(|t| t.timestamp().to_string())
          .unwrap_or_default(),
        video.length.to_string(),
        video.views.to_string(),
        video.title.clone(),
      ],
    )?;
  }
  Ok(())
}

async fn chat_replay<T: Transport, W: Write>(
  client: &TwitchClient<T>,
  options: &ReportOptions,
  out: &mut W,
) -> Result<()> {
  // Bound the stream itself so no window is fetched past the limit
  let messages = client
    .chat_replay(options.target()?)
    .take(options.limit.unwrap_or(usize::MAX));
  futures::pin_mut!(messages);

  while let Some(message) = messages.try_next().await? {
    write_line(
      out,
      &[
        message
          .video_offset
          .map(|ms| ms.to_string())
          .unwrap_or_default(),
        message.from.clone(),
        message.subscriber.to_string(),
        message.message.clone(),
      ],
    )?;
  }
  Ok(())
}

async fn chatters<T: Transport, W: Write>(
  client: &TwitchClient<T>,
  options: &ReportOptions,
  out: &mut W,
) -> Result<()> {
  let chatters = client.chatters(options.target()?).await?;
  for name in chatters
    .groups
    .moderators
    .iter()
    .chain(&chatters.groups.viewers)
  {
    writeln!(out, "{}", name)?;
  }
  Ok(())
}

async fn stream<T: Transport, W: Write>(
  client: &TwitchClient<T>,
  options: &ReportOptions,
  out: &mut W,
) -> Result<()> {
  if let Some(stream) = client.live_stream(options.target()?).await? {
    write_line(
      out,
      &[
        stream.channel.name.clone(),
        stream.game.clone().unwrap_or_default(),
        stream.viewers.to_string(),
        stream.created_at.timestamp().to_string(),
      ],
    )?;
  }
  Ok(())
}

fn seconds_between(earlier: &DateTime<Utc>, later: &DateTime<Utc>) -> i64 {
  later.timestamp() - earlier.timestamp()
}

/// Write one tab-separated line. Tabs and newlines inside fields become spaces.
fn write_line<W: Write>(out: &mut W, fields: &[String]) -> Result<()> {
  let fields: Vec<String> = fields
    .iter()
    .map(|f| f.replace(['\t', '\n', '\r'], " "))
    .collect();
  writeln!(out, "{}", fields.join("\t"))?;
  Ok(())
}
