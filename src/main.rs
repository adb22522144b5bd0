use clap::Parser;
use color_eyre::Result;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use itch::cache::{self, CacheBackend};
use itch::config::Config;
use itch::reports::{self, Report, ReportOptions};
use itch::twitch::{Direction, TwitchClient};

#[derive(Parser, Debug)]
#[command(name = "itch")]
#[command(about = "Tab-separated reports from the Twitch Kraken API")]
#[command(version)]
struct Args {
  /// Report to run
  #[arg(value_enum)]
  report: Report,

  /// Channel or user name (video id for `replay`)
  target: Option<String>,

  /// Sort order of follow listings
  #[arg(short, long, value_enum)]
  direction: Option<Direction>,

  /// Stop after this many records
  #[arg(short, long)]
  limit: Option<usize>,

  /// Cache responses in this backend
  #[arg(short = 'c', long, value_enum)]
  cache: Option<CacheBackend>,

  /// Append each user's following count to follow reports
  #[arg(long)]
  count_following: bool,

  /// Path to config file (default: $XDG_CONFIG_HOME/itch/config.yaml)
  #[arg(long)]
  config: Option<PathBuf>,
}

/// Log to stderr, filtered by `LOG_LEVEL` (e.g. `debug`) or `RUST_LOG`.
fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
  let filter = std::env::var("LOG_LEVEL")
    .ok()
    .map(|level| EnvFilter::new(level.to_lowercase()))
    .or_else(|| EnvFilter::try_from_default_env().ok())
    .unwrap_or_else(|| EnvFilter::new("warn"));

  let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .init();
  guard
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_logging();

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let store = cache::open_store(args.cache, &config.cache)?;
  let client = TwitchClient::from_config(&config, store)?;

  let options = ReportOptions {
    target: args.target,
    direction: args.direction,
    limit: args.limit,
    count_following: args.count_following,
  };

  let stdout = std::io::stdout();
  let mut out = stdout.lock();
  reports::run(args.report, &client, &options, &mut out).await?;
  out.flush()?;

  Ok(())
}
