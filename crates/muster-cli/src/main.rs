//! muster command-line front end.
//!
//! Reads `muster.toml` (or the path given with `--config`) plus `MUSTER_*`
//! environment variables, opens the SQLite store and runs one crawl.
//!
//! ```text
//! muster units 1                 # crawl the roster rooted at unit 1
//! muster event 66327             # reconcile one event
//! muster events 66000 --limit 50 # sweep forward from an event id
//! muster profile aeroson         # refresh one member's profile
//! ```

use std::{
  path::{Path, PathBuf},
  process::ExitCode,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use muster_crawl::{Crawler, CrawlerConfig, EventOutcome};
use muster_store_sqlite::SqliteStore;
use muster_web::{HttpSessionProvider, SessionSettings, TawGrammar};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Mirror a member directory into SQLite")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "muster.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Crawl a unit's roster and every unit beneath it.
  Units {
    /// Source id of the root unit.
    root_id: i64,
  },
  /// Reconcile a single event.
  Event { id: i64 },
  /// Reconcile events from `first_id` upward until the last one.
  Events {
    first_id: i64,
    /// Stop after this many events even if more exist.
    #[arg(short, long)]
    limit:    Option<usize>,
  },
  /// Refresh a known member's profile and promotion history.
  Profile { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("MUSTER"))
    .build()
    .context("failed to read config file")?;

  let cfg: CrawlerConfig = settings
    .try_deserialize()
    .context("failed to deserialise CrawlerConfig")?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_max_sessions(cfg.max_connections);

  let sessions = HttpSessionProvider::new(SessionSettings {
    max_sessions: cfg.max_sessions,
    user_agent:   cfg.user_agent.clone(),
    timeout:      cfg.request_timeout(),
  })
  .context("failed to build HTTP client")?;

  let crawler = Crawler::new(store, sessions, TawGrammar, cfg.site_map())
    .with_max_consecutive_errors(cfg.max_consecutive_errors);

  match cli.command {
    Command::Units { root_id } => {
      let summary = crawler
        .crawl_unit_subtree(root_id)
        .await
        .with_context(|| format!("crawl of unit {root_id} failed"))?;
      println!(
        "{} units, {} people, {} roster lines, {} memberships retired",
        summary.units, summary.people, summary.lines, summary.retired
      );
    }
    Command::Event { id } => {
      let outcome = crawler.reconcile_event(id).await;
      println!("event {id}: {outcome:?}");
      if outcome == EventOutcome::ErroneousEvent {
        return Ok(ExitCode::FAILURE);
      }
    }
    Command::Events { first_id, limit } => {
      let summary = crawler.sweep_events(first_id, limit).await;
      println!(
        "{} visited, {} valid, {} erroneous, {} base events skipped{}",
        summary.visited,
        summary.valid,
        summary.erroneous,
        summary.base_skipped,
        if summary.reached_end { ", reached the last event" } else { "" }
      );
      if summary.gave_up {
        eprintln!("stopped after {} erroneous events in a row", cfg.max_consecutive_errors);
      }
      if summary.erroneous > 0 {
        return Ok(ExitCode::FAILURE);
      }
    }
    Command::Profile { name } => {
      let summary = crawler
        .reconcile_profile(&name)
        .await
        .with_context(|| format!("profile refresh for {name} failed"))?;
      println!(
        "{name}: {} new ranks, {} movements not applied, {} unrecognized",
        summary.new_ranks, summary.unapplied, summary.unrecognized
      );
    }
  }

  Ok(ExitCode::SUCCESS)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
