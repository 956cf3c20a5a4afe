//! The Muster crawl-and-reconcile engine.
//!
//! [`Crawler`] is generic over its three collaborators:
//!
//! - a [`DirectoryStore`] holding the entity graph,
//! - a [`SessionProvider`] fetching pages from the source,
//! - a [`PageGrammar`] turning pages into structured records.
//!
//! It exposes three entry points: [`Crawler::crawl_unit_subtree`],
//! [`Crawler::reconcile_event`] (and the [`Crawler::sweep_events`] loop over
//! it) and [`Crawler::reconcile_profile`]. Each is safe to repeat: every write
//! is an upsert by natural key, and stale memberships are retired by
//! timestamp rather than deleted.

#![allow(async_fn_in_trait)]

pub mod config;
pub mod error;

mod event;
mod profile;
mod resolver;
mod roster;
mod walker;

pub use config::{CrawlerConfig, DEFAULT_MAX_CONSECUTIVE_ERRORS, SiteMap};
pub use error::{Error, Result};
pub use event::{EventOutcome, SweepSummary};
pub use profile::ProfileSummary;
pub use roster::RosterLine;
pub use walker::CrawlSummary;

use std::sync::Arc;

use muster_core::{
  source::{Page, PageGrammar, Session, SessionProvider},
  store::DirectoryStore,
};
use tokio::task::JoinSet;

/// The crawl engine. Cheap to clone; clones share their collaborators.
pub struct Crawler<S, P, G> {
  store:                  Arc<S>,
  sessions:               Arc<P>,
  grammar:                Arc<G>,
  sites:                  Arc<SiteMap>,
  /// Erroneous events in a row after which an event sweep stops.
  max_consecutive_errors: usize,
}

impl<S, P, G> Clone for Crawler<S, P, G> {
  fn clone(&self) -> Self {
    Self {
      store:                  Arc::clone(&self.store),
      sessions:               Arc::clone(&self.sessions),
      grammar:                Arc::clone(&self.grammar),
      sites:                  Arc::clone(&self.sites),
      max_consecutive_errors: self.max_consecutive_errors,
    }
  }
}

impl<S, P, G> Crawler<S, P, G>
where
  S: DirectoryStore + 'static,
  P: SessionProvider + 'static,
  G: PageGrammar + 'static,
{
  pub fn new(store: S, sessions: P, grammar: G, sites: SiteMap) -> Self {
    Self {
      store:                  Arc::new(store),
      sessions:               Arc::new(sessions),
      grammar:                Arc::new(grammar),
      sites:                  Arc::new(sites),
      max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
    }
  }

  /// Set how many erroneous events in a row end an event sweep. At least one.
  pub fn with_max_consecutive_errors(mut self, max: usize) -> Self {
    self.max_consecutive_errors = max.max(1);
    self
  }

  pub fn store(&self) -> &S { &self.store }

  /// `GET url` on a fresh session. The session is released before returning.
  async fn fetch(&self, url: String) -> Result<Page> {
    let session = self.sessions.acquire().await.map_err(Error::source)?;
    session.get(url).await.map_err(Error::source)
  }

  async fn post_json(&self, url: String, payload: serde_json::Value) -> Result<String> {
    let session = self.sessions.acquire().await.map_err(Error::source)?;
    session.post_json(url, payload).await.map_err(Error::source)
  }
}

/// Wait for every task in `tasks`, then surface the first failure. Tasks are
/// never aborted: siblings of a failed task still run to completion.
async fn join_all<T: 'static>(mut tasks: JoinSet<Result<T>>) -> Result<Vec<T>> {
  let mut done = Vec::with_capacity(tasks.len());
  let mut first_err = None;

  while let Some(joined) = tasks.join_next().await {
    match joined.map_err(Error::from).and_then(|r| r) {
      Ok(value) => done.push(value),
      Err(e) if first_err.is_none() => first_err = Some(e),
      Err(e) => tracing::debug!(error = %e, "further task failure"),
    }
  }

  match first_err {
    Some(e) => Err(e),
    None => Ok(done),
  }
}

#[cfg(test)]
mod tests;
