//! Unit tree walk and roster fan-out.
//!
//! A crawl runs in two stages separated by a join barrier:
//!
//! 1. **Walk.** Every unit node is recorded and every sub-unit is walked in
//!    its own task. Roster lines are parsed and appended to a shared
//!    [`RosterBook`] keyed by person name. Only the append is locked.
//! 2. **Fan-out.** Once every walk task has joined, one task per person
//!    reconciles that person's lines from the whole subtree.
//!
//! Task count is unbounded; the store's session gate is the only throttle.
//! A walk task releases its store session before waiting on its children.

use std::{
  collections::HashMap,
  future::Future,
  pin::Pin,
  sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::Utc;
use muster_core::{
  model::UnitId,
  source::{PageGrammar, SessionProvider, UnitChild, UnitNode},
  store::{DirectoryStore, StoreSession},
};
use tokio::task::JoinSet;

use crate::{Crawler, Error, Result, join_all, resolver, roster::RosterLine};

/// Totals for one subtree crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
  /// Unit nodes recorded.
  pub units:   usize,
  /// Distinct people reconciled.
  pub people:  usize,
  /// Roster lines applied.
  pub lines:   usize,
  /// Memberships retired.
  pub retired: usize,
}

/// Person name → roster lines, shared by every walk task of one crawl.
#[derive(Clone, Default)]
struct RosterBook(Arc<Mutex<HashMap<String, Vec<RosterLine>>>>);

impl RosterBook {
  fn append(&self, line: RosterLine) {
    let mut lines = self.0.lock().unwrap_or_else(PoisonError::into_inner);
    lines.entry(line.name.clone()).or_default().push(line);
  }

  /// Take the collected lines. Only meaningful after the walk has joined.
  fn take(&self) -> HashMap<String, Vec<RosterLine>> {
    std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
  }
}

type WalkFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

impl<S, P, G> Crawler<S, P, G>
where
  S: DirectoryStore + 'static,
  P: SessionProvider + 'static,
  G: PageGrammar + 'static,
{
  /// Crawl the roster rooted at unit `root_id` and reconcile every person
  /// listed anywhere beneath it.
  ///
  /// A failure in any branch fails the crawl. Writes already made by other
  /// branches are kept; the next crawl corrects them.
  pub async fn crawl_unit_subtree(&self, root_id: i64) -> Result<CrawlSummary> {
    let now = Utc::now();
    tracing::info!(unit = root_id, "crawling unit subtree");

    let page = self.fetch(self.sites.unit_roster(root_id)).await?;
    let root = self.grammar.unit_roster(&page)?;

    let book = RosterBook::default();
    let units = Arc::new(AtomicUsize::new(0));
    self
      .clone()
      .walk(root, None, book.clone(), Arc::clone(&units))
      .await?;

    // Barrier passed: every walk task has joined.
    let people = book.take();
    tracing::debug!(unit = root_id, people = people.len(), "walk complete");

    let mut tasks = JoinSet::new();
    for (name, lines) in people {
      let crawler = self.clone();
      tasks.spawn(async move { crawler.reconcile_person(name, lines, now).await });
    }
    let outcomes = join_all(tasks).await?;

    let summary = CrawlSummary {
      units:   units.load(Ordering::Relaxed),
      people:  outcomes.len(),
      lines:   outcomes.iter().map(|o| o.lines).sum(),
      retired: outcomes.iter().map(|o| o.retired).sum(),
    };
    tracing::info!(
      unit = root_id,
      units = summary.units,
      people = summary.people,
      lines = summary.lines,
      retired = summary.retired,
      "unit subtree crawled"
    );
    Ok(summary)
  }

  /// Record `node`, queue its roster lines and walk its sub-units
  /// concurrently. Resolves once the whole subtree has been walked.
  fn walk(
    self,
    node: UnitNode,
    parent: Option<UnitId>,
    book: RosterBook,
    units: Arc<AtomicUsize>,
  ) -> WalkFuture {
    Box::pin(async move {
      let unit_id = {
        let session = self.store.open_session().await.map_err(Error::store)?;
        let unit = resolver::unit(&session, node.source_id, node.name.clone()).await?;
        session
          .update_unit(unit.unit_id, node.kind.clone(), parent)
          .await
          .map_err(Error::store)?;
        unit.unit_id
      };
      units.fetch_add(1, Ordering::Relaxed);
      tracing::trace!(unit = node.source_id, name = %node.name, "unit recorded");

      let mut tasks = JoinSet::new();
      let mut line_err = None;
      for child in node.children {
        match child {
          UnitChild::Unit(sub) => {
            let walk =
              self
                .clone()
                .walk(sub, Some(unit_id), book.clone(), Arc::clone(&units));
            tasks.spawn(walk);
          }
          UnitChild::Person(text) => match RosterLine::parse(&text, unit_id) {
            Ok(line) => book.append(line),
            Err(e) => {
              tracing::error!(unit = node.source_id, error = %e, "bad roster line");
              line_err.get_or_insert(Error::from(e));
            }
          },
        }
      }

      join_all(tasks).await?;
      match line_err {
        Some(e) => Err(e),
        None => Ok(()),
      }
    })
  }
}
