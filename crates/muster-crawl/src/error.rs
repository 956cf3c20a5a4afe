//! Error type for `muster-crawl`.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] BoxError),

  #[error("source error: {0}")]
  Source(#[source] BoxError),

  #[error(transparent)]
  Core(#[from] muster_core::Error),

  #[error("crawl task failed: {0}")]
  Join(#[from] tokio::task::JoinError),

  #[error("person {0:?} not found")]
  PersonNotFound(String),

  /// An attendee row linking somewhere other than a member or a unit.
  #[error("unexpected attendee row {name:?} linking to {link:?}")]
  UnexpectedAttendeeRow { name: String, link: String },
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  pub(crate) fn source(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Source(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
