//! Error types for `muster-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A page did not have the shape the field-extraction grammar expects.
  #[error("grammar error on {page}: {reason}")]
  Grammar { page: &'static str, reason: String },

  #[error("invalid timestamp {value:?}, expected {format}")]
  InvalidTimestamp { value: String, format: &'static str },

  #[error("malformed roster line: {0:?}")]
  RosterLine(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn grammar(page: &'static str, reason: impl Into<String>) -> Self {
    Self::Grammar { page, reason: reason.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
