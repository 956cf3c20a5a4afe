//! Error type for `muster-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {column} value: {value:?}")]
  UnknownValue { column: &'static str, value: String },

  /// An update addressed a row id that does not exist.
  #[error("{table} row {id} not found")]
  RowNotFound { table: &'static str, id: i64 },

  #[error("connection gate closed")]
  GateClosed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
