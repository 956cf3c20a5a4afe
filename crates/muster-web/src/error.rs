//! Error type for `muster-web`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("session gate closed")]
  GateClosed,

  #[error(transparent)]
  Core(#[from] muster_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
