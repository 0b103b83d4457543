//! Error type for `aftercare-pipeline`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] aftercare_core::Error),

  #[error("http client error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  /// Only configuration problems stop a run before it starts.
  pub fn is_fatal(&self) -> bool {
    matches!(self, Self::Core(e) if e.is_fatal())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
