//! Error type for `aftercare-store-json`.

use std::path::PathBuf;

use aftercare_core::{patient::PatientId, record::RecordConflict, store::StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] aftercare_core::Error),

  #[error("i/o error on {path}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The document exists but cannot be parsed. The caller decides whether to
  /// quarantine it.
  #[error("corrupt document {path}: {source}")]
  Corrupt {
    path:   PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// The document parses but names another patient. Treated like a corrupt
  /// document so it is quarantined rather than written through.
  #[error("document {path} belongs to {found}")]
  Misplaced { path: PathBuf, found: PatientId },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// Duplicate ids, unknown or already-resolved alerts.
  #[error(transparent)]
  Conflict(#[from] RecordConflict),
}

impl Error {
  pub fn is_corrupt(&self) -> bool {
    matches!(self, Self::Corrupt { .. } | Self::Misplaced { .. })
  }

  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
    let path = path.into();
    move |source| Self::Io { path, source }
  }
}

impl StoreError for Error {
  fn is_corrupt(&self) -> bool { Error::is_corrupt(self) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
