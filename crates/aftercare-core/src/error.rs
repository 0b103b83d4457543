//! Error types for `aftercare-core`.

use thiserror::Error;

use crate::patient::PatientId;

#[derive(Debug, Error)]
pub enum Error {
  /// Invalid or incomplete configuration. Fatal at startup.
  #[error("configuration error: {0}")]
  Configuration(String),

  #[error("patient not found: {0}")]
  PatientNotFound(PatientId),

  /// Not even the `general` knowledge entry covers this category.
  #[error("no guidance for condition {condition:?}, category {category:?}")]
  GuidanceNotFound { condition: String, category: String },

  #[error("invalid patient id {0:?}")]
  InvalidPatientId(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn is_fatal(&self) -> bool { matches!(self, Self::Configuration(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
