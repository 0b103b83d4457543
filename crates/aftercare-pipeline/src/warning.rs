//! Pipeline stages and the structured warnings they raise.

use aftercare_core::patient::PatientId;
use serde::{Deserialize, Serialize};
use strum::Display;

/// The stages a patient-day passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
  Score,
  Classify,
  Reason,
  Lookup,
  Decide,
  Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WarningKind {
  /// The reasoner timed out or failed; the local path was used.
  ReasonerFallback,
  /// No guidance for a missed category, not even under `general`.
  GuidanceMissing,
  /// A stored document could not be read and was set aside.
  CorruptRecord,
  /// A write to the record store failed.
  StoreFailure,
  /// The day is already in the store for this run and was not evaluated
  /// again.
  AlreadyRecorded,
}

/// A recoverable condition met during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
  pub kind:       WarningKind,
  pub operation:  Operation,
  pub patient_id: PatientId,
  /// `None` for conditions not tied to a single day.
  #[serde(default)]
  pub day:        Option<u32>,
  pub message:    String,
}

impl Warning {
  pub fn new(
    kind: WarningKind,
    operation: Operation,
    patient_id: &PatientId,
    day: Option<u32>,
    message: impl Into<String>,
  ) -> Self {
    Self { kind, operation, patient_id: patient_id.clone(), day, message: message.into() }
  }
}
