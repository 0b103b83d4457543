//! The `RecordStore` trait.
//!
//! Implemented by storage backends (e.g. `aftercare-store-json`). The
//! pipeline and the binary depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  patient::PatientId,
  record::{
    Alert, AlertResolution, DailyRecord, Interaction, PersistentRecord, RiskAssessment,
  },
};

/// Errors a backend can report. Unreadable documents are distinguished so
/// callers can set them aside and carry on.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn is_corrupt(&self) -> bool;
}

/// Abstraction over a durable per-patient record backend.
///
/// Every write appends exactly one entry to a patient's document and is
/// durable before the future resolves. Alert resolution is itself an appended
/// event; nothing already written is ever edited.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded tokio runtime.
pub trait RecordStore: Send + Sync {
  type Error: StoreError;

  /// Load a patient's document, creating and persisting an empty one if none
  /// exists yet.
  fn load<'a>(
    &'a self,
    patient: &'a PatientId,
  ) -> impl Future<Output = Result<PersistentRecord, Self::Error>> + Send + 'a;

  /// Returns an error if the record id, or the (run, day) pair, is already
  /// present.
  fn append_daily(
    &self,
    record: DailyRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn append_alert(&self, alert: Alert) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn append_interaction<'a>(
    &'a self,
    patient: &'a PatientId,
    interaction: Interaction,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn append_risk_assessment<'a>(
    &'a self,
    patient: &'a PatientId,
    assessment: RiskAssessment,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Mark a pending alert resolved.
  ///
  /// Returns an error if the alert does not exist or is already resolved.
  fn resolve_alert<'a>(
    &'a self,
    patient: &'a PatientId,
    alert_id: Uuid,
    note: Option<String>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<AlertResolution, Self::Error>> + Send + 'a;

  /// Every patient with a stored document, sorted by id.
  fn list_patients(&self) -> impl Future<Output = Result<Vec<PatientId>, Self::Error>> + Send + '_;

  /// Move an unreadable document aside so a fresh one can be created.
  /// Returns `false` if there was nothing to move.
  fn quarantine<'a>(
    &'a self,
    patient: &'a PatientId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
