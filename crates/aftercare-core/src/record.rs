//! Durable per-patient records.
//!
//! A [`PersistentRecord`] is append-only: entries are pushed in chronological
//! order and never edited. Alert resolution is itself an appended event, and
//! an alert's status is computed by looking for it.
//!
//! Every list field defaults to empty so documents written by older versions
//! stay loadable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  patient::{PatientId, RiskTier},
  score::Grade,
  task::DayCompletion,
};

// ─── Entries ─────────────────────────────────────────────────────────────────

/// One scored day. Created once per (patient, run, day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
  pub record_id:     Uuid,
  pub run_id:        Uuid,
  pub patient_id:    PatientId,
  pub day:           u32,
  pub completion:    DayCompletion,
  pub score:         f64,
  pub grade:         Grade,
  pub risk:          RiskTier,
  #[serde(default)]
  pub fallback_used: bool,
  #[serde(with = "crate::timestamp")]
  pub recorded_at:   DateTime<Utc>,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Severity {
  Low,
  Medium,
  High,
}

/// An escalation raised toward the care team. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
  pub alert_id:   Uuid,
  pub patient_id: PatientId,
  pub run_id:     Uuid,
  pub day:        u32,
  pub severity:   Severity,
  pub reason:     String,
  #[serde(with = "crate::timestamp")]
  pub raised_at:  DateTime<Utc>,
}

/// Records that an alert was handled. An alert is resolved at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertResolution {
  pub resolution_id: Uuid,
  pub alert_id:      Uuid,
  #[serde(default)]
  pub note:          Option<String>,
  #[serde(with = "crate::timestamp")]
  pub resolved_at:   DateTime<Utc>,
}

/// An alert's lifecycle status, computed at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AlertStatus {
  Pending,
  Resolved {
    note: Option<String>,
    #[serde(with = "crate::timestamp")]
    at:   DateTime<Utc>,
  },
}

impl AlertStatus {
  pub fn is_pending(&self) -> bool { matches!(self, Self::Pending) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InteractionKind {
  Reminder,
  Encouragement,
  Escalation,
  Routine,
}

/// A logged action taken toward the patient or care team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
  pub interaction_id: Uuid,
  pub run_id:         Uuid,
  pub day:            u32,
  pub kind:           InteractionKind,
  pub message:        String,
  #[serde(with = "crate::timestamp")]
  pub at:             DateTime<Utc>,
}

/// The risk tier assigned on one day, with its reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
  pub assessment_id: Uuid,
  pub run_id:        Uuid,
  pub day:           u32,
  pub tier:          RiskTier,
  #[serde(default)]
  pub factors:       Vec<String>,
  pub score:         f64,
  #[serde(default)]
  pub declining:     bool,
  #[serde(default)]
  pub rationale:     String,
  #[serde(default)]
  pub fallback_used: bool,
  #[serde(with = "crate::timestamp")]
  pub assessed_at:   DateTime<Utc>,
}

// ─── Conflicts ───────────────────────────────────────────────────────────────

/// Why an append or resolution was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordConflict {
  #[error("duplicate {kind} id {id}")]
  DuplicateId { kind: &'static str, id: Uuid },

  #[error("day {day} of run {run_id} is already recorded")]
  DuplicateDay { run_id: Uuid, day: u32 },

  #[error("record belongs to patient {found}, not {expected}")]
  WrongPatient { expected: PatientId, found: PatientId },

  #[error("alert not found: {0}")]
  AlertNotFound(Uuid),

  #[error("alert {0} is already resolved")]
  AlreadyResolved(Uuid),
}

// ─── Document ────────────────────────────────────────────────────────────────

/// The full durable document for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentRecord {
  pub patient_id:        PatientId,
  #[serde(with = "crate::timestamp")]
  pub created_at:        DateTime<Utc>,
  #[serde(default)]
  pub daily_records:     Vec<DailyRecord>,
  #[serde(default)]
  pub alerts:            Vec<Alert>,
  #[serde(default)]
  pub alert_resolutions: Vec<AlertResolution>,
  #[serde(default)]
  pub interactions:      Vec<Interaction>,
  #[serde(default)]
  pub risk_assessments:  Vec<RiskAssessment>,
}

impl PersistentRecord {
  pub fn new(patient_id: PatientId, created_at: DateTime<Utc>) -> Self {
    Self {
      patient_id,
      created_at,
      daily_records: Vec::new(),
      alerts: Vec::new(),
      alert_resolutions: Vec::new(),
      interactions: Vec::new(),
      risk_assessments: Vec::new(),
    }
  }

  // ── Appends ───────────────────────────────────────────────────────────────

  pub fn push_daily(&mut self, record: DailyRecord) -> Result<(), RecordConflict> {
    self.check_patient(&record.patient_id)?;
    if self.daily_records.iter().any(|r| r.record_id == record.record_id) {
      return Err(RecordConflict::DuplicateId { kind: "daily record", id: record.record_id });
    }
    if self
      .daily_records
      .iter()
      .any(|r| r.run_id == record.run_id && r.day == record.day)
    {
      return Err(RecordConflict::DuplicateDay { run_id: record.run_id, day: record.day });
    }
    self.daily_records.push(record);
    Ok(())
  }

  pub fn push_alert(&mut self, alert: Alert) -> Result<(), RecordConflict> {
    self.check_patient(&alert.patient_id)?;
    if self.alerts.iter().any(|a| a.alert_id == alert.alert_id) {
      return Err(RecordConflict::DuplicateId { kind: "alert", id: alert.alert_id });
    }
    self.alerts.push(alert);
    Ok(())
  }

  pub fn push_interaction(&mut self, interaction: Interaction) -> Result<(), RecordConflict> {
    if self
      .interactions
      .iter()
      .any(|i| i.interaction_id == interaction.interaction_id)
    {
      return Err(RecordConflict::DuplicateId {
        kind: "interaction",
        id:   interaction.interaction_id,
      });
    }
    self.interactions.push(interaction);
    Ok(())
  }

  pub fn push_risk_assessment(&mut self, assessment: RiskAssessment) -> Result<(), RecordConflict> {
    if self
      .risk_assessments
      .iter()
      .any(|a| a.assessment_id == assessment.assessment_id)
    {
      return Err(RecordConflict::DuplicateId {
        kind: "risk assessment",
        id:   assessment.assessment_id,
      });
    }
    self.risk_assessments.push(assessment);
    Ok(())
  }

  /// Append a resolution for a pending alert.
  pub fn push_resolution(&mut self, resolution: AlertResolution) -> Result<(), RecordConflict> {
    match self.alert_status(resolution.alert_id) {
      None => Err(RecordConflict::AlertNotFound(resolution.alert_id)),
      Some(AlertStatus::Resolved { .. }) => {
        Err(RecordConflict::AlreadyResolved(resolution.alert_id))
      }
      Some(AlertStatus::Pending) => {
        self.alert_resolutions.push(resolution);
        Ok(())
      }
    }
  }

  fn check_patient(&self, found: &PatientId) -> Result<(), RecordConflict> {
    if found == &self.patient_id {
      Ok(())
    } else {
      Err(RecordConflict::WrongPatient {
        expected: self.patient_id.clone(),
        found:    found.clone(),
      })
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// `None` if no alert with this id exists.
  pub fn alert_status(&self, alert_id: Uuid) -> Option<AlertStatus> {
    self.alerts.iter().find(|a| a.alert_id == alert_id)?;
    let status = match self.alert_resolutions.iter().find(|r| r.alert_id == alert_id) {
      Some(r) => AlertStatus::Resolved { note: r.note.clone(), at: r.resolved_at },
      None => AlertStatus::Pending,
    };
    Some(status)
  }

  pub fn pending_alerts(&self) -> impl Iterator<Item = &Alert> {
    self
      .alerts
      .iter()
      .filter(|a| !self.alert_resolutions.iter().any(|r| r.alert_id == a.alert_id))
  }

  /// Daily records, optionally restricted to one run, in insertion order.
  pub fn daily_for_run(&self, run_id: Option<Uuid>) -> impl Iterator<Item = &DailyRecord> {
    self
      .daily_records
      .iter()
      .filter(move |r| run_id.is_none_or(|id| r.run_id == id))
  }

  pub fn alerts_for_run(&self, run_id: Option<Uuid>) -> impl Iterator<Item = &Alert> {
    self
      .alerts
      .iter()
      .filter(move |a| run_id.is_none_or(|id| a.run_id == id))
  }

  /// Scores recorded so far in a run, oldest first.
  pub fn scores_for_run(&self, run_id: Uuid) -> Vec<f64> {
    self.daily_for_run(Some(run_id)).map(|r| r.score).collect()
  }

  pub fn latest_assessment(&self, run_id: Option<Uuid>) -> Option<&RiskAssessment> {
    self
      .risk_assessments
      .iter()
      .rev()
      .find(|a| run_id.is_none_or(|id| a.run_id == id))
  }

  pub fn is_empty(&self) -> bool {
    self.daily_records.is_empty()
      && self.alerts.is_empty()
      && self.interactions.is_empty()
      && self.risk_assessments.is_empty()
  }
}
