//! The run summary document and its fingerprint.
//!
//! The fingerprint is a SHA-256 over the canonical JSON of the per-patient
//! results. Every map in those results is ordered, so the same seed, start
//! time and run id always produce the same fingerprint.

use aftercare_core::{
  aggregate::PopulationReport,
  decision::EscalationDecision,
  patient::{PatientId, RiskTier},
  score::AdherenceScore,
  task::DayCompletion,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Result, warning::Warning};

/// Everything decided about one patient-day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyOutcome {
  pub day:           u32,
  #[serde(with = "aftercare_core::timestamp")]
  pub at:            DateTime<Utc>,
  pub completion:    DayCompletion,
  pub score:         AdherenceScore,
  pub risk:          RiskTier,
  pub factors:       Vec<String>,
  pub declining:     bool,
  pub rationale:     String,
  pub fallback_used: bool,
  pub decision:      EscalationDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientResult {
  pub patient_id:     PatientId,
  pub name:           String,
  pub condition:      String,
  pub baseline_risk:  RiskTier,
  pub days:           Vec<DailyOutcome>,
  pub reminders_sent: u64,
  pub session_turns:  usize,
}

impl PatientResult {
  pub fn scores(&self) -> Vec<f64> { self.days.iter().map(|d| d.score.total).collect() }

  pub fn escalations(&self) -> usize {
    self.days.iter().filter(|d| d.decision.is_escalation()).count()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
  pub run_id:      Uuid,
  pub seed:        u64,
  pub days:        u32,
  #[serde(with = "aftercare_core::timestamp")]
  pub started_at:  DateTime<Utc>,
  pub patients:    Vec<PatientResult>,
  pub report:      PopulationReport,
  pub warnings:    Vec<Warning>,
  pub fingerprint: String,
}

impl RunSummary {
  pub fn patient(&self, id: &PatientId) -> Option<&PatientResult> {
    self.patients.iter().find(|p| &p.patient_id == id)
  }

  pub fn to_json_pretty(&self) -> Result<String> { Ok(serde_json::to_string_pretty(self)?) }
}

/// Hex SHA-256 of the patients' canonical JSON.
pub fn fingerprint(patients: &[PatientResult]) -> Result<String> {
  let bytes = serde_json::to_vec(patients)?;
  Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
  use aftercare_core::{
    decision::{Action, Priority},
    score::Grade,
  };
  use chrono::TimeZone;

  use super::*;

  fn result(score: f64) -> PatientResult {
    PatientResult {
      patient_id:     PatientId::parse("P001").unwrap(),
      name:           "Ada".into(),
      condition:      "cardiac".into(),
      baseline_risk:  RiskTier::High,
      days:           vec![DailyOutcome {
        day:           1,
        at:            Utc.timestamp_opt(0, 0).unwrap(),
        completion:    DayCompletion::default(),
        score:         AdherenceScore { total: score, grade: Grade::A, breakdown: Default::default() },
        risk:          RiskTier::Medium,
        factors:       vec![],
        declining:     false,
        rationale:     String::new(),
        fallback_used: false,
        decision:      EscalationDecision {
          action:    Action::Encourage,
          priority:  Priority::Normal,
          reasons:   vec![],
          alert:     None,
          reminders: vec![],
        },
      }],
      reminders_sent: 0,
      session_turns:  3,
    }
  }

  #[test]
  fn fingerprint_is_stable_and_content_sensitive() {
    let a = fingerprint(&[result(95.0)]).unwrap();
    assert_eq!(a, fingerprint(&[result(95.0)]).unwrap());
    assert_ne!(a, fingerprint(&[result(94.0)]).unwrap());
    assert_eq!(a.len(), 64);
  }
}
