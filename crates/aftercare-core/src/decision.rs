//! Decision Engine: chooses what to do about one patient-day.
//!
//! Rules are checked in order and the first match wins:
//!
//! 1. HIGH risk and (score below the critical cutoff, or a category entirely
//!    missed): escalate urgently with a HIGH alert.
//! 2. MEDIUM-or-higher risk, declining, and below the concern cutoff: escalate
//!    with a MEDIUM alert.
//! 3. Anything missed: remind, one reminder per missed category.
//! 4. Nothing missed and at or above the encourage cutoff: encourage.
//! 5. Otherwise do nothing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::{
  config::EscalationThresholds,
  knowledge::Guidance,
  patient::{PatientId, RiskTier},
  record::{Alert, Severity},
  task::Category,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Action {
  Escalate,
  Remind,
  Encourage,
  None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Priority {
  Urgent,
  Normal,
}

/// A patient-facing nudge for one missed category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
  pub category: Category,
  pub message:  String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDecision {
  pub action:    Action,
  pub priority:  Priority,
  pub reasons:   Vec<String>,
  #[serde(default)]
  pub alert:     Option<Alert>,
  #[serde(default)]
  pub reminders: Vec<Reminder>,
}

impl EscalationDecision {
  pub fn is_escalation(&self) -> bool { self.action == Action::Escalate }
}

/// Who and when a decision is being made for. The timestamp is supplied by
/// the caller so decisions stay reproducible.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
  pub patient_id: &'a PatientId,
  pub run_id:     Uuid,
  pub day:        u32,
  pub at:         DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
  pub tier:         RiskTier,
  pub score:        f64,
  pub declining:    bool,
  pub missed:       &'a [Category],
  pub fully_missed: &'a [Category],
  /// Guidance for (at least) each missed category.
  pub guidance:     &'a BTreeMap<Category, Guidance>,
}

/// The alert id for a (patient, run, day). Stable across re-evaluation.
pub fn alert_id(patient: &PatientId, run_id: Uuid, day: u32) -> Uuid {
  Uuid::new_v5(&run_id, format!("alert/{patient}/{day}").as_bytes())
}

fn join(categories: &[Category]) -> String {
  categories.iter().map(Category::to_string).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionEngine {
  thresholds: EscalationThresholds,
}

impl DecisionEngine {
  pub fn new(thresholds: EscalationThresholds) -> Self { Self { thresholds } }

  pub fn decide(&self, input: DecisionInput<'_>, ctx: DecisionContext<'_>) -> EscalationDecision {
    let t = &self.thresholds;

    // ── Urgent escalation ─────────────────────────────────────────────────
    if input.tier == RiskTier::High
      && (input.score < t.critical_score || !input.fully_missed.is_empty())
    {
      let mut reasons = vec![format!("{} risk with adherence {:.1}", input.tier, input.score)];
      if input.score < t.critical_score {
        reasons.push(format!("score below critical cutoff {}", t.critical_score));
      }
      if !input.fully_missed.is_empty() {
        reasons.push(format!("entirely missed: {}", join(input.fully_missed)));
      }
      reasons.extend(self.red_flags(&input));
      return self.escalate(Severity::High, Priority::Urgent, reasons, ctx);
    }

    // ── Declining escalation ──────────────────────────────────────────────
    if input.tier >= RiskTier::Medium && input.declining && input.score < t.concern_score {
      let mut reasons = vec![
        format!("{} risk with declining adherence", input.tier),
        format!("score {:.1} below concern cutoff {}", input.score, t.concern_score),
      ];
      reasons.extend(self.red_flags(&input));
      return self.escalate(Severity::Medium, Priority::Normal, reasons, ctx);
    }

    // ── Reminders ─────────────────────────────────────────────────────────
    if !input.missed.is_empty() {
      let reminders: Vec<Reminder> = input
        .missed
        .iter()
        .map(|category| Reminder {
          category: *category,
          message:  match input.guidance.get(category) {
            Some(g) => g.recommendation(),
            None => format!("Please complete your remaining {category} tasks today."),
          },
        })
        .collect();
      return EscalationDecision {
        action: Action::Remind,
        priority: Priority::Normal,
        reasons: vec![format!("missed tasks: {}", join(input.missed))],
        alert: None,
        reminders,
      };
    }

    if input.score >= t.encourage_score {
      return EscalationDecision {
        action:    Action::Encourage,
        priority:  Priority::Normal,
        reasons:   vec![format!("all tasks completed with adherence {:.1}", input.score)],
        alert:     None,
        reminders: Vec::new(),
      };
    }

    EscalationDecision {
      action:    Action::None,
      priority:  Priority::Normal,
      reasons:   vec![format!("no action needed at adherence {:.1}", input.score)],
      alert:     None,
      reminders: Vec::new(),
    }
  }

  fn red_flags(&self, input: &DecisionInput<'_>) -> Vec<String> {
    input
      .missed
      .iter()
      .filter_map(|c| input.guidance.get(c).map(|g| (c, g)))
      .flat_map(|(c, g)| {
        g.guideline.red_flags.iter().map(move |flag| format!("red flag ({c}): {flag}"))
      })
      .collect()
  }

  fn escalate(
    &self,
    severity: Severity,
    priority: Priority,
    reasons: Vec<String>,
    ctx: DecisionContext<'_>,
  ) -> EscalationDecision {
    let alert = Alert {
      alert_id: alert_id(ctx.patient_id, ctx.run_id, ctx.day),
      patient_id: ctx.patient_id.clone(),
      run_id: ctx.run_id,
      day: ctx.day,
      severity,
      reason: reasons.join("; "),
      raised_at: ctx.at,
    };
    EscalationDecision {
      action: Action::Escalate,
      priority,
      reasons,
      alert: Some(alert),
      reminders: Vec::new(),
    }
  }
}
