//! The three agents. Each one runs its stages, notes a turn in the patient's
//! session, and turns recoverable failures into warnings.

use aftercare_core::{
  decision::{Action, DecisionInput, EscalationDecision},
  patient::RiskTier,
  reasoner::{Reasoner, ReasoningRequest},
  record::{DailyRecord, Interaction, InteractionKind, RiskAssessment},
  risk::RiskClassification,
  score::AdherenceScore,
  session::Turn,
  store::RecordStore,
  task::DayCompletion,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
  pipeline::{CTX_LAST_SCORE, CTX_LAST_TIER, CTX_REMINDERS_SENT, DayContext, Pipeline},
  summary::DailyOutcome,
  warning::{Operation, WarningKind},
};

/// What the Analyze agent hands to the Escalate agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
  pub classification: RiskClassification,
  /// The tier acted on: the reasoner's, clamped to the baseline floor.
  pub tier:           RiskTier,
  pub factors:        Vec<String>,
  pub rationale:      String,
  pub fallback_used:  bool,
}

impl<S: RecordStore, R: Reasoner> Pipeline<S, R> {
  /// Run Monitor → Analyze → Escalate over one day's completion record.
  ///
  /// `history` holds this run's earlier scores for the patient, oldest first.
  pub async fn evaluate_day(
    &mut self,
    ctx: &DayContext<'_>,
    completion: DayCompletion,
    history: &[f64],
  ) -> DailyOutcome {
    let score = self.monitor(ctx, &completion);
    let analysis = self.analyze(ctx, &completion, &score, history).await;
    let decision = self.escalate(ctx, &completion, &score, &analysis).await;

    tracing::info!(
      patient = %ctx.patient.id,
      day = ctx.day,
      score = score.total,
      tier = %analysis.tier,
      action = %decision.action,
      priority = %decision.priority,
      "processed day"
    );

    DailyOutcome {
      day: ctx.day,
      at: ctx.at,
      completion,
      score,
      risk: analysis.tier,
      factors: analysis.factors,
      declining: analysis.classification.declining,
      rationale: analysis.rationale,
      fallback_used: analysis.fallback_used,
      decision,
    }
  }

  // ── Monitor ───────────────────────────────────────────────────────────────

  fn monitor(&mut self, ctx: &DayContext<'_>, completion: &DayCompletion) -> AdherenceScore {
    let score = self.score(completion);
    let id = &ctx.patient.id;
    self.sessions.append_turn(
      id,
      Turn::new(
        "monitor",
        json!({
          "completed": completion.total_completed(),
          "scheduled": completion.total_scheduled(),
          "score": score.total,
          "grade": score.grade,
        }),
        ctx.at,
      )
      .with_metadata("day", ctx.day.to_string()),
    );
    self.note_context(id, CTX_LAST_SCORE, json!(score.total));
    score
  }

  // ── Analyze ───────────────────────────────────────────────────────────────

  async fn analyze(
    &mut self,
    ctx: &DayContext<'_>,
    completion: &DayCompletion,
    score: &AdherenceScore,
    history: &[f64],
  ) -> Analysis {
    let patient = ctx.patient;
    let classification = self.classify(patient, score.total, history);

    let request = ReasoningRequest {
      patient_id: patient.id.clone(),
      condition: patient.condition.clone(),
      age: patient.age,
      baseline: patient.baseline_risk,
      day: ctx.day,
      score: score.total,
      history: history.to_vec(),
      classification: classification.clone(),
      missed: completion.missed_categories(),
    };
    let (outcome, failure) = self.reason(&request).await;
    let fallback_used = failure.is_some();
    if let Some(e) = failure {
      let message = format!("{} reasoner unavailable, used local path: {e}", self.reasoner.name());
      self.warn(WarningKind::ReasonerFallback, Operation::Reason, &patient.id, Some(ctx.day), message);
    }
    let tier = outcome.effective_tier(&request);

    self.sessions.append_turn(
      &patient.id,
      Turn::new(
        "analyze",
        json!({
          "tier": tier,
          "points": classification.points,
          "declining": classification.declining,
          "fallback_used": fallback_used,
        }),
        ctx.at,
      )
      .with_metadata("day", ctx.day.to_string()),
    );
    self.note_context(&patient.id, CTX_LAST_TIER, json!(tier));

    Analysis {
      factors: classification.factor_descriptions(self.classifier.thresholds()),
      classification,
      tier,
      rationale: outcome.rationale,
      fallback_used,
    }
  }

  // ── Escalate ──────────────────────────────────────────────────────────────

  async fn escalate(
    &mut self,
    ctx: &DayContext<'_>,
    completion: &DayCompletion,
    score: &AdherenceScore,
    analysis: &Analysis,
  ) -> EscalationDecision {
    let patient = ctx.patient;
    let missed = completion.missed_categories();
    let fully_missed = completion.fully_missed_categories();

    let (guidance, uncovered) = self.lookup(&patient.condition, &missed);
    for (category, e) in uncovered {
      self.warn(
        WarningKind::GuidanceMissing,
        Operation::Lookup,
        &patient.id,
        Some(ctx.day),
        format!("{category}: {e}"),
      );
    }

    let decision = self.decide(
      DecisionInput {
        tier: analysis.tier,
        score: score.total,
        declining: analysis.classification.declining,
        missed: &missed,
        fully_missed: &fully_missed,
        guidance: &guidance,
      },
      ctx,
    );

    self.store_day(ctx, completion, score, analysis, &decision).await;

    let reminders = decision.reminders.len() as u64;
    let sent = self
      .sessions
      .get_context(&patient.id, CTX_REMINDERS_SENT)
      .and_then(serde_json::Value::as_u64)
      .unwrap_or(0);
    self.note_context(&patient.id, CTX_REMINDERS_SENT, json!(sent + reminders));
    self.sessions.append_turn(
      &patient.id,
      Turn::new(
        "escalate",
        json!({
          "action": decision.action,
          "priority": decision.priority,
          "reminders": reminders,
          "alert_id": decision.alert.as_ref().map(|a| a.alert_id),
        }),
        ctx.at,
      )
      .with_metadata("day", ctx.day.to_string()),
    );

    decision
  }

  /// [`Operation::Store`]: append the day's record, risk assessment, alert
  /// and interactions. Each failed write becomes a warning. If the day's
  /// record itself is rejected nothing else for the day is written.
  pub async fn store_day(
    &mut self,
    ctx: &DayContext<'_>,
    completion: &DayCompletion,
    score: &AdherenceScore,
    analysis: &Analysis,
    decision: &EscalationDecision,
  ) {
    let patient = &ctx.patient.id;
    let mut failures = Vec::new();

    let daily = DailyRecord {
      record_id: Uuid::new_v4(),
      run_id: ctx.run_id,
      patient_id: patient.clone(),
      day: ctx.day,
      completion: completion.clone(),
      score: score.total,
      grade: score.grade,
      risk: analysis.tier,
      fallback_used: analysis.fallback_used,
      recorded_at: ctx.at,
    };
    if let Err(e) = self.store.append_daily(daily).await {
      self.warn(
        WarningKind::StoreFailure,
        Operation::Store,
        patient,
        Some(ctx.day),
        format!("daily record: {e}"),
      );
      return;
    }

    let assessment = RiskAssessment {
      assessment_id: Uuid::new_v4(),
      run_id: ctx.run_id,
      day: ctx.day,
      tier: analysis.tier,
      factors: analysis.factors.clone(),
      score: score.total,
      declining: analysis.classification.declining,
      rationale: analysis.rationale.clone(),
      fallback_used: analysis.fallback_used,
      assessed_at: ctx.at,
    };
    if let Err(e) = self.store.append_risk_assessment(patient, assessment).await {
      failures.push(format!("risk assessment: {e}"));
    }

    if let Some(alert) = &decision.alert {
      if let Err(e) = self.store.append_alert(alert.clone()).await {
        failures.push(format!("alert {}: {e}", alert.alert_id));
      }
    }

    for (kind, message) in interactions(decision) {
      let interaction = Interaction {
        interaction_id: Uuid::new_v4(),
        run_id: ctx.run_id,
        day: ctx.day,
        kind,
        message,
        at: ctx.at,
      };
      if let Err(e) = self.store.append_interaction(patient, interaction).await {
        failures.push(format!("{kind} interaction: {e}"));
      }
    }

    for failure in failures {
      self.warn(WarningKind::StoreFailure, Operation::Store, patient, Some(ctx.day), failure);
    }
  }
}

/// The interactions a decision produces, one per reminder.
fn interactions(decision: &EscalationDecision) -> Vec<(InteractionKind, String)> {
  match decision.action {
    Action::Escalate => {
      let reason = decision.alert.as_ref().map_or_else(
        || decision.reasons.join("; "),
        |a| format!("{} alert raised: {}", a.severity, a.reason),
      );
      vec![(InteractionKind::Escalation, reason)]
    }
    Action::Remind => decision
      .reminders
      .iter()
      .map(|r| (InteractionKind::Reminder, format!("{}: {}", r.category, r.message)))
      .collect(),
    Action::Encourage => vec![(
      InteractionKind::Encouragement,
      "Great work completing every task today. Keep it up!".to_owned(),
    )],
    Action::None => vec![(InteractionKind::Routine, "Daily check-in recorded.".to_owned())],
  }
}
