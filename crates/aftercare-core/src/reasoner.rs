//! The reasoning collaborator seam.
//!
//! A [`Reasoner`] looks at the classifier's verdict and produces a rationale,
//! optionally suggesting a different tier. [`LocalReasoner`] is the
//! deterministic implementation that is always available; remote
//! implementations live with the pipeline.

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  config::EscalationThresholds,
  patient::{PatientId, RiskTier},
  risk::{RiskClassification, floor_for},
  task::Category,
};

/// Why the collaborator could not answer. Always recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
  #[error("reasoner timed out after {0:?}")]
  Timeout(Duration),

  #[error("reasoner transport error: {0}")]
  Transport(String),

  #[error("reasoner returned unusable output: {0}")]
  Unparseable(String),

  #[error("reasoner is not configured")]
  Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRequest {
  pub patient_id:     PatientId,
  pub condition:      String,
  pub age:            u32,
  pub baseline:       RiskTier,
  pub day:            u32,
  pub score:          f64,
  /// Prior scores in this run, oldest first.
  pub history:        Vec<f64>,
  pub classification: RiskClassification,
  pub missed:         Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningOutcome {
  pub rationale: String,
  /// A suggested tier. `None` keeps the classifier's tier.
  #[serde(default)]
  pub tier:      Option<RiskTier>,
}

impl ReasoningOutcome {
  /// The tier to act on: the suggestion if any, never below the baseline
  /// floor.
  pub fn effective_tier(&self, request: &ReasoningRequest) -> RiskTier {
    self
      .tier
      .unwrap_or(request.classification.tier)
      .max(floor_for(request.baseline))
  }
}

pub trait Reasoner: Send + Sync {
  fn name(&self) -> &str;

  fn assess<'a>(
    &'a self,
    request: &'a ReasoningRequest,
  ) -> impl Future<Output = Result<ReasoningOutcome, CollaboratorError>> + Send + 'a;
}

/// Builds a rationale from the classifier's factors. Never fails and never
/// changes the tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalReasoner {
  thresholds: EscalationThresholds,
}

impl LocalReasoner {
  pub fn new(thresholds: EscalationThresholds) -> Self { Self { thresholds } }

  pub fn explain(&self, request: &ReasoningRequest) -> ReasoningOutcome {
    let c = &request.classification;
    let factors = c.factor_descriptions(&self.thresholds);
    let mut rationale = format!(
      "{} risk on day {} with adherence {:.1}",
      c.tier, request.day, request.score
    );
    if !factors.is_empty() {
      rationale.push_str(&format!(": {}", factors.join(", ")));
    }
    if !request.missed.is_empty() {
      let missed: Vec<String> = request.missed.iter().map(Category::to_string).collect();
      rationale.push_str(&format!("; missed {}", missed.join(", ")));
    }
    ReasoningOutcome { rationale, tier: None }
  }
}

impl Reasoner for LocalReasoner {
  fn name(&self) -> &str { "local" }

  async fn assess<'a>(
    &'a self,
    request: &'a ReasoningRequest,
  ) -> Result<ReasoningOutcome, CollaboratorError> {
    Ok(self.explain(request))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::risk::{RiskClassifier, RiskInput};

  fn request(baseline: RiskTier, score: f64, history: Vec<f64>) -> ReasoningRequest {
    let classification = RiskClassifier::new(EscalationThresholds::default()).classify(RiskInput {
      baseline,
      age: 70,
      current_score: score,
      history: &history,
    });
    ReasoningRequest {
      patient_id: PatientId::parse("P001").unwrap(),
      condition: "heart failure".into(),
      age: 70,
      baseline,
      day: 3,
      score,
      history,
      classification,
      missed: vec![Category::Medication, Category::Diet],
    }
  }

  #[tokio::test]
  async fn local_reasoner_is_deterministic() {
    let reasoner = LocalReasoner::default();
    let req = request(RiskTier::High, 43.3, vec![78.3]);
    let a = reasoner.assess(&req).await.unwrap();
    let b = reasoner.assess(&req).await.unwrap();
    assert_eq!(a, b);
    assert!(a.tier.is_none());
    assert!(a.rationale.starts_with("HIGH risk on day 3 with adherence 43.3"));
    assert!(a.rationale.contains("declining trend"));
    assert!(a.rationale.ends_with("missed medication, diet"));
  }

  #[test]
  fn suggested_tier_is_clamped_to_baseline_floor() {
    let req = request(RiskTier::High, 95.0, vec![]);
    let outcome = ReasoningOutcome { rationale: String::new(), tier: Some(RiskTier::Low) };
    assert_eq!(outcome.effective_tier(&req), RiskTier::Medium);

    let keep = ReasoningOutcome { rationale: String::new(), tier: None };
    assert_eq!(keep.effective_tier(&req), req.classification.tier);
  }
}
