//! Risk Classifier: maps a patient's baseline and score history to a tier.
//!
//! Each contributing factor carries points; the point total picks the tier,
//! and a HIGH baseline floors the result at MEDIUM.

use serde::{Deserialize, Serialize};

use crate::{config::EscalationThresholds, patient::RiskTier};

const HIGH_TIER_POINTS: u32 = 5;
const MEDIUM_TIER_POINTS: u32 = 2;

/// A named reason contributing to a patient's risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
  HighRiskBaseline,
  ModerateRiskBaseline,
  LowCurrentScore,
  BelowTargetScore,
  DecliningTrend,
  AdvancedAge,
}

impl RiskFactor {
  pub fn points(self) -> u32 {
    match self {
      Self::HighRiskBaseline | Self::LowCurrentScore => 3,
      Self::BelowTargetScore | Self::DecliningTrend => 2,
      Self::ModerateRiskBaseline | Self::AdvancedAge => 1,
    }
  }

  pub fn describe(self, thresholds: &EscalationThresholds) -> String {
    match self {
      Self::HighRiskBaseline => "high-risk baseline condition".into(),
      Self::ModerateRiskBaseline => "moderate-risk baseline condition".into(),
      Self::LowCurrentScore => "low current score".into(),
      Self::BelowTargetScore => "below-target score".into(),
      Self::DecliningTrend => "declining trend".into(),
      Self::AdvancedAge => format!("age ≥ {}", thresholds.advanced_age),
    }
  }
}

/// Everything the classifier looks at.
#[derive(Debug, Clone, Copy)]
pub struct RiskInput<'a> {
  pub baseline:      RiskTier,
  pub age:           u32,
  pub current_score: f64,
  /// Prior scores, oldest first. May be empty.
  pub history:       &'a [f64],
}

/// The classifier's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskClassification {
  pub tier:      RiskTier,
  pub factors:   Vec<RiskFactor>,
  pub declining: bool,
  pub points:    u32,
}

impl RiskClassification {
  pub fn factor_descriptions(&self, thresholds: &EscalationThresholds) -> Vec<String> {
    self.factors.iter().map(|f| f.describe(thresholds)).collect()
  }
}

/// The lowest tier a patient with this baseline may be assigned.
pub fn floor_for(baseline: RiskTier) -> RiskTier {
  match baseline {
    RiskTier::High => RiskTier::Medium,
    RiskTier::Medium | RiskTier::Low => RiskTier::Low,
  }
}

/// Two-point trend rule: the most recent prior score minus the current score
/// must exceed `delta`.
pub fn is_declining(history: &[f64], current: f64, delta: f64) -> bool {
  history.last().is_some_and(|previous| previous - current > delta)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskClassifier {
  thresholds: EscalationThresholds,
}

impl RiskClassifier {
  pub fn new(thresholds: EscalationThresholds) -> Self { Self { thresholds } }

  pub fn thresholds(&self) -> &EscalationThresholds { &self.thresholds }

  pub fn classify(&self, input: RiskInput<'_>) -> RiskClassification {
    let t = &self.thresholds;
    let mut factors = Vec::new();

    match input.baseline {
      RiskTier::High => factors.push(RiskFactor::HighRiskBaseline),
      RiskTier::Medium => factors.push(RiskFactor::ModerateRiskBaseline),
      RiskTier::Low => {}
    }

    if input.current_score < t.critical_score {
      factors.push(RiskFactor::LowCurrentScore);
    } else if input.current_score < t.concern_score {
      factors.push(RiskFactor::BelowTargetScore);
    }

    let declining = is_declining(input.history, input.current_score, t.decline_delta);
    if declining {
      factors.push(RiskFactor::DecliningTrend);
    }

    if input.age >= t.advanced_age {
      factors.push(RiskFactor::AdvancedAge);
    }

    let points: u32 = factors.iter().map(|f| f.points()).sum();
    let by_points = if points >= HIGH_TIER_POINTS {
      RiskTier::High
    } else if points >= MEDIUM_TIER_POINTS {
      RiskTier::Medium
    } else {
      RiskTier::Low
    };

    RiskClassification {
      tier: by_points.max(floor_for(input.baseline)),
      factors,
      declining,
      points,
    }
  }
}
