//! Tunable knobs for the monitoring core.
//!
//! Every section deserialises with defaults, so a configuration file only
//! needs to mention what it overrides. Call [`MonitorConfig::validate`] once
//! at startup; any error it returns is fatal.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, patient::RiskTier, task::Category};

// ─── Top level ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
  pub weights:    CategoryWeights,
  pub grades:     GradeBoundaries,
  pub thresholds: EscalationThresholds,
  pub session:    SessionConfig,
  pub impact:     ImpactCoefficients,
}

impl MonitorConfig {
  pub fn validate(&self) -> Result<()> {
    self.weights.validate()?;
    self.grades.validate()?;
    self.thresholds.validate()?;
    if self.session.max_turns == 0 {
      return Err(Error::Configuration(
        "session.max_turns must be at least 1".into(),
      ));
    }
    Ok(())
  }
}

// ─── Score weights ───────────────────────────────────────────────────────────

/// Per-category contribution to the adherence score. Must sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
  pub medication: u32,
  pub therapy:    u32,
  pub diet:       u32,
  pub vitals:     u32,
}

impl Default for CategoryWeights {
  fn default() -> Self {
    Self { medication: 40, therapy: 30, diet: 20, vitals: 10 }
  }
}

impl CategoryWeights {
  pub fn weight(&self, category: Category) -> u32 {
    match category {
      Category::Medication => self.medication,
      Category::Therapy => self.therapy,
      Category::Diet => self.diet,
      Category::Vitals => self.vitals,
    }
  }

  pub fn total(&self) -> u32 { Category::all().map(|c| self.weight(c)).sum() }

  pub fn validate(&self) -> Result<()> {
    match self.total() {
      100 => Ok(()),
      other => Err(Error::Configuration(format!(
        "category weights must sum to 100, got {other}"
      ))),
    }
  }
}

// ─── Grade boundaries ────────────────────────────────────────────────────────

/// Inclusive lower bounds for each letter grade; anything below `d` is F.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeBoundaries {
  pub a: f64,
  pub b: f64,
  pub c: f64,
  pub d: f64,
}

impl Default for GradeBoundaries {
  fn default() -> Self { Self { a: 90.0, b: 75.0, c: 60.0, d: 40.0 } }
}

impl GradeBoundaries {
  pub fn validate(&self) -> Result<()> {
    let ordered = self.a <= 100.0
      && self.a > self.b
      && self.b > self.c
      && self.c > self.d
      && self.d > 0.0;
    if ordered {
      Ok(())
    } else {
      Err(Error::Configuration(format!(
        "grade boundaries must satisfy 100 >= a > b > c > d > 0, got {self:?}"
      )))
    }
  }
}

// ─── Escalation thresholds ───────────────────────────────────────────────────

/// Score cutoffs shared by the risk classifier and the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationThresholds {
  /// Below this a score is "low"; a HIGH-risk patient escalates urgently.
  pub critical_score:  f64,
  /// Below this a score is "below target"; with a declining trend, a
  /// MEDIUM-risk patient escalates.
  pub concern_score:   f64,
  /// At or above this, a day with no missed tasks earns encouragement.
  pub encourage_score: f64,
  /// A drop from the previous score larger than this is a declining trend.
  pub decline_delta:   f64,
  /// Patients at or above this age carry an extra risk factor.
  pub advanced_age:    u32,
}

impl Default for EscalationThresholds {
  fn default() -> Self {
    Self {
      critical_score:  40.0,
      concern_score:   60.0,
      encourage_score: 90.0,
      decline_delta:   10.0,
      advanced_age:    65,
    }
  }
}

impl EscalationThresholds {
  pub fn validate(&self) -> Result<()> {
    if !(self.critical_score < self.concern_score
      && self.concern_score <= self.encourage_score)
    {
      return Err(Error::Configuration(format!(
        "thresholds must satisfy critical < concern <= encourage, got {self:?}"
      )));
    }
    if self.decline_delta < 0.0 {
      return Err(Error::Configuration(
        "thresholds.decline_delta must not be negative".into(),
      ));
    }
    Ok(())
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
  /// Turns kept per patient before the oldest are compacted away.
  pub max_turns: usize,
}

impl Default for SessionConfig {
  fn default() -> Self { Self { max_turns: 50 } }
}

// ─── Impact coefficients ─────────────────────────────────────────────────────

/// Published-literature constants used by the impact estimates.
///
/// Sources: CMS Hospital Readmissions Reduction Program (2024) for the
/// baseline rate and readmission cost; NEJM (2019) for the adherence
/// effect; Cochrane (2021) and JAMA (2022) for the remaining factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactCoefficients {
  /// Expected 30-day readmission rate without intervention.
  pub baseline_readmission_rate:   f64,
  /// Fractional readmission reduction per 10 points of adherence gained.
  pub reduction_per_ten_points:    f64,
  /// Upper bound on the fractional readmission reduction.
  pub max_reduction:               f64,
  /// Adherence score expected without monitoring.
  pub baseline_adherence:          f64,
  pub cost_per_readmission:        f64,
  pub monitoring_cost_per_patient: f64,
  pub bed_days_per_readmission:    f64,
  /// Deaths averted per readmission prevented.
  pub mortality_factor:            f64,
  pub high_risk_multiplier:        f64,
  pub medium_risk_multiplier:      f64,
  pub low_risk_multiplier:         f64,
}

impl Default for ImpactCoefficients {
  fn default() -> Self {
    Self {
      baseline_readmission_rate:   0.20,
      reduction_per_ten_points:    0.12,
      max_reduction:               0.50,
      baseline_adherence:          60.0,
      cost_per_readmission:        15_000.0,
      monitoring_cost_per_patient: 50.0,
      bed_days_per_readmission:    3.0,
      mortality_factor:            0.05,
      high_risk_multiplier:        1.5,
      medium_risk_multiplier:      1.0,
      low_risk_multiplier:         0.6,
    }
  }
}

impl ImpactCoefficients {
  pub fn risk_multiplier(&self, tier: RiskTier) -> f64 {
    match tier {
      RiskTier::High => self.high_risk_multiplier,
      RiskTier::Medium => self.medium_risk_multiplier,
      RiskTier::Low => self.low_risk_multiplier,
    }
  }
}
