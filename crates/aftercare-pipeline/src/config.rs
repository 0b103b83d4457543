//! Pipeline configuration: the core engine knobs plus the reasoner and the
//! engagement simulator.

use std::time::Duration;

use aftercare_core::{Error as CoreError, config::MonitorConfig, patient::RiskTier};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  pub monitor:    MonitorConfig,
  pub reasoner:   ReasonerConfig,
  pub simulation: SimulationConfig,
}

impl PipelineConfig {
  pub fn validate(&self) -> Result<()> {
    self.monitor.validate()?;
    self.reasoner.validate()?;
    self.simulation.validate()?;
    Ok(())
  }
}

// ─── Reasoner ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReasonerMode {
  #[default]
  Local,
  Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
  pub mode:       ReasonerMode,
  /// Required when `mode = "remote"`.
  pub endpoint:   Option<String>,
  pub timeout_ms: u64,
}

impl Default for ReasonerConfig {
  fn default() -> Self { Self { mode: ReasonerMode::Local, endpoint: None, timeout_ms: 2_000 } }
}

impl ReasonerConfig {
  pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }

  pub fn validate(&self) -> Result<()> {
    if self.timeout_ms == 0 {
      return Err(CoreError::Configuration("reasoner timeout must be positive".into()).into());
    }
    if self.mode == ReasonerMode::Remote && self.endpoint.as_deref().is_none_or(str::is_empty) {
      return Err(
        CoreError::Configuration("remote reasoner mode needs an endpoint".into()).into(),
      );
    }
    Ok(())
  }
}

// ─── Simulation ──────────────────────────────────────────────────────────────

/// Probability that a patient completes any one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
  pub low_risk_completion:    f64,
  pub medium_risk_completion: f64,
  pub high_risk_completion:   f64,
  /// Subtracted once per elapsed day, modelling waning engagement.
  pub daily_decline:          f64,
  /// Completion probability never drops below this.
  pub min_completion:         f64,
}

impl Default for SimulationConfig {
  fn default() -> Self {
    Self {
      low_risk_completion:    0.92,
      medium_risk_completion: 0.82,
      high_risk_completion:   0.70,
      daily_decline:          0.02,
      min_completion:         0.10,
    }
  }
}

impl SimulationConfig {
  pub fn completion_probability(&self, baseline: RiskTier, day: u32) -> f64 {
    let base = match baseline {
      RiskTier::Low => self.low_risk_completion,
      RiskTier::Medium => self.medium_risk_completion,
      RiskTier::High => self.high_risk_completion,
    };
    let decayed = base - self.daily_decline * f64::from(day.saturating_sub(1));
    decayed.clamp(self.min_completion, 1.0)
  }

  pub fn validate(&self) -> Result<()> {
    let probabilities = [
      ("low_risk_completion", self.low_risk_completion),
      ("medium_risk_completion", self.medium_risk_completion),
      ("high_risk_completion", self.high_risk_completion),
      ("min_completion", self.min_completion),
    ];
    for (name, p) in probabilities {
      if !(0.0..=1.0).contains(&p) {
        return Err(CoreError::Configuration(format!("{name} must be within [0, 1], got {p}")).into());
      }
    }
    if self.daily_decline < 0.0 {
      return Err(CoreError::Configuration("daily_decline must not be negative".into()).into());
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() { PipelineConfig::default().validate().unwrap(); }

  #[test]
  fn remote_mode_requires_endpoint() {
    let config = ReasonerConfig { mode: ReasonerMode::Remote, ..Default::default() };
    assert!(config.validate().unwrap_err().is_fatal());

    let config = ReasonerConfig {
      mode: ReasonerMode::Remote,
      endpoint: Some("http://localhost:9000/assess".into()),
      ..Default::default()
    };
    config.validate().unwrap();
  }

  #[test]
  fn completion_probability_declines_to_floor() {
    let sim = SimulationConfig::default();
    assert_eq!(sim.completion_probability(RiskTier::Low, 1), 0.92);
    assert!(sim.completion_probability(RiskTier::High, 5) < 0.70);
    assert_eq!(sim.completion_probability(RiskTier::High, 1_000), 0.10);
  }

  #[test]
  fn out_of_range_probability_is_rejected() {
    let sim = SimulationConfig { high_risk_completion: 1.5, ..Default::default() };
    assert!(sim.validate().is_err());
  }
}
