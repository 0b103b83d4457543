//! Score Engine: weighted adherence score and letter grade for one day.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
  Result,
  config::{CategoryWeights, GradeBoundaries, MonitorConfig},
  task::{Category, DayCompletion},
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
pub enum Grade {
  A,
  B,
  C,
  D,
  F,
}

/// The result of scoring one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdherenceScore {
  /// Weighted total in `[0, 100]`.
  pub total:     f64,
  pub grade:     Grade,
  /// Points earned per category; sums to `total` before clamping.
  pub breakdown: BTreeMap<Category, f64>,
}

/// Stateless scorer holding validated weights and grade boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEngine {
  weights: CategoryWeights,
  grades:  GradeBoundaries,
}

impl ScoreEngine {
  pub fn new(weights: CategoryWeights, grades: GradeBoundaries) -> Result<Self> {
    weights.validate()?;
    grades.validate()?;
    Ok(Self { weights, grades })
  }

  pub fn from_config(config: &MonitorConfig) -> Result<Self> {
    Self::new(config.weights, config.grades)
  }

  /// Score a day's completion record.
  ///
  /// A category with nothing scheduled is vacuously satisfied and earns its
  /// full weight; a scheduled category earns `weight × completed / scheduled`.
  pub fn score(&self, day: &DayCompletion) -> AdherenceScore {
    let breakdown: BTreeMap<Category, f64> = Category::all()
      .map(|category| {
        let weight = f64::from(self.weights.weight(category));
        let scheduled = day.scheduled(category);
        let earned = if scheduled == 0 {
          weight
        } else {
          weight * day.completed(category) as f64 / scheduled as f64
        };
        (category, earned)
      })
      .collect();

    let total = breakdown.values().sum::<f64>().clamp(0.0, 100.0);
    AdherenceScore { total, grade: self.grade(total), breakdown }
  }

  pub fn grade(&self, score: f64) -> Grade {
    let g = &self.grades;
    if score >= g.a {
      Grade::A
    } else if score >= g.b {
      Grade::B
    } else if score >= g.c {
      Grade::C
    } else if score >= g.d {
      Grade::D
    } else {
      Grade::F
    }
  }
}
