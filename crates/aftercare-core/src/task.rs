//! Task categories and per-day completion records.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator as _};

/// The kind of discharge-plan task a patient is asked to complete.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
  Medication,
  Therapy,
  Diet,
  Vitals,
}

impl Category {
  pub fn all() -> impl Iterator<Item = Category> { Self::iter() }
}

/// Completion booleans for one (patient, day), one entry per scheduled task
/// instance, keyed by category. A category with no entries had nothing
/// scheduled that day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCompletion {
  #[serde(default)]
  pub medication: Vec<bool>,
  #[serde(default)]
  pub therapy:    Vec<bool>,
  #[serde(default)]
  pub diet:       Vec<bool>,
  #[serde(default)]
  pub vitals:     Vec<bool>,
}

impl DayCompletion {
  /// Builder-style setter, mostly useful in tests and fixtures.
  pub fn with(mut self, category: Category, tasks: Vec<bool>) -> Self {
    *self.tasks_mut(category) = tasks;
    self
  }

  pub fn tasks(&self, category: Category) -> &[bool] {
    match category {
      Category::Medication => &self.medication,
      Category::Therapy => &self.therapy,
      Category::Diet => &self.diet,
      Category::Vitals => &self.vitals,
    }
  }

  pub fn tasks_mut(&mut self, category: Category) -> &mut Vec<bool> {
    match category {
      Category::Medication => &mut self.medication,
      Category::Therapy => &mut self.therapy,
      Category::Diet => &mut self.diet,
      Category::Vitals => &mut self.vitals,
    }
  }

  pub fn scheduled(&self, category: Category) -> usize {
    self.tasks(category).len()
  }

  pub fn completed(&self, category: Category) -> usize {
    self.tasks(category).iter().filter(|done| **done).count()
  }

  pub fn total_scheduled(&self) -> usize {
    Category::all().map(|c| self.scheduled(c)).sum()
  }

  pub fn total_completed(&self) -> usize {
    Category::all().map(|c| self.completed(c)).sum()
  }

  /// Categories with at least one missed task, in category order.
  pub fn missed_categories(&self) -> Vec<Category> {
    Category::all()
      .filter(|c| self.completed(*c) < self.scheduled(*c))
      .collect()
  }

  /// Categories where tasks were scheduled and none was completed.
  pub fn fully_missed_categories(&self) -> Vec<Category> {
    Category::all()
      .filter(|c| self.scheduled(*c) > 0 && self.completed(*c) == 0)
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counts_and_missed_categories() {
    let day = DayCompletion::default()
      .with(Category::Medication, vec![true, false])
      .with(Category::Therapy, vec![false])
      .with(Category::Diet, vec![true]);

    assert_eq!(day.total_scheduled(), 4);
    assert_eq!(day.total_completed(), 2);
    assert_eq!(
      day.missed_categories(),
      vec![Category::Medication, Category::Therapy]
    );
    assert_eq!(day.fully_missed_categories(), vec![Category::Therapy]);
  }

  #[test]
  fn unscheduled_category_is_never_missed() {
    let day = DayCompletion::default();
    assert!(day.missed_categories().is_empty());
    assert!(day.fully_missed_categories().is_empty());
  }

  #[test]
  fn category_display_matches_serde() {
    for category in Category::all() {
      let json = serde_json::to_string(&category).unwrap();
      assert_eq!(json, format!("\"{category}\""));
    }
  }
}
