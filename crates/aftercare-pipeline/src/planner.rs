//! Daily Planner: expands a discharge plan into the day's scheduled tasks.

use aftercare_core::{
  patient::{DischargePlan, Patient},
  task::Category,
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// One task instance on the daily schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
  pub category: Category,
  pub time:     NaiveTime,
  pub name:     String,
}

/// A patient's schedule for one day, ordered by time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPlan {
  pub tasks: Vec<ScheduledTask>,
}

impl DailyPlan {
  pub fn scheduled(&self, category: Category) -> usize {
    self.tasks.iter().filter(|t| t.category == category).count()
  }

  pub fn len(&self) -> usize { self.tasks.len() }

  pub fn is_empty(&self) -> bool { self.tasks.is_empty() }
}

/// First and last slot of the day for each category, in whole hours.
fn window(category: Category) -> (u32, u32) {
  match category {
    Category::Vitals => (7, 19),
    Category::Medication => (8, 20),
    Category::Therapy => (10, 16),
    Category::Diet => (8, 18),
  }
}

/// `n` evenly spaced times across the category's window. A single instance
/// takes the window's start.
fn slots(category: Category, n: usize) -> Vec<NaiveTime> {
  let (start, end) = window(category);
  let (start_min, end_min) = (start * 60, end * 60);
  (0..n)
    .map(|i| {
      let minute = if n <= 1 {
        start_min
      } else {
        start_min + (end_min - start_min) * i as u32 / (n as u32 - 1)
      };
      NaiveTime::from_hms_opt(minute / 60, minute % 60, 0).unwrap_or(NaiveTime::MIN)
    })
    .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DailyPlanner;

impl DailyPlanner {
  pub fn plan(&self, patient: &Patient) -> DailyPlan { self.plan_for(&patient.discharge_plan) }

  pub fn plan_for(&self, plan: &DischargePlan) -> DailyPlan {
    let mut tasks = Vec::new();
    for category in Category::all() {
      for item in plan.items(category) {
        for time in slots(category, item.times_per_day()) {
          tasks.push(ScheduledTask { category, time, name: item.name.clone() });
        }
      }
    }
    // Stable, so items of one category keep their plan order within a slot.
    tasks.sort_by_key(|t| (t.time, t.category));
    DailyPlan { tasks }
  }
}
