//! Seeded engagement simulator: decides which scheduled tasks a synthetic
//! patient completes.

use aftercare_core::{
  patient::{Patient, PatientId},
  task::DayCompletion,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use crate::{config::SimulationConfig, planner::DailyPlan};

/// A patient's generator seed, derived from the run seed and the patient id
/// so each patient's draws do not depend on processing order.
pub fn patient_seed(run_seed: u64, patient: &PatientId) -> u64 {
  let mut hasher = Sha256::new();
  hasher.update(run_seed.to_le_bytes());
  hasher.update(patient.as_str().as_bytes());
  let digest = hasher.finalize();
  let mut bytes = [0u8; 8];
  bytes.copy_from_slice(&digest[..8]);
  u64::from_le_bytes(bytes)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementSimulator {
  config: SimulationConfig,
}

impl EngagementSimulator {
  pub fn new(config: SimulationConfig) -> Self { Self { config } }

  pub fn rng_for(&self, run_seed: u64, patient: &PatientId) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(patient_seed(run_seed, patient))
  }

  /// One draw per scheduled task, in plan order.
  pub fn simulate(
    &self,
    patient: &Patient,
    plan: &DailyPlan,
    day: u32,
    rng: &mut impl Rng,
  ) -> DayCompletion {
    let p = self.config.completion_probability(patient.baseline_risk, day);
    let mut completion = DayCompletion::default();
    for task in &plan.tasks {
      completion.tasks_mut(task.category).push(rng.gen_bool(p));
    }
    completion
  }
}
