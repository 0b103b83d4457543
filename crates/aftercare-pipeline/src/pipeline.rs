//! [`Pipeline`]: runs the agents over every patient-day of a simulation.

use std::collections::BTreeMap;

use aftercare_core::{
  aggregate::{Aggregator, PopulationReport},
  decision::{DecisionContext, DecisionEngine, DecisionInput, EscalationDecision},
  knowledge::{Guidance, KnowledgeBase},
  patient::{Patient, PatientId, Roster, RosterStatistics},
  reasoner::{CollaboratorError, LocalReasoner, Reasoner, ReasoningOutcome, ReasoningRequest},
  risk::{RiskClassification, RiskClassifier, RiskInput},
  score::{AdherenceScore, ScoreEngine},
  session::SessionStore,
  store::{RecordStore, StoreError as _},
  task::{Category, DayCompletion},
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
  PipelineConfig, Result,
  planner::DailyPlanner,
  simulate::EngagementSimulator,
  summary::{PatientResult, RunSummary, fingerprint},
  warning::{Operation, Warning, WarningKind},
};

pub(crate) const CTX_LAST_SCORE: &str = "last_score";
pub(crate) const CTX_LAST_TIER: &str = "last_tier";
pub(crate) const CTX_REMINDERS_SENT: &str = "reminders_sent";

// ─── Options ─────────────────────────────────────────────────────────────────

/// What to simulate. Supplying the run id and start time makes a run fully
/// reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
  pub run_id:     Uuid,
  pub started_at: DateTime<Utc>,
  pub seed:       u64,
  pub days:       u32,
}

impl RunOptions {
  /// A fresh run id starting now.
  pub fn new(seed: u64, days: u32) -> Self {
    Self { run_id: Uuid::new_v4(), started_at: Utc::now(), seed, days }
  }

  /// Timestamp attached to everything recorded on `day` (1-based).
  pub fn day_at(&self, day: u32) -> DateTime<Utc> {
    self.started_at + Duration::days(i64::from(day.saturating_sub(1)))
  }
}

/// Where a patient's daily task completions come from.
#[derive(Debug, Clone, Copy)]
enum Completions<'c> {
  Simulated,
  Given(&'c [DayCompletion]),
}

/// The patient-day currently being processed.
#[derive(Debug, Clone, Copy)]
pub struct DayContext<'a> {
  pub patient: &'a Patient,
  pub run_id:  Uuid,
  pub day:     u32,
  pub at:      DateTime<Utc>,
}

impl<'a> DayContext<'a> {
  pub fn decision_context(&self) -> DecisionContext<'a> {
    DecisionContext {
      patient_id: &self.patient.id,
      run_id:     self.run_id,
      day:        self.day,
      at:         self.at,
    }
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Owns every engine, the session store and the collaborators for a run.
///
/// Patients are processed one after another and their days in order, so no
/// two writes to the same record ever overlap.
pub struct Pipeline<S, R> {
  pub(crate) config:     PipelineConfig,
  pub(crate) roster:     Roster,
  pub(crate) knowledge:  KnowledgeBase,
  pub(crate) store:      S,
  pub(crate) reasoner:   R,
  pub(crate) local:      LocalReasoner,
  pub(crate) scorer:     ScoreEngine,
  pub(crate) classifier: RiskClassifier,
  pub(crate) decisions:  DecisionEngine,
  pub(crate) aggregator: Aggregator,
  pub(crate) planner:    DailyPlanner,
  pub(crate) simulator:  EngagementSimulator,
  pub(crate) sessions:   SessionStore,
  pub(crate) warnings:   Vec<Warning>,
}

impl<S: RecordStore, R: Reasoner> Pipeline<S, R> {
  /// Validates the configuration; a bad configuration is the only fatal
  /// error.
  pub fn new(
    config: PipelineConfig,
    roster: Roster,
    knowledge: KnowledgeBase,
    store: S,
    reasoner: R,
  ) -> Result<Self> {
    config.validate()?;
    let m = &config.monitor;
    Ok(Self {
      scorer: ScoreEngine::from_config(m)?,
      classifier: RiskClassifier::new(m.thresholds),
      decisions: DecisionEngine::new(m.thresholds),
      aggregator: Aggregator::new(m.thresholds, m.impact),
      local: LocalReasoner::new(m.thresholds),
      planner: DailyPlanner,
      simulator: EngagementSimulator::new(config.simulation),
      sessions: SessionStore::from_config(&m.session),
      warnings: Vec::new(),
      roster,
      knowledge,
      store,
      reasoner,
      config,
    })
  }

  pub fn config(&self) -> &PipelineConfig { &self.config }

  pub fn roster(&self) -> &Roster { &self.roster }

  pub fn store(&self) -> &S { &self.store }

  pub fn sessions(&self) -> &SessionStore { &self.sessions }

  /// Warnings raised since the last run started.
  pub fn warnings(&self) -> &[Warning] { &self.warnings }

  pub(crate) fn warn(
    &mut self,
    kind: WarningKind,
    operation: Operation,
    patient: &PatientId,
    day: Option<u32>,
    message: impl Into<String>,
  ) {
    let warning = Warning::new(kind, operation, patient, day, message);
    tracing::warn!(
      kind = %warning.kind,
      operation = %warning.operation,
      patient = %warning.patient_id,
      day = ?warning.day,
      "{}",
      warning.message
    );
    self.warnings.push(warning);
  }

  // ── Runs ──────────────────────────────────────────────────────────────────

  /// Simulate every patient on the roster.
  pub async fn run(&mut self, options: &RunOptions) -> Result<RunSummary> {
    let ids: Vec<PatientId> = self.roster.patients().iter().map(|p| p.id.clone()).collect();
    self.run_patients(&ids, options).await
  }

  /// Simulate the given patients. Fails before doing anything if any id is
  /// not on the roster.
  pub async fn run_patients(
    &mut self,
    ids: &[PatientId],
    options: &RunOptions,
  ) -> Result<RunSummary> {
    let work: Vec<(PatientId, Completions<'_>)> =
      ids.iter().map(|id| (id.clone(), Completions::Simulated)).collect();
    self.execute(&work, options).await
  }

  /// Evaluate recorded task completions instead of simulating them. Each
  /// patient's days are numbered from 1 in the order given; the summary's
  /// `days` is the longest list and its `seed` is 0.
  pub async fn replay(
    &mut self,
    completions: &BTreeMap<PatientId, Vec<DayCompletion>>,
    run_id: Uuid,
    started_at: DateTime<Utc>,
  ) -> Result<RunSummary> {
    let days = completions.values().map(Vec::len).max().unwrap_or(0);
    let options = RunOptions {
      run_id,
      started_at,
      seed: 0,
      days: u32::try_from(days).unwrap_or(u32::MAX),
    };
    let work: Vec<(PatientId, Completions<'_>)> = completions
      .iter()
      .map(|(id, given)| (id.clone(), Completions::Given(given)))
      .collect();
    self.execute(&work, &options).await
  }

  async fn execute(
    &mut self,
    work: &[(PatientId, Completions<'_>)],
    options: &RunOptions,
  ) -> Result<RunSummary> {
    for (id, _) in work {
      self.roster.get(id)?;
    }

    self.sessions.clear_all();
    self.warnings.clear();
    tracing::info!(
      run_id = %options.run_id,
      patients = work.len(),
      days = options.days,
      seed = options.seed,
      reasoner = self.reasoner.name(),
      "starting run"
    );

    let mut patients = Vec::with_capacity(work.len());
    for (id, completions) in work {
      let patient = self.roster.get(id)?.clone();
      patients.push(self.run_patient(&patient, options, *completions).await);
    }

    let ids: Vec<PatientId> = work.iter().map(|(id, _)| id.clone()).collect();
    let report = self.report(&ids, Some(options.run_id)).await;
    let fingerprint = fingerprint(&patients)?;
    tracing::info!(
      run_id = %options.run_id,
      average_score = report.average_score,
      escalations = report.total_escalations(),
      warnings = self.warnings.len(),
      "run complete"
    );

    Ok(RunSummary {
      run_id: options.run_id,
      seed: options.seed,
      days: options.days,
      started_at: options.started_at,
      patients,
      report,
      warnings: self.warnings.clone(),
      fingerprint,
    })
  }

  /// Days already recorded for this run are not evaluated again. Their
  /// stored scores still feed the history, and simulated completions are
  /// still drawn for them so the remaining days match an uninterrupted run.
  async fn run_patient(
    &mut self,
    patient: &Patient,
    options: &RunOptions,
    completions: Completions<'_>,
  ) -> PatientResult {
    let recorded = self.recorded_scores(&patient.id, options.run_id).await;
    let plan = self.planner.plan(patient);
    let mut rng = self.simulator.rng_for(options.seed, &patient.id);
    let days = match completions {
      Completions::Simulated => options.days,
      Completions::Given(given) => u32::try_from(given.len()).unwrap_or(u32::MAX),
    };

    let mut history = Vec::new();
    let mut outcomes = Vec::with_capacity(days as usize);
    for day in 1..=days {
      let completion = match completions {
        Completions::Simulated => self.simulator.simulate(patient, &plan, day, &mut rng),
        Completions::Given(given) => given.get(day as usize - 1).cloned().unwrap_or_default(),
      };
      if let Some(&score) = recorded.get(&day) {
        self.warn(
          WarningKind::AlreadyRecorded,
          Operation::Store,
          &patient.id,
          Some(day),
          format!("day {day} of run {} is already recorded; skipped", options.run_id),
        );
        history.push(score);
        continue;
      }

      let ctx = DayContext { patient, run_id: options.run_id, day, at: options.day_at(day) };
      let outcome = self.evaluate_day(&ctx, completion, &history).await;
      history.push(outcome.score.total);
      outcomes.push(outcome);
    }

    let session = self.sessions.get(&patient.id);
    PatientResult {
      patient_id: patient.id.clone(),
      name: patient.name.clone(),
      condition: patient.condition.clone(),
      baseline_risk: patient.baseline_risk,
      days: outcomes,
      reminders_sent: session
        .and_then(|s| s.context(CTX_REMINDERS_SENT))
        .and_then(Value::as_u64)
        .unwrap_or(0),
      session_turns: session.map_or(0, |s| s.turn_count()),
    }
  }

  /// Scores already recorded for this patient in this run, by day.
  ///
  /// An unreadable document is quarantined and the patient starts with no
  /// history.
  async fn recorded_scores(&mut self, patient: &PatientId, run_id: Uuid) -> BTreeMap<u32, f64> {
    let err = match self.store.load(patient).await {
      Ok(record) => {
        return record.daily_for_run(Some(run_id)).map(|r| (r.day, r.score)).collect();
      }
      Err(e) => e,
    };

    if err.is_corrupt() {
      tracing::error!(%patient, error = %err, "stored record is unreadable");
      let moved = match self.store.quarantine(patient).await {
        Ok(moved) => moved,
        Err(e) => {
          tracing::error!(%patient, error = %e, "failed to quarantine record");
          false
        }
      };
      self.warn(
        WarningKind::CorruptRecord,
        Operation::Store,
        patient,
        None,
        format!("{err}; quarantined: {moved}; continuing with no prior history"),
      );
    } else {
      self.warn(
        WarningKind::StoreFailure,
        Operation::Store,
        patient,
        None,
        format!("could not load history: {err}"),
      );
    }
    BTreeMap::new()
  }

  /// Aggregate what the store holds for `ids`.
  pub async fn report(&mut self, ids: &[PatientId], run_id: Option<Uuid>) -> PopulationReport {
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
      match self.store.load(id).await {
        Ok(record) => records.push(record),
        Err(e) => self.warn(
          WarningKind::StoreFailure,
          Operation::Store,
          id,
          None,
          format!("left out of the report: {e}"),
        ),
      }
    }
    let mut report = self.aggregator.summarize(&records, run_id);
    report.roster = Some(RosterStatistics::of(
      ids.iter().filter_map(|id| self.roster.get(id).ok()),
    ));
    report
  }

  // ── Stages ────────────────────────────────────────────────────────────────

  /// [`Operation::Score`]
  pub fn score(&self, completion: &DayCompletion) -> AdherenceScore {
    self.scorer.score(completion)
  }

  /// [`Operation::Classify`]
  pub fn classify(&self, patient: &Patient, score: f64, history: &[f64]) -> RiskClassification {
    self.classifier.classify(RiskInput {
      baseline: patient.baseline_risk,
      age: patient.age,
      current_score: score,
      history,
    })
  }

  /// [`Operation::Reason`]: ask the collaborator, bounded by the configured
  /// timeout. On failure the local reasoner answers and the error is
  /// returned alongside.
  pub async fn reason(
    &self,
    request: &ReasoningRequest,
  ) -> (ReasoningOutcome, Option<CollaboratorError>) {
    let timeout = self.config.reasoner.timeout();
    let result = match tokio::time::timeout(timeout, self.reasoner.assess(request)).await {
      Ok(result) => result,
      Err(_) => Err(CollaboratorError::Timeout(timeout)),
    };
    match result {
      Ok(outcome) => (outcome, None),
      Err(e) => (self.local.explain(request), Some(e)),
    }
  }

  /// [`Operation::Lookup`]: guidance for each category, plus the categories
  /// nothing covers.
  pub fn lookup(
    &self,
    condition: &str,
    categories: &[Category],
  ) -> (BTreeMap<Category, Guidance>, Vec<(Category, aftercare_core::Error)>) {
    let mut found = BTreeMap::new();
    let mut missing = Vec::new();
    for category in categories {
      match self.knowledge.lookup(condition, *category) {
        Ok(guidance) => {
          found.insert(*category, guidance);
        }
        Err(e) => missing.push((*category, e)),
      }
    }
    (found, missing)
  }

  /// [`Operation::Decide`]
  pub fn decide(&self, input: DecisionInput<'_>, ctx: &DayContext<'_>) -> EscalationDecision {
    self.decisions.decide(input, ctx.decision_context())
  }

  pub(crate) fn note_context(&mut self, patient: &PatientId, key: &str, value: Value) {
    self.sessions.set_context(patient, key, value);
  }
}
