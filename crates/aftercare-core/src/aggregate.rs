//! Aggregator: folds stored per-patient records into summary statistics and
//! clinical-impact estimates.
//!
//! Everything here is derived on demand from [`PersistentRecord`]s and is
//! never written back as a source of truth.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::{
  config::{EscalationThresholds, ImpactCoefficients},
  patient::{PatientId, RiskTier, RosterStatistics},
  record::{PersistentRecord, Severity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trend {
  Improving,
  Stable,
  Declining,
}

/// Readmission estimates for one patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientImpact {
  pub baseline_risk:   f64,
  pub risk_reduction:  f64,
  pub current_risk:    f64,
  pub expected_saving: f64,
}

/// Readmission, cost and resource estimates for a monitored population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationImpact {
  pub patients:               usize,
  pub average_adherence:      f64,
  pub adherence_improvement:  f64,
  pub baseline_readmissions:  f64,
  pub reduction_rate:         f64,
  pub readmissions_prevented: f64,
  pub gross_savings:          f64,
  pub monitoring_cost:        f64,
  pub net_savings:            f64,
  pub roi:                    f64,
  pub bed_days_saved:         f64,
  pub lives_saved:            f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
  pub patient_id:     PatientId,
  pub days:           usize,
  pub average_score:  f64,
  pub first_score:    f64,
  pub last_score:     f64,
  pub trend:          Trend,
  pub latest_tier:    RiskTier,
  pub escalations:    usize,
  pub pending_alerts: usize,
  pub impact:         PatientImpact,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationReport {
  #[serde(default)]
  pub run_id:                  Option<Uuid>,
  pub patients:                usize,
  pub patient_days:            usize,
  /// Mean of per-patient averages, so every patient weighs the same.
  pub average_score:           f64,
  pub escalations_by_severity: BTreeMap<Severity, usize>,
  pub resolved_alerts:         usize,
  pub pending_alerts:          usize,
  pub tier_distribution:       BTreeMap<RiskTier, usize>,
  pub patient_summaries:       Vec<PatientSummary>,
  pub impact:                  PopulationImpact,
  /// Who was monitored, when the roster is at hand.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub roster:                  Option<RosterStatistics>,
}

impl PopulationReport {
  pub fn total_escalations(&self) -> usize { self.escalations_by_severity.values().sum() }
}

fn mean(values: &[f64]) -> f64 {
  if values.is_empty() {
    0.0
  } else {
    values.iter().sum::<f64>() / values.len() as f64
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregator {
  thresholds:   EscalationThresholds,
  coefficients: ImpactCoefficients,
}

impl Aggregator {
  pub fn new(thresholds: EscalationThresholds, coefficients: ImpactCoefficients) -> Self {
    Self { thresholds, coefficients }
  }

  /// Improving or declining only when first and last differ by more than the
  /// decline delta.
  pub fn trend(&self, scores: &[f64]) -> Trend {
    let (Some(first), Some(last)) = (scores.first(), scores.last()) else {
      return Trend::Stable;
    };
    let delta = self.thresholds.decline_delta;
    if last - first > delta {
      Trend::Improving
    } else if first - last > delta {
      Trend::Declining
    } else {
      Trend::Stable
    }
  }

  fn reduction_rate(&self, average: f64) -> f64 {
    let c = &self.coefficients;
    let improvement = (average - c.baseline_adherence).max(0.0);
    (c.reduction_per_ten_points * improvement / 10.0).min(c.max_reduction)
  }

  pub fn population_impact(&self, patients: usize, average: f64) -> PopulationImpact {
    if patients == 0 {
      return PopulationImpact::default();
    }
    let c = &self.coefficients;
    let n = patients as f64;

    let adherence_improvement = (average - c.baseline_adherence).max(0.0);
    let reduction_rate = self.reduction_rate(average);
    let baseline_readmissions = n * c.baseline_readmission_rate;
    let readmissions_prevented = baseline_readmissions * reduction_rate;
    let gross_savings = readmissions_prevented * c.cost_per_readmission;
    let monitoring_cost = n * c.monitoring_cost_per_patient;
    let roi = if monitoring_cost > 0.0 { gross_savings / monitoring_cost } else { 0.0 };

    PopulationImpact {
      patients,
      average_adherence: average,
      adherence_improvement,
      baseline_readmissions,
      reduction_rate,
      readmissions_prevented,
      gross_savings,
      monitoring_cost,
      net_savings: gross_savings - monitoring_cost,
      roi,
      bed_days_saved: readmissions_prevented * c.bed_days_per_readmission,
      lives_saved: readmissions_prevented * c.mortality_factor,
    }
  }

  pub fn patient_impact(&self, tier: RiskTier, average: f64) -> PatientImpact {
    let c = &self.coefficients;
    let baseline_risk = c.baseline_readmission_rate * c.risk_multiplier(tier);
    let risk_reduction = baseline_risk * self.reduction_rate(average);
    PatientImpact {
      baseline_risk,
      risk_reduction,
      current_risk: baseline_risk - risk_reduction,
      expected_saving: risk_reduction * c.cost_per_readmission,
    }
  }

  /// `None` if the patient has no daily records in scope.
  pub fn summarize_patient(
    &self,
    record: &PersistentRecord,
    run_id: Option<Uuid>,
  ) -> Option<PatientSummary> {
    let daily: Vec<_> = record.daily_for_run(run_id).collect();
    let latest = daily.last()?;
    let scores: Vec<f64> = daily.iter().map(|r| r.score).collect();
    let average_score = mean(&scores);
    let alerts: Vec<_> = record.alerts_for_run(run_id).collect();
    let pending_alerts = record
      .pending_alerts()
      .filter(|a| run_id.is_none_or(|id| a.run_id == id))
      .count();

    Some(PatientSummary {
      patient_id: record.patient_id.clone(),
      days: daily.len(),
      average_score,
      first_score: scores[0],
      last_score: latest.score,
      trend: self.trend(&scores),
      latest_tier: latest.risk,
      escalations: alerts.len(),
      pending_alerts,
      impact: self.patient_impact(latest.risk, average_score),
    })
  }

  pub fn summarize(&self, records: &[PersistentRecord], run_id: Option<Uuid>) -> PopulationReport {
    let mut report = PopulationReport { run_id, ..Default::default() };

    for record in records {
      let Some(summary) = self.summarize_patient(record, run_id) else {
        continue;
      };
      for alert in record.alerts_for_run(run_id) {
        *report.escalations_by_severity.entry(alert.severity).or_default() += 1;
        match record.alert_status(alert.alert_id) {
          Some(status) if status.is_pending() => report.pending_alerts += 1,
          Some(_) => report.resolved_alerts += 1,
          None => {}
        }
      }
      *report.tier_distribution.entry(summary.latest_tier).or_default() += 1;
      report.patient_days += summary.days;
      report.patient_summaries.push(summary);
    }

    report.patients = report.patient_summaries.len();
    let averages: Vec<f64> = report.patient_summaries.iter().map(|s| s.average_score).collect();
    report.average_score = mean(&averages);
    report.impact = self.population_impact(report.patients, report.average_score);

    tracing::debug!(
      patients = report.patients,
      patient_days = report.patient_days,
      escalations = report.total_escalations(),
      "aggregated records"
    );
    report
  }
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, TimeZone, Utc};

  use super::*;
  use crate::{
    record::{Alert, AlertResolution, DailyRecord},
    score::Grade,
    task::DayCompletion,
  };

  fn ts(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn aggregator() -> Aggregator {
    Aggregator::new(EscalationThresholds::default(), ImpactCoefficients::default())
  }

  fn record(id: &str, run_id: Uuid, scores: &[(f64, RiskTier)]) -> PersistentRecord {
    let pid = PatientId::parse(id).unwrap();
    let mut record = PersistentRecord::new(pid.clone(), ts(0));
    for (i, (score, risk)) in scores.iter().enumerate() {
      record
        .push_daily(DailyRecord {
          record_id: Uuid::new_v4(),
          run_id,
          patient_id: pid.clone(),
          day: i as u32 + 1,
          completion: DayCompletion::default(),
          score: *score,
          grade: Grade::C,
          risk: *risk,
          fallback_used: false,
          recorded_at: ts(i as i64),
        })
        .unwrap();
    }
    record
  }

  fn alert(record: &PersistentRecord, run_id: Uuid, severity: Severity) -> Alert {
    Alert {
      alert_id: Uuid::new_v4(),
      patient_id: record.patient_id.clone(),
      run_id,
      day: 1,
      severity,
      reason: "test".into(),
      raised_at: ts(1),
    }
  }

  #[test]
  fn zero_patients_is_all_zero() {
    let report = aggregator().summarize(&[], None);
    assert_eq!(report.patients, 0);
    assert_eq!(report.average_score, 0.0);
    assert_eq!(report.impact, PopulationImpact::default());
    assert_eq!(aggregator().population_impact(0, 95.0), PopulationImpact::default());
  }

  #[test]
  fn population_impact_matches_reference_figures() {
    // 10 patients at 80 average: 20 points over baseline, 24% reduction.
    let impact = aggregator().population_impact(10, 80.0);
    assert!((impact.baseline_readmissions - 2.0).abs() < 1e-9);
    assert!((impact.reduction_rate - 0.24).abs() < 1e-9);
    assert!((impact.readmissions_prevented - 0.48).abs() < 1e-9);
    assert!((impact.gross_savings - 7200.0).abs() < 1e-6);
    assert!((impact.monitoring_cost - 500.0).abs() < 1e-9);
    assert!((impact.net_savings - 6700.0).abs() < 1e-6);
    assert!((impact.roi - 14.4).abs() < 1e-9);
    assert!((impact.bed_days_saved - 1.44).abs() < 1e-9);
    assert!((impact.lives_saved - 0.024).abs() < 1e-9);
  }

  #[test]
  fn reduction_is_capped_and_never_negative() {
    let a = aggregator();
    assert_eq!(a.population_impact(5, 40.0).reduction_rate, 0.0);
    assert!((a.population_impact(5, 100.0).reduction_rate - 0.48).abs() < 1e-9);

    let capped = Aggregator::new(EscalationThresholds::default(), ImpactCoefficients {
      reduction_per_ten_points: 0.5,
      ..Default::default()
    });
    assert_eq!(capped.population_impact(5, 100.0).reduction_rate, 0.5);
  }

  #[test]
  fn patient_impact_scales_with_tier() {
    let a = aggregator();
    let high = a.patient_impact(RiskTier::High, 60.0);
    assert!((high.baseline_risk - 0.30).abs() < 1e-9);
    assert_eq!(high.risk_reduction, 0.0);
    assert_eq!(high.current_risk, high.baseline_risk);

    let low = a.patient_impact(RiskTier::Low, 70.0);
    assert!((low.baseline_risk - 0.12).abs() < 1e-9);
    assert!((low.risk_reduction - 0.12 * 0.12).abs() < 1e-9);
  }

  #[test]
  fn trend_uses_first_and_last_score() {
    let a = aggregator();
    assert_eq!(a.trend(&[33.3, 78.3, 43.3]), Trend::Stable);
    assert_eq!(a.trend(&[40.0, 90.0]), Trend::Improving);
    assert_eq!(a.trend(&[90.0, 70.0, 79.0]), Trend::Declining);
    assert_eq!(a.trend(&[50.0]), Trend::Stable);
    assert_eq!(a.trend(&[]), Trend::Stable);
  }

  #[test]
  fn summary_counts_alerts_and_filters_by_run() {
    let run = Uuid::from_u128(1);
    let other_run = Uuid::from_u128(2);

    let mut p1 = record("P1", run, &[(50.0, RiskTier::High), (70.0, RiskTier::Medium)]);
    let urgent = alert(&p1, run, Severity::High);
    let resolved_id = urgent.alert_id;
    p1.push_alert(urgent).unwrap();
    p1.push_alert(alert(&p1, run, Severity::Medium)).unwrap();
    p1.push_resolution(AlertResolution {
      resolution_id: Uuid::new_v4(),
      alert_id:      resolved_id,
      note:          None,
      resolved_at:   ts(5),
    })
    .unwrap();

    let mut p2 = record("P2", run, &[(100.0, RiskTier::Low)]);
    for (i, score) in [20.0, 30.0].into_iter().enumerate() {
      let mut extra = record("P2", other_run, &[(score, RiskTier::High)]).daily_records;
      extra[0].day = i as u32 + 1;
      p2.push_daily(extra.remove(0)).unwrap();
    }
    let empty = PersistentRecord::new(PatientId::parse("P3").unwrap(), ts(0));

    let report = aggregator().summarize(&[p1.clone(), p2.clone(), empty.clone()], Some(run));
    assert_eq!(report.patients, 2);
    assert_eq!(report.patient_days, 3);
    assert_eq!(report.average_score, 80.0);
    assert_eq!(report.escalations_by_severity[&Severity::High], 1);
    assert_eq!(report.escalations_by_severity[&Severity::Medium], 1);
    assert_eq!(report.total_escalations(), 2);
    assert_eq!(report.resolved_alerts, 1);
    assert_eq!(report.pending_alerts, 1);
    assert_eq!(report.tier_distribution[&RiskTier::Medium], 1);
    assert_eq!(report.tier_distribution[&RiskTier::Low], 1);

    let p1_summary = &report.patient_summaries[0];
    assert_eq!(p1_summary.trend, Trend::Improving);
    assert_eq!(p1_summary.latest_tier, RiskTier::Medium);
    assert_eq!(p1_summary.escalations, 2);
    assert_eq!(p1_summary.pending_alerts, 1);

    let unfiltered = aggregator().summarize(&[p1, p2, empty], None);
    assert_eq!(unfiltered.patient_days, 5);
    assert_eq!(unfiltered.patient_summaries[1].latest_tier, RiskTier::High);
  }
}
