//! Patients, their discharge plans, and the roster loaded from the patient
//! source document.

use std::{
  collections::{BTreeMap, HashSet},
  fmt,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result, task::Category};

// ─── Identity ────────────────────────────────────────────────────────────────

/// A patient identifier such as `P001`.
///
/// Identifiers double as backing-file names, so only ASCII letters, digits,
/// `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatientId(String);

impl PatientId {
  pub fn parse(raw: impl Into<String>) -> Result<Self> {
    let raw = raw.into();
    let valid = !raw.is_empty()
      && raw.len() <= 64
      && raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid { Ok(Self(raw)) } else { Err(Error::InvalidPatientId(raw)) }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for PatientId {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(value) }
}

impl From<PatientId> for String {
  fn from(id: PatientId) -> Self { id.0 }
}

impl fmt::Display for PatientId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.pad(&self.0) }
}

// ─── Risk tier ───────────────────────────────────────────────────────────────

/// Escalation priority classification. Ordered `Low < Medium < High`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum RiskTier {
  #[default]
  #[serde(alias = "low", alias = "Low")]
  Low,
  #[serde(alias = "medium", alias = "Medium")]
  Medium,
  #[serde(alias = "high", alias = "High")]
  High,
}

// ─── Discharge plan ──────────────────────────────────────────────────────────

/// The discharge plan as written in the source document: free-text entries of
/// the form `"Name - frequency"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DischargePlan {
  #[serde(default)]
  pub medications: Vec<String>,
  #[serde(default)]
  pub therapy:     Vec<String>,
  #[serde(default)]
  pub diet:        Vec<String>,
  #[serde(default)]
  pub vitals:      Vec<String>,
  #[serde(default)]
  pub follow_up:   Option<NaiveDate>,
}

impl DischargePlan {
  /// Parsed entries for one category, in document order.
  pub fn items(&self, category: Category) -> Vec<PlanItem> {
    let raw = match category {
      Category::Medication => &self.medications,
      Category::Therapy => &self.therapy,
      Category::Diet => &self.diet,
      Category::Vitals => &self.vitals,
    };
    raw.iter().map(|entry| PlanItem::parse(entry)).collect()
  }
}

/// One parsed discharge-plan entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
  pub name:      String,
  pub frequency: String,
}

impl PlanItem {
  pub const DEFAULT_FREQUENCY: &'static str = "as prescribed";

  /// Split `"Lisinopril 10mg - Once daily"` into name and frequency. Entries
  /// without a separator get [`Self::DEFAULT_FREQUENCY`].
  pub fn parse(entry: &str) -> Self {
    let (name, frequency) = match entry.split_once(" - ") {
      Some((name, rest)) => {
        let rest = rest.trim().trim_start_matches('-').trim();
        (name.trim(), rest)
      }
      None => (entry.trim(), ""),
    };
    let frequency = if frequency.is_empty() {
      Self::DEFAULT_FREQUENCY
    } else {
      frequency
    };
    Self { name: name.to_owned(), frequency: frequency.to_owned() }
  }

  /// How many task instances this entry schedules per day.
  pub fn times_per_day(&self) -> usize {
    let f = self.frequency.to_lowercase();
    if f.contains("four times") || f.contains("qid") {
      4
    } else if f.contains("three times") || f.contains("thrice") || f.contains("tid") {
      3
    } else if f.contains("twice") || f.contains("two times") || f.contains("bid") {
      2
    } else {
      1
    }
  }
}

// ─── Patient ─────────────────────────────────────────────────────────────────

/// A discharged patient. Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
  pub id:             PatientId,
  pub name:           String,
  pub age:            u32,
  /// Free-text baseline condition, e.g. "Heart Failure".
  pub condition:      String,
  /// Baseline risk tier assigned at discharge.
  #[serde(rename = "risk")]
  pub baseline_risk:  RiskTier,
  #[serde(default)]
  pub discharge_plan: DischargePlan,
}

impl Patient {
  /// Ages above this are accepted but flagged.
  pub const MAX_PLAUSIBLE_AGE: u32 = 150;

  /// The field's value as it would be matched by [`Roster::search`].
  pub fn field(&self, field: PatientField) -> String {
    match field {
      PatientField::Id => self.id.to_string(),
      PatientField::Name => self.name.clone(),
      PatientField::Age => self.age.to_string(),
      PatientField::Condition => self.condition.clone(),
      PatientField::Risk => self.baseline_risk.to_string(),
    }
  }

  /// Problems worth flagging that do not stop the patient from being
  /// monitored. Empty when the entry looks sound.
  pub fn validate(&self) -> Vec<String> {
    let mut problems = Vec::new();
    if self.name.trim().is_empty() {
      problems.push("missing name".to_owned());
    }
    if self.condition.trim().is_empty() {
      problems.push("missing condition".to_owned());
    }
    if self.age > Self::MAX_PLAUSIBLE_AGE {
      problems.push(format!("age {} seems unusual", self.age));
    }
    problems
  }

  fn mentions(&self, needle: &str) -> bool {
    let plan = &self.discharge_plan;
    [self.id.as_str(), self.name.as_str(), self.condition.as_str()]
      .into_iter()
      .chain([plan.medications.iter(), plan.therapy.iter(), plan.diet.iter(), plan.vitals.iter()]
        .into_iter()
        .flatten()
        .map(String::as_str))
      .any(|text| text.to_lowercase().contains(needle))
      || self.age.to_string() == needle
      || self.baseline_risk.to_string().eq_ignore_ascii_case(needle)
  }
}

/// A patient attribute [`Roster::search`] can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PatientField {
  Id,
  Name,
  Age,
  Condition,
  Risk,
}

// ─── Roster ──────────────────────────────────────────────────────────────────

/// The patients enumerated by the source document.
#[derive(Debug, Clone, Default)]
pub struct Roster {
  patients: Vec<Patient>,
}

impl Roster {
  /// Build a roster, rejecting duplicate identifiers. Implausible entries
  /// are logged and kept.
  pub fn new(patients: Vec<Patient>) -> Result<Self> {
    let mut seen = HashSet::new();
    for p in &patients {
      if !seen.insert(p.id.clone()) {
        return Err(Error::Configuration(format!(
          "duplicate patient id {} in source document",
          p.id
        )));
      }
      for problem in p.validate() {
        tracing::warn!(patient = %p.id, "{problem}");
      }
    }
    Ok(Self { patients })
  }

  /// Parse the JSON patient source document (an array of patients).
  pub fn from_json(raw: &str) -> Result<Self> {
    let patients: Vec<Patient> = serde_json::from_str(raw)?;
    Self::new(patients)
  }

  pub fn get(&self, id: &PatientId) -> Result<&Patient> {
    self
      .patients
      .iter()
      .find(|p| &p.id == id)
      .ok_or_else(|| Error::PatientNotFound(id.clone()))
  }

  pub fn patients(&self) -> &[Patient] { &self.patients }

  pub fn len(&self) -> usize { self.patients.len() }

  pub fn is_empty(&self) -> bool { self.patients.is_empty() }

  /// Patients whose `field` equals `value` exactly. Risk tiers match in
  /// any case.
  pub fn search(&self, field: PatientField, value: &str) -> Vec<&Patient> {
    self
      .patients
      .iter()
      .filter(|p| {
        let actual = p.field(field);
        match field {
          PatientField::Risk => actual.eq_ignore_ascii_case(value),
          _ => actual == value,
        }
      })
      .collect()
  }

  /// Patients mentioning `query` anywhere in their entry, ignoring case.
  pub fn search_text(&self, query: &str) -> Vec<&Patient> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
      return Vec::new();
    }
    self.patients.iter().filter(|p| p.mentions(&needle)).collect()
  }

  /// Patient-identity statistics for this roster.
  pub fn statistics(&self) -> RosterStatistics { RosterStatistics::of(&self.patients) }

  /// Every validation problem on the roster, in roster order.
  pub fn problems(&self) -> Vec<(PatientId, String)> {
    self
      .patients
      .iter()
      .flat_map(|p| p.validate().into_iter().map(|problem| (p.id.clone(), problem)))
      .collect()
  }
}

/// Who is being monitored: head count, age spread and baseline tiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterStatistics {
  pub patients:    usize,
  pub average_age: f64,
  pub min_age:     u32,
  pub max_age:     u32,
  pub by_risk:     BTreeMap<RiskTier, usize>,
}

impl RosterStatistics {
  /// All zeroes for no patients.
  pub fn of<'a>(patients: impl IntoIterator<Item = &'a Patient>) -> Self {
    let mut stats = Self::default();
    let mut total_age = 0u64;
    for p in patients {
      if stats.patients == 0 {
        stats.min_age = p.age;
        stats.max_age = p.age;
      } else {
        stats.min_age = stats.min_age.min(p.age);
        stats.max_age = stats.max_age.max(p.age);
      }
      stats.patients += 1;
      total_age += u64::from(p.age);
      *stats.by_risk.entry(p.baseline_risk).or_default() += 1;
    }
    if stats.patients > 0 {
      stats.average_age = total_age as f64 / stats.patients as f64;
    }
    stats
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SOURCE: &str = r#"[
    {
      "id": "P001",
      "name": "John Doe",
      "age": 68,
      "condition": "Heart Failure",
      "risk": "high",
      "discharge_plan": {
        "medications": ["Lisinopril 10mg - Once daily", "Metoprolol 50mg - Twice daily"],
        "therapy": ["Walking - 15 minutes daily"],
        "diet": ["Low sodium"],
        "follow_up": "2025-12-05"
      }
    },
    { "id": "P002", "name": "Jane Roe", "age": 45, "condition": "Knee surgery", "risk": "LOW" }
  ]"#;

  #[test]
  fn loads_source_document() {
    let roster = Roster::from_json(SOURCE).unwrap();
    assert_eq!(roster.len(), 2);

    let p1 = roster.get(&PatientId::parse("P001").unwrap()).unwrap();
    assert_eq!(p1.baseline_risk, RiskTier::High);
    assert_eq!(p1.discharge_plan.medications.len(), 2);
    assert_eq!(
      p1.discharge_plan.follow_up,
      NaiveDate::from_ymd_opt(2025, 12, 5)
    );

    let p2 = roster.get(&PatientId::parse("P002").unwrap()).unwrap();
    assert!(p2.discharge_plan.medications.is_empty());
  }

  #[test]
  fn missing_patient_is_not_found() {
    let roster = Roster::from_json(SOURCE).unwrap();
    let err = roster.get(&PatientId::parse("P404").unwrap()).unwrap_err();
    assert!(matches!(err, Error::PatientNotFound(id) if id.as_str() == "P404"));
  }

  #[test]
  fn duplicate_ids_are_a_configuration_error() {
    let raw = r#"[
      {"id": "P1", "name": "A", "age": 1, "condition": "x", "risk": "LOW"},
      {"id": "P1", "name": "B", "age": 2, "condition": "y", "risk": "LOW"}
    ]"#;
    assert!(Roster::from_json(raw).unwrap_err().is_fatal());
  }

  #[test]
  fn rejects_unsafe_ids() {
    assert!(PatientId::parse("../etc/passwd").is_err());
    assert!(PatientId::parse("").is_err());
    assert!(PatientId::parse("P-001_a").is_ok());
  }

  #[test]
  fn parses_plan_items() {
    let item = PlanItem::parse("Metoprolol 50mg - Twice daily");
    assert_eq!(item.name, "Metoprolol 50mg");
    assert_eq!(item.frequency, "Twice daily");
    assert_eq!(item.times_per_day(), 2);

    let bare = PlanItem::parse("AspirinNoFrequency");
    assert_eq!(bare.name, "AspirinNoFrequency");
    assert_eq!(bare.frequency, PlanItem::DEFAULT_FREQUENCY);
    assert_eq!(bare.times_per_day(), 1);

    let dashes = PlanItem::parse("Warfarin - - Multiple dashes");
    assert_eq!(dashes.name, "Warfarin");
    assert_eq!(dashes.frequency, "Multiple dashes");
  }

  #[test]
  fn searches_by_field_and_text() {
    let roster = Roster::from_json(SOURCE).unwrap();

    let high = roster.search(PatientField::Risk, "high");
    assert_eq!(high.len(), 1);
    assert_eq!(high[0].id.as_str(), "P001");
    assert_eq!(roster.search(PatientField::Age, "45")[0].id.as_str(), "P002");
    assert!(roster.search(PatientField::Name, "john doe").is_empty());
    assert_eq!("condition".parse::<PatientField>().unwrap(), PatientField::Condition);

    let ids = |found: Vec<&Patient>| found.iter().map(|p| p.id.to_string()).collect::<Vec<_>>();
    assert_eq!(ids(roster.search_text("METOPROLOL")), vec!["P001"]);
    assert_eq!(ids(roster.search_text("knee")), vec!["P002"]);
    assert_eq!(ids(roster.search_text("o")), vec!["P001", "P002"]);
    assert!(roster.search_text("   ").is_empty());
    assert!(roster.search_text("oncology").is_empty());
  }

  #[test]
  fn statistics_cover_ages_and_tiers() {
    let stats = Roster::from_json(SOURCE).unwrap().statistics();
    assert_eq!(stats.patients, 2);
    assert_eq!(stats.min_age, 45);
    assert_eq!(stats.max_age, 68);
    assert!((stats.average_age - 56.5).abs() < 1e-9);
    assert_eq!(stats.by_risk.get(&RiskTier::High), Some(&1));
    assert_eq!(stats.by_risk.get(&RiskTier::Low), Some(&1));

    assert_eq!(Roster::default().statistics(), RosterStatistics::default());
  }

  #[test]
  fn implausible_entries_are_flagged_but_kept() {
    let raw = r#"[
      {"id": "P1", "name": "  ", "age": 212, "condition": "Sepsis", "risk": "HIGH"},
      {"id": "P2", "name": "Ann", "age": 150, "condition": "Sepsis", "risk": "LOW"}
    ]"#;
    let roster = Roster::from_json(raw).unwrap();
    assert_eq!(roster.len(), 2);

    let problems = roster.problems();
    assert_eq!(problems.len(), 2);
    assert!(problems.iter().all(|(id, _)| id.as_str() == "P1"));
    assert!(problems.iter().any(|(_, p)| p == "missing name"));
    assert!(problems.iter().any(|(_, p)| p == "age 212 seems unusual"));
  }

  #[test]
  fn risk_tiers_are_ordered() {
    assert!(RiskTier::Low < RiskTier::Medium);
    assert!(RiskTier::Medium < RiskTier::High);
    assert_eq!(RiskTier::High.to_string(), "HIGH");
  }
}
