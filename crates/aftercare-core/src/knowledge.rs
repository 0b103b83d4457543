//! Knowledge Lookup: static clinical guidance keyed by condition and task
//! category.
//!
//! The table is loaded once from a JSON document shaped as
//! `condition → category → guideline` and is read-only afterwards. A
//! `general` condition is mandatory; it answers every lookup the specific
//! conditions cannot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, task::Category};

pub const GENERAL: &str = "general";

/// Free-text condition keywords mapped to canonical table keys. Checked in
/// order, so "cardiac surgery" resolves to `cardiac`, not `orthopedic`.
const CONDITION_KEYWORDS: &[(&str, &[&str])] = &[
  ("cardiac", &["cardiac", "heart", "chf", "myocardial", "mi "]),
  ("diabetes", &["diabetes", "diabetic", "t2d", "type 2"]),
  ("orthopedic", &["orthopedic", "joint", "hip", "knee", "fracture", "surgery"]),
  ("respiratory", &["respiratory", "copd", "pneumonia", "asthma", "pulmonary"]),
];

/// One guideline entry as it appears in the knowledge document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guideline {
  #[serde(default)]
  pub importance:     String,
  #[serde(default)]
  pub adherence_tips: Vec<String>,
  #[serde(default)]
  pub red_flags:      Vec<String>,
  #[serde(default)]
  pub evidence:       Option<String>,
}

/// A resolved lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guidance {
  /// The table key that answered, e.g. `cardiac` or `general`.
  pub condition: String,
  pub category:  Category,
  /// `true` when the `general` entry stood in for a specific condition.
  pub fallback:  bool,
  pub guideline: Guideline,
}

impl Guidance {
  /// A one-line recommendation: why it matters, the top two tips, and the
  /// evidence citation, whichever are present.
  pub fn recommendation(&self) -> String {
    let g = &self.guideline;
    let mut parts = Vec::new();
    if !g.importance.is_empty() {
      parts.push(format!("Why it matters: {}", g.importance));
    }
    if !g.adherence_tips.is_empty() {
      let tips: Vec<&str> = g.adherence_tips.iter().take(2).map(String::as_str).collect();
      parts.push(format!("Try this: {}", tips.join("; ")));
    }
    if let Some(evidence) = g.evidence.as_deref().filter(|e| !e.is_empty()) {
      parts.push(format!("Evidence: {evidence}"));
    }
    if parts.is_empty() {
      format!("Please resume your {} routine as prescribed in your discharge plan.", self.category)
    } else {
      parts.join(" | ")
    }
  }
}

/// Map a document category key to a [`Category`]. Accepts the plural and
/// legacy spellings used by older documents.
pub fn parse_category(key: &str) -> Option<Category> {
  match key.trim().to_lowercase().as_str() {
    "medication" | "medications" => Some(Category::Medication),
    "therapy" | "exercise" => Some(Category::Therapy),
    "diet" => Some(Category::Diet),
    "vitals" | "vital_signs" => Some(Category::Vitals),
    _ => None,
  }
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
  conditions: BTreeMap<String, BTreeMap<Category, Guideline>>,
}

impl KnowledgeBase {
  /// Build from an already-parsed table. Fails if `general` is absent.
  pub fn new(raw: BTreeMap<String, BTreeMap<String, Guideline>>) -> Result<Self> {
    let mut conditions = BTreeMap::new();
    for (condition, categories) in raw {
      let condition = condition.trim().to_lowercase();
      let mut entries = BTreeMap::new();
      for (key, guideline) in categories {
        match parse_category(&key) {
          Some(category) => {
            entries.insert(category, guideline);
          }
          None => tracing::warn!(%condition, category = %key, "ignoring unknown guideline category"),
        }
      }
      conditions.insert(condition, entries);
    }

    if !conditions.contains_key(GENERAL) {
      return Err(Error::Configuration(format!(
        "knowledge document has no {GENERAL:?} fallback entry"
      )));
    }

    tracing::info!(conditions = conditions.len(), "loaded knowledge base");
    Ok(Self { conditions })
  }

  pub fn from_json(raw: &str) -> Result<Self> {
    let parsed: BTreeMap<String, BTreeMap<String, Guideline>> = serde_json::from_str(raw)
      .map_err(|e| Error::Configuration(format!("malformed knowledge document: {e}")))?;
    Self::new(parsed)
  }

  pub fn conditions(&self) -> impl Iterator<Item = &str> {
    self.conditions.keys().map(String::as_str)
  }

  /// The table key for a free-text condition: an exact key, then a keyword
  /// match, then `general`.
  pub fn resolve_condition(&self, condition: &str) -> &str {
    let lowered = condition.trim().to_lowercase();
    if let Some((key, _)) = self.conditions.get_key_value(&lowered) {
      return key;
    }
    // Pad so whole-word keywords like "mi " can match at the end.
    let padded = format!("{lowered} ");
    for (canonical, keywords) in CONDITION_KEYWORDS {
      if keywords.iter().any(|kw| padded.contains(kw))
        && let Some((key, _)) = self.conditions.get_key_value(*canonical)
      {
        return key;
      }
    }
    GENERAL
  }

  pub fn lookup(&self, condition: &str, category: Category) -> Result<Guidance> {
    let resolved = self.resolve_condition(condition);
    if let Some(guideline) = self.conditions.get(resolved).and_then(|c| c.get(&category)) {
      return Ok(Guidance {
        condition: resolved.to_owned(),
        category,
        fallback: resolved == GENERAL && !condition.trim().eq_ignore_ascii_case(GENERAL),
        guideline: guideline.clone(),
      });
    }

    self
      .conditions
      .get(GENERAL)
      .and_then(|c| c.get(&category))
      .map(|guideline| Guidance {
        condition: GENERAL.to_owned(),
        category,
        fallback: true,
        guideline: guideline.clone(),
      })
      .ok_or_else(|| Error::GuidanceNotFound {
        condition: condition.to_owned(),
        category:  category.to_string(),
      })
  }

  /// Red flags for each missed category that has any.
  pub fn red_flags(
    &self,
    condition: &str,
    missed: &[Category],
  ) -> Result<BTreeMap<Category, Vec<String>>> {
    let mut flags = BTreeMap::new();
    for category in missed {
      let guidance = self.lookup(condition, *category)?;
      if !guidance.guideline.red_flags.is_empty() {
        flags.insert(*category, guidance.guideline.red_flags);
      }
    }
    Ok(flags)
  }

  /// Evidence citations for every category of a condition key.
  pub fn evidence_summary(&self, condition: &str) -> BTreeMap<Category, String> {
    let resolved = self.resolve_condition(condition);
    self
      .conditions
      .get(resolved)
      .into_iter()
      .flatten()
      .filter_map(|(category, g)| g.evidence.clone().map(|e| (*category, e)))
      .collect()
  }
}
