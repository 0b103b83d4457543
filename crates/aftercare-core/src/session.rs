//! Session Store: short-lived, per-patient scratch memory.
//!
//! Sessions live only as long as the [`SessionStore`] value that owns them;
//! nothing here touches disk. Turn history is bounded: once a session holds
//! more than `max_turns` turns, the oldest are dropped. Context variables are
//! kept separately and survive compaction.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{config::SessionConfig, patient::PatientId};

/// One recorded interaction turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
  pub key:      String,
  pub value:    Value,
  #[serde(with = "crate::timestamp")]
  pub at:       DateTime<Utc>,
  #[serde(default)]
  pub metadata: BTreeMap<String, String>,
}

impl Turn {
  pub fn new(key: impl Into<String>, value: Value, at: DateTime<Utc>) -> Self {
    Self { key: key.into(), value, at, metadata: BTreeMap::new() }
  }

  pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.metadata.insert(key.into(), value.into());
    self
  }
}

/// A single patient's session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
  turns:     VecDeque<Turn>,
  context:   BTreeMap<String, Value>,
  compacted: usize,
}

impl SessionState {
  /// Turns, oldest first.
  pub fn turns(&self) -> impl Iterator<Item = &Turn> { self.turns.iter() }

  pub fn turn_count(&self) -> usize { self.turns.len() }

  /// The `n` most recent turns, oldest first.
  pub fn recent(&self, n: usize) -> impl Iterator<Item = &Turn> {
    self.turns.iter().skip(self.turns.len().saturating_sub(n))
  }

  /// Total turns dropped by compaction since the session was created.
  pub fn compacted(&self) -> usize { self.compacted }

  pub fn context(&self, key: &str) -> Option<&Value> { self.context.get(key) }

  pub fn is_empty(&self) -> bool { self.turns.is_empty() && self.context.is_empty() }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
  max_turns: usize,
  sessions:  HashMap<PatientId, SessionState>,
}

impl SessionStore {
  /// A store that keeps at most `max_turns` turns per patient (minimum 1).
  pub fn new(max_turns: usize) -> Self {
    Self { max_turns: max_turns.max(1), sessions: HashMap::new() }
  }

  pub fn from_config(config: &SessionConfig) -> Self { Self::new(config.max_turns) }

  pub fn max_turns(&self) -> usize { self.max_turns }

  pub fn get_or_create(&mut self, patient: &PatientId) -> &mut SessionState {
    self.sessions.entry(patient.clone()).or_default()
  }

  pub fn get(&self, patient: &PatientId) -> Option<&SessionState> {
    self.sessions.get(patient)
  }

  /// Append a turn, compacting if needed. Returns how many turns were
  /// dropped.
  pub fn append_turn(&mut self, patient: &PatientId, turn: Turn) -> usize {
    let max = self.max_turns;
    let session = self.get_or_create(patient);
    session.turns.push_back(turn);

    let excess = session.turns.len().saturating_sub(max);
    if excess > 0 {
      session.turns.drain(..excess);
      session.compacted += excess;
      tracing::debug!(%patient, dropped = excess, "compacted session turns");
    }
    excess
  }

  pub fn set_context(&mut self, patient: &PatientId, key: impl Into<String>, value: Value) {
    self.get_or_create(patient).context.insert(key.into(), value);
  }

  pub fn get_context(&self, patient: &PatientId, key: &str) -> Option<&Value> {
    self.sessions.get(patient).and_then(|s| s.context(key))
  }

  /// Reset one patient's session to empty.
  pub fn clear(&mut self, patient: &PatientId) {
    self.sessions.remove(patient);
  }

  pub fn clear_all(&mut self) { self.sessions.clear(); }

  /// Number of patients with a live session.
  pub fn len(&self) -> usize { self.sessions.len() }

  pub fn is_empty(&self) -> bool { self.sessions.is_empty() }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  fn pid(s: &str) -> PatientId { PatientId::parse(s).unwrap() }

  fn turn(i: i64) -> Turn {
    Turn::new(format!("turn-{i}"), json!(i), Utc.timestamp_opt(i, 0).unwrap())
  }

  #[test]
  fn get_or_create_starts_empty() {
    let mut store = SessionStore::new(5);
    let session = store.get_or_create(&pid("P1"));
    assert!(session.is_empty());
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn compaction_keeps_most_recent_turns() {
    let mut store = SessionStore::new(3);
    let p = pid("P1");
    let mut dropped = 0;
    for i in 0..5 {
      dropped += store.append_turn(&p, turn(i));
    }
    assert_eq!(dropped, 2);

    let session = store.get(&p).unwrap();
    assert_eq!(session.turn_count(), 3);
    assert_eq!(session.compacted(), 2);
    let keys: Vec<&str> = session.turns().map(|t| t.key.as_str()).collect();
    assert_eq!(keys, vec!["turn-2", "turn-3", "turn-4"]);
  }

  #[test]
  fn context_survives_compaction() {
    let mut store = SessionStore::new(1);
    let p = pid("P1");
    store.set_context(&p, "last_score", json!(72.5));
    store.append_turn(&p, turn(1));
    store.append_turn(&p, turn(2));
    assert_eq!(store.get_context(&p, "last_score"), Some(&json!(72.5)));
    assert_eq!(store.get(&p).unwrap().turn_count(), 1);
  }

  #[test]
  fn sessions_are_isolated_by_patient() {
    let mut store = SessionStore::new(10);
    store.append_turn(&pid("P1"), turn(1));
    store.set_context(&pid("P2"), "k", json!("v"));
    assert_eq!(store.get(&pid("P1")).unwrap().turn_count(), 1);
    assert_eq!(store.get(&pid("P2")).unwrap().turn_count(), 0);
    assert!(store.get_context(&pid("P1"), "k").is_none());
  }

  #[test]
  fn clear_resets_one_and_clear_all_resets_every_session() {
    let mut store = SessionStore::new(10);
    store.append_turn(&pid("P1"), turn(1));
    store.append_turn(&pid("P2"), turn(2));

    store.clear(&pid("P1"));
    assert!(store.get(&pid("P1")).is_none());
    assert!(store.get(&pid("P2")).is_some());

    store.clear_all();
    assert!(store.is_empty());
  }

  #[test]
  fn recent_returns_tail_in_order() {
    let mut store = SessionStore::new(10);
    let p = pid("P1");
    for i in 0..4 {
      store.append_turn(&p, turn(i).with_metadata("agent", "monitor"));
    }
    let recent: Vec<_> = store.get(&p).unwrap().recent(2).map(|t| t.value.clone()).collect();
    assert_eq!(recent, vec![json!(2), json!(3)]);
  }
}
