//! Integration tests for `JsonStore` against a temporary directory.

use aftercare_core::{
  patient::{PatientId, RiskTier},
  record::{
    Alert, AlertStatus, DailyRecord, Interaction, InteractionKind, RecordConflict,
    RiskAssessment, Severity,
  },
  score::Grade,
  store::RecordStore,
  task::{Category, DayCompletion},
};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use crate::{Error, JsonStore};

async fn store() -> (TempDir, JsonStore) {
  let dir = tempfile::tempdir().expect("temp dir");
  let store = JsonStore::open(dir.path()).await.expect("open store");
  (dir, store)
}

fn pid(s: &str) -> PatientId { PatientId::parse(s).unwrap() }

fn ts(secs: i64, nanos: u32) -> DateTime<Utc> { Utc.timestamp_opt(secs, nanos).unwrap() }

fn daily(patient: &PatientId, run_id: Uuid, day: u32, score: f64) -> DailyRecord {
  DailyRecord {
    record_id: Uuid::new_v4(),
    run_id,
    patient_id: patient.clone(),
    day,
    completion: DayCompletion::default()
      .with(Category::Medication, vec![true, false])
      .with(Category::Diet, vec![true]),
    score,
    grade: Grade::C,
    risk: RiskTier::Medium,
    fallback_used: day % 2 == 0,
    recorded_at: ts(1_700_000_000 + i64::from(day), 123_456_789),
  }
}

fn alert(patient: &PatientId, run_id: Uuid) -> Alert {
  Alert {
    alert_id: Uuid::new_v4(),
    patient_id: patient.clone(),
    run_id,
    day: 1,
    severity: Severity::High,
    reason: "medication entirely missed".into(),
    raised_at: ts(1_700_000_100, 1),
  }
}

// ─── Lazy creation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn load_creates_and_persists_empty_document() {
  let (_dir, s) = store().await;
  let p = pid("P001");
  assert!(!s.path_for(&p).exists());

  let record = s.load(&p).await.unwrap();
  assert_eq!(record.patient_id, p);
  assert!(record.is_empty());
  assert!(s.path_for(&p).exists());

  // A second load returns the same document rather than a fresh one.
  let again = s.load(&p).await.unwrap();
  assert_eq!(again.created_at, record.created_at);
}

// ─── Appends ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn daily_records_round_trip_in_order() {
  let (_dir, s) = store().await;
  let p = pid("P001");
  let run = Uuid::new_v4();

  let written: Vec<DailyRecord> =
    (1..=5).map(|day| daily(&p, run, day, f64::from(day) * 10.0 + 0.25)).collect();
  for record in &written {
    s.append_daily(record.clone()).await.unwrap();
  }

  let loaded = s.load(&p).await.unwrap();
  assert_eq!(loaded.daily_records, written);
  assert_eq!(loaded.daily_records[2].recorded_at, ts(1_700_000_003, 123_456_789));
  assert_eq!(loaded.scores_for_run(run), vec![10.25, 20.25, 30.25, 40.25, 50.25]);
}

#[tokio::test]
async fn duplicate_day_in_same_run_is_rejected() {
  let (_dir, s) = store().await;
  let p = pid("P001");
  let run = Uuid::new_v4();

  s.append_daily(daily(&p, run, 1, 50.0)).await.unwrap();
  let err = s.append_daily(daily(&p, run, 1, 60.0)).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(RecordConflict::DuplicateDay { day: 1, .. })));

  let loaded = s.load(&p).await.unwrap();
  assert_eq!(loaded.daily_records.len(), 1);
  assert_eq!(loaded.daily_records[0].score, 50.0);
}

#[tokio::test]
async fn duplicate_alert_id_is_rejected() {
  let (_dir, s) = store().await;
  let p = pid("P001");
  let a = alert(&p, Uuid::new_v4());

  s.append_alert(a.clone()).await.unwrap();
  let err = s.append_alert(a).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(RecordConflict::DuplicateId { kind: "alert", .. })));
}

#[tokio::test]
async fn interactions_and_assessments_are_appended() {
  let (_dir, s) = store().await;
  let p = pid("P001");
  let run = Uuid::new_v4();

  s.append_interaction(&p, Interaction {
    interaction_id: Uuid::new_v4(),
    run_id: run,
    day: 1,
    kind: InteractionKind::Reminder,
    message: "Take your evening dose".into(),
    at: ts(1_700_000_000, 0),
  })
  .await
  .unwrap();
  s.append_risk_assessment(&p, RiskAssessment {
    assessment_id: Uuid::new_v4(),
    run_id: run,
    day: 1,
    tier: RiskTier::High,
    factors: vec!["low current score".into()],
    score: 33.3,
    declining: false,
    rationale: "HIGH risk".into(),
    fallback_used: true,
    assessed_at: ts(1_700_000_000, 5),
  })
  .await
  .unwrap();

  let loaded = s.load(&p).await.unwrap();
  assert_eq!(loaded.interactions.len(), 1);
  assert_eq!(loaded.interactions[0].kind, InteractionKind::Reminder);
  assert_eq!(loaded.latest_assessment(Some(run)).map(|a| a.tier), Some(RiskTier::High));
}

// ─── Alert lifecycle ─────────────────────────────────────────────────────────

#[tokio::test]
async fn alert_resolves_exactly_once() {
  let (_dir, s) = store().await;
  let p = pid("P001");
  let a = alert(&p, Uuid::new_v4());
  let id = a.alert_id;
  s.append_alert(a).await.unwrap();

  let at = ts(1_700_000_500, 42);
  let resolution = s.resolve_alert(&p, id, Some("called patient".into()), at).await.unwrap();
  assert_eq!(resolution.alert_id, id);

  let loaded = s.load(&p).await.unwrap();
  assert_eq!(
    loaded.alert_status(id),
    Some(AlertStatus::Resolved { note: Some("called patient".into()), at })
  );
  // The alert itself is untouched.
  assert_eq!(loaded.alerts.len(), 1);

  let err = s.resolve_alert(&p, id, None, at).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(RecordConflict::AlreadyResolved(x)) if x == id));
}

#[tokio::test]
async fn resolving_unknown_alert_fails() {
  let (_dir, s) = store().await;
  let p = pid("P001");
  let missing = Uuid::new_v4();
  let err = s.resolve_alert(&p, missing, None, Utc::now()).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(RecordConflict::AlertNotFound(x)) if x == missing));
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_patients_is_sorted_and_skips_foreign_files() {
  let (dir, s) = store().await;
  for id in ["P003", "P001", "P002"] {
    s.load(&pid(id)).await.unwrap();
  }
  std::fs::write(dir.path().join("README.txt"), "not a record").unwrap();

  let listed = s.list_patients().await.unwrap();
  assert_eq!(listed, vec![pid("P001"), pid("P002"), pid("P003")]);
}

// ─── Corruption ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn corrupt_document_errors_then_quarantines() {
  let (dir, s) = store().await;
  let p = pid("P001");
  std::fs::write(s.path_for(&p), "{ not json").unwrap();

  let err = s.load(&p).await.unwrap_err();
  assert!(err.is_corrupt());

  // Appends must not silently overwrite the unreadable file.
  let err = s.append_daily(daily(&p, Uuid::new_v4(), 1, 10.0)).await.unwrap_err();
  assert!(err.is_corrupt());

  assert!(s.quarantine(&p).await.unwrap());
  assert!(!s.path_for(&p).exists());
  let moved = std::fs::read_dir(dir.path())
    .unwrap()
    .filter_map(|e| e.ok())
    .any(|e| e.file_name().to_string_lossy().starts_with("P001.json.corrupt-"));
  assert!(moved);

  // The patient starts over with an empty history.
  assert!(s.load(&p).await.unwrap().is_empty());
  assert_eq!(s.list_patients().await.unwrap(), vec![p.clone()]);

  // Nothing left to move.
  assert!(!s.quarantine(&pid("P404")).await.unwrap());
}

#[tokio::test]
async fn misplaced_document_is_never_written_through() {
  let (_dir, s) = store().await;
  let (p1, p2) = (pid("P001"), pid("P002"));
  let run = Uuid::new_v4();
  s.append_daily(daily(&p2, run, 1, 40.0)).await.unwrap();
  s.append_daily(daily(&p2, run, 2, 45.0)).await.unwrap();

  // P001's file ends up holding P002's document.
  std::fs::copy(s.path_for(&p2), s.path_for(&p1)).unwrap();

  let err = s
    .append_interaction(&p1, Interaction {
      interaction_id: Uuid::new_v4(),
      run_id: run,
      day: 1,
      kind: InteractionKind::Routine,
      message: "P001 check-in".into(),
      at: ts(1_700_000_000, 0),
    })
    .await
    .unwrap_err();
  assert!(err.is_corrupt());
  assert!(matches!(&err, Error::Misplaced { found, .. } if *found == p2));
  assert!(s.load(&p1).await.unwrap_err().is_corrupt());

  let other = s.load(&p2).await.unwrap();
  assert_eq!(other.daily_records.len(), 2);
  assert!(other.interactions.is_empty());

  assert!(s.quarantine(&p1).await.unwrap());
  let fresh = s.load(&p1).await.unwrap();
  assert_eq!(fresh.patient_id, p1);
  assert!(fresh.is_empty());
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_appends_to_different_patients_do_not_interfere() {
  let (_dir, s) = store().await;
  let run = Uuid::new_v4();
  let ids = [pid("P001"), pid("P002"), pid("P003")];

  let append_days = |p: PatientId| {
    let s = s.clone();
    async move {
      for day in 1..=6 {
        s.append_daily(daily(&p, run, day, f64::from(day))).await.unwrap();
        s.append_alert(alert(&p, run)).await.unwrap();
      }
    }
  };
  tokio::join!(
    append_days(ids[0].clone()),
    append_days(ids[1].clone()),
    append_days(ids[2].clone()),
  );

  for p in &ids {
    let record = s.load(p).await.unwrap();
    assert_eq!(record.patient_id, *p);
    assert_eq!(record.scores_for_run(run), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    assert_eq!(record.alerts.len(), 6);
    assert!(record.alerts.iter().all(|a| a.patient_id == *p));
  }
  assert_eq!(s.list_patients().await.unwrap(), ids.to_vec());
}

// ─── Compatibility ───────────────────────────────────────────────────────────

#[tokio::test]
async fn older_documents_without_newer_fields_still_load() {
  let (_dir, s) = store().await;
  let p = pid("P001");
  let run = Uuid::new_v4();
  let old = format!(
    r#"{{
      "patient_id": "P001",
      "created_at": "2025-01-01T00:00:00.000000000Z",
      "daily_records": [{{
        "record_id": "{}",
        "run_id": "{run}",
        "patient_id": "P001",
        "day": 1,
        "completion": {{ "medication": [true] }},
        "score": 100.0,
        "grade": "A",
        "risk": "low",
        "recorded_at": "2025-01-01T09:00:00.000000000Z"
      }}]
    }}"#,
    Uuid::new_v4()
  );
  std::fs::write(s.path_for(&p), old).unwrap();

  let loaded = s.load(&p).await.unwrap();
  assert_eq!(loaded.daily_records.len(), 1);
  assert!(!loaded.daily_records[0].fallback_used);
  assert!(loaded.daily_records[0].completion.diet.is_empty());
  assert!(loaded.alerts.is_empty());
  assert!(loaded.alert_resolutions.is_empty());

  // New appends go on top of the old document.
  s.append_daily(daily(&p, run, 2, 80.0)).await.unwrap();
  assert_eq!(s.load(&p).await.unwrap().daily_records.len(), 2);
}

#[tokio::test]
async fn documents_are_pretty_printed_with_fixed_width_timestamps() {
  let (_dir, s) = store().await;
  let p = pid("P001");
  s.append_daily(daily(&p, Uuid::new_v4(), 1, 50.0)).await.unwrap();

  let raw = std::fs::read_to_string(s.path_for(&p)).unwrap();
  assert!(raw.ends_with('\n'));
  assert!(raw.contains("\"recorded_at\": \"2023-11-14T22:13:21.123456789Z\""));
}
