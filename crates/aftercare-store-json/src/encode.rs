//! File naming and document (de)serialisation.
//!
//! Documents are written as pretty-printed JSON with a trailing newline.
//! Timestamps inside them use the fixed-width form from
//! [`aftercare_core::timestamp`].

use std::path::Path;

use aftercare_core::{patient::PatientId, record::PersistentRecord, timestamp};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

const EXTENSION: &str = ".json";

// ─── File names ──────────────────────────────────────────────────────────────

pub fn file_name(patient: &PatientId) -> String { format!("{patient}{EXTENSION}") }

/// Scratch name for an in-flight write. Unique per call so concurrent
/// writers never share a temp file.
pub fn temp_file_name(patient: &PatientId) -> String {
  format!(".{patient}{EXTENSION}.{}.tmp", Uuid::new_v4().simple())
}

/// Where a corrupt document is moved. The timestamp keeps repeated
/// quarantines of the same patient apart.
pub fn quarantine_file_name(patient: &PatientId, at: DateTime<Utc>) -> String {
  let stamp = timestamp::encode(&at).replace([':', '.'], "-");
  format!("{patient}{EXTENSION}.corrupt-{stamp}")
}

/// The patient a directory entry belongs to, if it is a live document.
/// Temp files, quarantined files and foreign names are skipped.
pub fn patient_from_file_name(name: &str) -> Option<PatientId> {
  let stem = name.strip_suffix(EXTENSION)?;
  PatientId::parse(stem).ok()
}

// ─── Documents ───────────────────────────────────────────────────────────────

pub fn encode_document(record: &PersistentRecord) -> Result<Vec<u8>> {
  let mut bytes = serde_json::to_vec_pretty(record)?;
  bytes.push(b'\n');
  Ok(bytes)
}

pub fn decode_document(path: &Path, bytes: &[u8]) -> Result<PersistentRecord> {
  serde_json::from_slice(bytes).map_err(|source| Error::Corrupt {
    path: path.to_owned(),
    source,
  })
}
