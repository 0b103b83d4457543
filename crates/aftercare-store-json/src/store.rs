//! [`JsonStore`]: the flat-file implementation of [`RecordStore`].

use std::path::{Path, PathBuf};

use aftercare_core::{
  patient::PatientId,
  record::{
    Alert, AlertResolution, DailyRecord, Interaction, PersistentRecord, RecordConflict,
    RiskAssessment,
  },
  store::RecordStore,
};
use chrono::{DateTime, Utc};
use tokio::{fs, io::AsyncWriteExt as _};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    decode_document, encode_document, file_name, patient_from_file_name, quarantine_file_name,
    temp_file_name,
  },
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A record store keeping one JSON document per patient under `root`.
///
/// Every append is read-modify-write of the whole document followed by an
/// atomic replace (temp file, fsync, rename), so a reader never observes a
/// half-written file. There is no locking: two concurrent appends for the
/// same patient race and the last rename wins. Callers process one patient
/// at a time.
///
/// Cloning is cheap; clones share the directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
  root: PathBuf,
}

impl JsonStore {
  /// Open (or create) a store rooted at `root`.
  pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
    let root = root.as_ref().to_owned();
    fs::create_dir_all(&root).await.map_err(Error::io(&root))?;
    tracing::debug!(root = %root.display(), "opened json store");
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path { &self.root }

  pub fn path_for(&self, patient: &PatientId) -> PathBuf { self.root.join(file_name(patient)) }

  /// Read a document. `None` if the file does not exist.
  async fn read(&self, patient: &PatientId) -> Result<Option<PersistentRecord>> {
    let path = self.path_for(patient);
    let bytes = match fs::read(&path).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(source) => return Err(Error::Io { path, source }),
    };
    let record = decode_document(&path, &bytes)?;
    if record.patient_id != *patient {
      return Err(Error::Misplaced { path, found: record.patient_id });
    }
    Ok(Some(record))
  }

  /// Durably replace `patient`'s document.
  async fn write(&self, patient: &PatientId, record: &PersistentRecord) -> Result<()> {
    let bytes = encode_document(record)?;
    let path = self.path_for(patient);
    let temp = self.root.join(temp_file_name(patient));

    let mut file = fs::File::create(&temp).await.map_err(Error::io(&temp))?;
    file.write_all(&bytes).await.map_err(Error::io(&temp))?;
    file.sync_all().await.map_err(Error::io(&temp))?;
    drop(file);

    if let Err(source) = fs::rename(&temp, &path).await {
      // Best effort; the rename error is the one worth reporting.
      let _ = fs::remove_file(&temp).await;
      return Err(Error::Io { path, source });
    }
    Ok(())
  }

  async fn load_or_create(&self, patient: &PatientId) -> Result<PersistentRecord> {
    if let Some(record) = self.read(patient).await? {
      return Ok(record);
    }
    let record = PersistentRecord::new(patient.clone(), Utc::now());
    self.write(patient, &record).await?;
    tracing::debug!(%patient, "created empty record");
    Ok(record)
  }

  /// Load, apply one append, write back.
  async fn modify<T, F>(&self, patient: &PatientId, f: F) -> Result<T>
  where
    F: FnOnce(&mut PersistentRecord) -> Result<T, RecordConflict> + Send,
    T: Send,
  {
    let mut record = self.load_or_create(patient).await?;
    let out = f(&mut record)?;
    self.write(patient, &record).await?;
    Ok(out)
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for JsonStore {
  type Error = Error;

  async fn load<'a>(&'a self, patient: &'a PatientId) -> Result<PersistentRecord> {
    self.load_or_create(patient).await
  }

  async fn append_daily(&self, record: DailyRecord) -> Result<()> {
    let patient = record.patient_id.clone();
    let (run_id, day) = (record.run_id, record.day);
    self.modify(&patient, move |r| r.push_daily(record)).await?;
    tracing::debug!(%patient, %run_id, day, "appended daily record");
    Ok(())
  }

  async fn append_alert(&self, alert: Alert) -> Result<()> {
    let patient = alert.patient_id.clone();
    let alert_id = alert.alert_id;
    self.modify(&patient, move |r| r.push_alert(alert)).await?;
    tracing::debug!(%patient, %alert_id, "appended alert");
    Ok(())
  }

  async fn append_interaction<'a>(
    &'a self,
    patient: &'a PatientId,
    interaction: Interaction,
  ) -> Result<()> {
    self.modify(patient, move |r| r.push_interaction(interaction)).await
  }

  async fn append_risk_assessment<'a>(
    &'a self,
    patient: &'a PatientId,
    assessment: RiskAssessment,
  ) -> Result<()> {
    self.modify(patient, move |r| r.push_risk_assessment(assessment)).await
  }

  async fn resolve_alert<'a>(
    &'a self,
    patient: &'a PatientId,
    alert_id: Uuid,
    note: Option<String>,
    at: DateTime<Utc>,
  ) -> Result<AlertResolution> {
    let resolution = AlertResolution {
      resolution_id: Uuid::new_v4(),
      alert_id,
      note,
      resolved_at: at,
    };
    let appended = resolution.clone();
    self.modify(patient, move |r| r.push_resolution(appended)).await?;
    tracing::info!(%patient, %alert_id, "resolved alert");
    Ok(resolution)
  }

  async fn list_patients(&self) -> Result<Vec<PatientId>> {
    let mut entries = fs::read_dir(&self.root).await.map_err(Error::io(&self.root))?;
    let mut patients = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(Error::io(&self.root))? {
      if let Some(patient) = entry.file_name().to_str().and_then(patient_from_file_name) {
        patients.push(patient);
      }
    }
    patients.sort();
    Ok(patients)
  }

  async fn quarantine<'a>(&'a self, patient: &'a PatientId) -> Result<bool> {
    let path = self.path_for(patient);
    let target = self.root.join(quarantine_file_name(patient, Utc::now()));
    match fs::rename(&path, &target).await {
      Ok(()) => {
        tracing::warn!(
          %patient,
          moved_to = %target.display(),
          "quarantined unreadable record"
        );
        Ok(true)
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
      Err(source) => Err(Error::Io { path, source }),
    }
  }
}
