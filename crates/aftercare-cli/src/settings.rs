//! Runner settings: file locations, run defaults and the pipeline knobs.

use std::path::{Path, PathBuf};

use aftercare_core::config::MonitorConfig;
use aftercare_pipeline::{
  PipelineConfig,
  config::{ReasonerConfig, SimulationConfig},
};
use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// Patient roster document.
  pub patients:   PathBuf,
  /// Knowledge base document.
  pub knowledge:  PathBuf,
  /// Directory holding one `<patient-id>.json` per patient.
  pub store_dir:  PathBuf,
  pub days:       u32,
  pub seed:       u64,
  pub monitor:    MonitorConfig,
  pub reasoner:   ReasonerConfig,
  pub simulation: SimulationConfig,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      patients:   PathBuf::from("data/patients.json"),
      knowledge:  PathBuf::from("data/knowledge_base.json"),
      store_dir:  PathBuf::from("data/records"),
      days:       7,
      seed:       42,
      monitor:    MonitorConfig::default(),
      reasoner:   ReasonerConfig::default(),
      simulation: SimulationConfig::default(),
    }
  }
}

impl Settings {
  /// Layer the optional TOML file under `AFTERCARE_*` environment variables.
  /// Nested keys use a double underscore, e.g.
  /// `AFTERCARE_REASONER__TIMEOUT_MS=500`.
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("AFTERCARE")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let mut loaded: Self =
      settings.try_deserialize().context("failed to deserialise settings")?;
    loaded.patients = expand_tilde(&loaded.patients);
    loaded.knowledge = expand_tilde(&loaded.knowledge);
    loaded.store_dir = expand_tilde(&loaded.store_dir);
    Ok(loaded)
  }

  pub fn pipeline(&self) -> PipelineConfig {
    PipelineConfig {
      monitor:    self.monitor.clone(),
      reasoner:   self.reasoner.clone(),
      simulation: self.simulation,
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use aftercare_pipeline::config::ReasonerMode;

  use super::*;

  #[test]
  fn missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(settings.days, 7);
    assert_eq!(settings.store_dir, PathBuf::from("data/records"));
    assert_eq!(settings.pipeline(), PipelineConfig::default());
  }

  #[test]
  fn file_overrides_only_what_it_mentions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aftercare.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
      file,
      r#"
days = 3
store_dir = "/var/lib/aftercare"

[monitor.weights]
medication = 65
therapy = 25
diet = 5
vitals = 5

[reasoner]
mode = "remote"
endpoint = "http://localhost:9000/assess"
"#
    )
    .unwrap();

    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.days, 3);
    assert_eq!(settings.seed, 42);
    assert_eq!(settings.store_dir, PathBuf::from("/var/lib/aftercare"));
    assert_eq!(settings.monitor.weights.medication, 65);
    assert_eq!(settings.monitor.grades, MonitorConfig::default().grades);
    assert_eq!(settings.reasoner.mode, ReasonerMode::Remote);
    assert_eq!(settings.reasoner.timeout_ms, 2_000);
    settings.pipeline().validate().unwrap();
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/records")), PathBuf::from(home).join("records"));
    assert_eq!(expand_tilde(Path::new("records")), PathBuf::from("records"));
  }
}
