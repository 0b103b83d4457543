//! `aftercare`: runs the post-discharge monitoring simulation and inspects
//! the stored patient records.
//!
//! # Usage
//!
//! ```
//! aftercare simulate --days 7 --seed 42 --output summary.json
//! aftercare replay data/completions.json --started-at 2026-03-01T09:00:00Z
//! aftercare report --run-id 6f1c…
//! aftercare alerts
//! aftercare resolve P001 6f1c… --note "called patient, doses resumed"
//! ```
//!
//! Settings come from `aftercare.toml` (or `--config`) layered under
//! `AFTERCARE_*` environment variables.

mod settings;

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use aftercare_core::{
  aggregate::{Aggregator, PopulationReport},
  knowledge::KnowledgeBase,
  patient::{PatientId, Roster},
  record::Alert,
  store::RecordStore,
  task::DayCompletion,
};
use aftercare_pipeline::{Pipeline, RunOptions, RunSummary, reasoner::ConfiguredReasoner};
use aftercare_store_json::JsonStore;
use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "aftercare", version, about = "Post-discharge patient monitoring")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "aftercare.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Simulate the roster for a number of days and record the outcomes.
  Simulate {
    /// Days to simulate per patient.
    #[arg(long)]
    days:    Option<u32>,
    /// Seed for the engagement simulator.
    #[arg(long)]
    seed:    Option<u64>,
    /// Reuse a run id instead of minting a new one.
    #[arg(long)]
    run_id:  Option<Uuid>,
    /// Timestamp of day 1 (RFC 3339). Defaults to now.
    #[arg(long)]
    started_at: Option<DateTime<Utc>>,
    /// Only these patients (repeatable). Defaults to the whole roster.
    #[arg(short, long = "patient", value_name = "ID")]
    patients: Vec<String>,
    /// Write the run summary JSON here.
    #[arg(short, long, value_name = "FILE")]
    output:  Option<PathBuf>,
  },

  /// Evaluate recorded task completions instead of simulating them.
  Replay {
    /// JSON object mapping patient ids to their days of task completions.
    input:      PathBuf,
    #[arg(long)]
    run_id:     Option<Uuid>,
    /// Timestamp of day 1 (RFC 3339). Defaults to now.
    #[arg(long)]
    started_at: Option<DateTime<Utc>>,
    /// Write the run summary JSON here.
    #[arg(short, long, value_name = "FILE")]
    output:     Option<PathBuf>,
  },

  /// Aggregate the stored records.
  Report {
    /// Only count records from this run.
    #[arg(long)]
    run_id: Option<Uuid>,
    /// Print the report as JSON.
    #[arg(long)]
    json:   bool,
  },

  /// List alerts still waiting for a clinician.
  Alerts {
    /// Only this patient.
    #[arg(short, long, value_name = "ID")]
    patient: Option<String>,
  },

  /// Mark an alert as handled.
  Resolve {
    patient: String,
    alert:   Uuid,
    #[arg(long)]
    note:    Option<String>,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let store = JsonStore::open(&settings.store_dir)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_dir))?;

  match cli.command {
    Command::Simulate { days, seed, run_id, started_at, patients, output } => {
      let mut options = RunOptions::new(seed.unwrap_or(settings.seed), days.unwrap_or(settings.days));
      if let Some(run_id) = run_id {
        options.run_id = run_id;
      }
      if let Some(started_at) = started_at {
        options.started_at = started_at;
      }
      let ids = patients.into_iter().map(PatientId::parse).collect::<Result<Vec<_>, _>>()?;
      let mut pipeline = build_pipeline(&settings, store)?;
      let summary = if ids.is_empty() {
        pipeline.run(&options).await?
      } else {
        pipeline.run_patients(&ids, &options).await?
      };
      finish(&summary, output.as_deref())
    }
    Command::Replay { input, run_id, started_at, output } => {
      let completions = read_completions(&input)?;
      let mut pipeline = build_pipeline(&settings, store)?;
      let summary = pipeline
        .replay(
          &completions,
          run_id.unwrap_or_else(Uuid::new_v4),
          started_at.unwrap_or_else(Utc::now),
        )
        .await?;
      finish(&summary, output.as_deref())
    }
    Command::Report { run_id, json } => report(&settings, &store, run_id, json).await,
    Command::Alerts { patient } => {
      let patient = patient.map(PatientId::parse).transpose()?;
      for alert in pending_alerts(&store, patient.as_ref()).await? {
        println!(
          "{}  {}  day {:<3} {:<6} {}",
          alert.alert_id, alert.patient_id, alert.day, alert.severity, alert.reason
        );
      }
      Ok(())
    }
    Command::Resolve { patient, alert, note } => {
      let patient = stored_patient(&store, &patient).await?;
      let resolution = store
        .resolve_alert(&patient, alert, note, Utc::now())
        .await
        .with_context(|| format!("failed to resolve alert {alert} for {patient}"))?;
      println!("resolved {} at {}", resolution.alert_id, resolution.resolved_at.to_rfc3339());
      Ok(())
    }
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

fn build_pipeline(
  settings: &Settings,
  store: JsonStore,
) -> anyhow::Result<Pipeline<JsonStore, ConfiguredReasoner>> {
  let roster = read_roster(&settings.patients)?;
  let knowledge = read_knowledge(&settings.knowledge)?;
  let config = settings.pipeline();
  let reasoner = ConfiguredReasoner::from_config(&config.reasoner, config.monitor.thresholds)
    .context("failed to build reasoner")?;

  Pipeline::new(config, roster, knowledge, store, reasoner).context("invalid configuration")
}

fn finish(summary: &RunSummary, output: Option<&Path>) -> anyhow::Result<()> {
  if let Some(path) = output {
    std::fs::write(path, summary.to_json_pretty()?)
      .with_context(|| format!("writing summary to {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote run summary");
  }
  print_summary(summary);
  Ok(())
}

async fn report(
  settings: &Settings,
  store: &JsonStore,
  run_id: Option<Uuid>,
  json: bool,
) -> anyhow::Result<()> {
  let mut records = Vec::new();
  for id in store.list_patients().await? {
    match store.load(&id).await {
      Ok(record) => records.push(record),
      Err(e) => tracing::warn!(patient = %id, error = %e, "skipping unreadable record"),
    }
  }

  let aggregator = Aggregator::new(settings.monitor.thresholds, settings.monitor.impact);
  let mut report = aggregator.summarize(&records, run_id);
  match read_roster(&settings.patients) {
    Ok(roster) => report.roster = Some(roster.statistics()),
    Err(e) => tracing::warn!(error = %e, "roster unavailable; reporting without it"),
  }
  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print_report(&report);
  }
  Ok(())
}

/// Pending alerts for one stored patient, or for every stored patient.
/// Unreadable records are skipped and nothing is created for unknown ids.
async fn pending_alerts(
  store: &JsonStore,
  patient: Option<&PatientId>,
) -> anyhow::Result<Vec<Alert>> {
  let stored = store.list_patients().await?;
  let ids = match patient {
    Some(id) if stored.contains(id) => vec![id.clone()],
    Some(id) => {
      tracing::info!(patient = %id, "no stored record");
      Vec::new()
    }
    None => stored,
  };

  let mut pending = Vec::new();
  for id in ids {
    match store.load(&id).await {
      Ok(record) => pending.extend(record.pending_alerts().cloned()),
      Err(e) => tracing::warn!(patient = %id, error = %e, "skipping unreadable record"),
    }
  }
  Ok(pending)
}

/// Parse `raw` and require a stored record for it.
async fn stored_patient(store: &JsonStore, raw: &str) -> anyhow::Result<PatientId> {
  let id = PatientId::parse(raw)?;
  if !store.list_patients().await?.contains(&id) {
    anyhow::bail!("no stored record for patient {id}");
  }
  Ok(id)
}

// ─── Input documents ──────────────────────────────────────────────────────────

fn read_roster(path: &Path) -> anyhow::Result<Roster> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading patient roster {}", path.display()))?;
  Roster::from_json(&raw).with_context(|| format!("parsing patient roster {}", path.display()))
}

fn read_completions(path: &Path) -> anyhow::Result<BTreeMap<PatientId, Vec<DayCompletion>>> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading completions {}", path.display()))?;
  serde_json::from_str(&raw).with_context(|| format!("parsing completions {}", path.display()))
}

fn read_knowledge(path: &Path) -> anyhow::Result<KnowledgeBase> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading knowledge base {}", path.display()))?;
  KnowledgeBase::from_json(&raw)
    .with_context(|| format!("parsing knowledge base {}", path.display()))
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn print_summary(summary: &RunSummary) {
  println!("run {}  seed {}  days {}", summary.run_id, summary.seed, summary.days);
  for patient in &summary.patients {
    let scores: Vec<String> = patient.scores().iter().map(|s| format!("{s:.0}")).collect();
    println!(
      "  {:<6} {:<20} {:<6} scores [{}]  escalations {}  reminders {}",
      patient.patient_id,
      patient.name,
      patient.baseline_risk,
      scores.join(" "),
      patient.escalations(),
      patient.reminders_sent,
    );
  }
  print_report(&summary.report);
  for warning in &summary.warnings {
    println!("  warning [{}] {}: {}", warning.kind, warning.patient_id, warning.message);
  }
  println!("fingerprint {}", summary.fingerprint);
}

fn print_report(report: &PopulationReport) {
  println!(
    "{} patients, {} patient-days, average adherence {:.1}",
    report.patients, report.patient_days, report.average_score
  );
  for (severity, count) in &report.escalations_by_severity {
    println!("  {severity} escalations: {count}");
  }
  println!("  alerts pending {}, resolved {}", report.pending_alerts, report.resolved_alerts);
  let impact = &report.impact;
  println!(
    "  readmissions prevented {:.1}, net savings ${:.0}, ROI {:.2}x",
    impact.readmissions_prevented, impact.net_savings, impact.roi
  );
  if let Some(roster) = &report.roster {
    println!(
      "  roster {} patients, ages {}-{} (mean {:.1})",
      roster.patients, roster.min_age, roster.max_age, roster.average_age
    );
  }
}
