//! Reasoner implementations selectable at runtime.
//!
//! [`RemoteReasoner`] posts the [`ReasoningRequest`] as JSON to an HTTP
//! endpoint and expects a [`ReasoningOutcome`] back. Any failure is reported
//! as a [`CollaboratorError`]; the pipeline then falls back to the local
//! path.

use aftercare_core::{
  config::EscalationThresholds,
  reasoner::{CollaboratorError, LocalReasoner, Reasoner, ReasoningOutcome, ReasoningRequest},
};
use reqwest::Client;

use crate::{
  Result,
  config::{ReasonerConfig, ReasonerMode},
};

/// HTTP client for an external reasoning service.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct RemoteReasoner {
  client:   Client,
  endpoint: String,
}

impl RemoteReasoner {
  pub fn new(endpoint: impl Into<String>, config: &ReasonerConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.timeout()).build()?;
    Ok(Self { client, endpoint: endpoint.into() })
  }

  pub fn endpoint(&self) -> &str { &self.endpoint }
}

impl Reasoner for RemoteReasoner {
  fn name(&self) -> &str { "remote" }

  async fn assess<'a>(
    &'a self,
    request: &'a ReasoningRequest,
  ) -> Result<ReasoningOutcome, CollaboratorError> {
    let resp = self
      .client
      .post(&self.endpoint)
      .json(request)
      .send()
      .await
      .map_err(|e| CollaboratorError::Transport(e.to_string()))?;

    if !resp.status().is_success() {
      return Err(CollaboratorError::Transport(format!(
        "POST {} → {}",
        self.endpoint,
        resp.status()
      )));
    }

    let outcome: ReasoningOutcome = resp
      .json()
      .await
      .map_err(|e| CollaboratorError::Unparseable(e.to_string()))?;
    if outcome.rationale.trim().is_empty() {
      return Err(CollaboratorError::Unparseable("empty rationale".into()));
    }
    Ok(outcome)
  }
}

/// The reasoner chosen by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredReasoner {
  Local(LocalReasoner),
  Remote(RemoteReasoner),
}

impl ConfiguredReasoner {
  pub fn from_config(config: &ReasonerConfig, thresholds: EscalationThresholds) -> Result<Self> {
    config.validate()?;
    match (config.mode, config.endpoint.as_deref()) {
      (ReasonerMode::Remote, Some(endpoint)) => {
        tracing::info!(endpoint, timeout_ms = config.timeout_ms, "using remote reasoner");
        Ok(Self::Remote(RemoteReasoner::new(endpoint, config)?))
      }
      _ => Ok(Self::Local(LocalReasoner::new(thresholds))),
    }
  }
}

impl Reasoner for ConfiguredReasoner {
  fn name(&self) -> &str {
    match self {
      Self::Local(r) => r.name(),
      Self::Remote(r) => r.name(),
    }
  }

  async fn assess<'a>(
    &'a self,
    request: &'a ReasoningRequest,
  ) -> Result<ReasoningOutcome, CollaboratorError> {
    match self {
      Self::Local(r) => r.assess(request).await,
      Self::Remote(r) => r.assess(request).await,
    }
  }
}
