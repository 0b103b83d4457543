//! The Monitor → Analyze → Escalate agent pipeline.
//!
//! A [`Pipeline`] owns the engines from `aftercare-core`, a session store, a
//! [`RecordStore`](aftercare_core::store::RecordStore) backend and a
//! [`Reasoner`](aftercare_core::reasoner::Reasoner). Running it simulates a
//! number of days for each patient on the roster and returns a
//! [`RunSummary`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
#![allow(async_fn_in_trait)]

mod agents;

pub mod config;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod reasoner;
pub mod simulate;
pub mod summary;
pub mod warning;

pub use agents::Analysis;
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use pipeline::{DayContext, Pipeline, RunOptions};
pub use summary::RunSummary;
