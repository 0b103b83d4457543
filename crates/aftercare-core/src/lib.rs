//! Core types, engines and trait definitions for Aftercare post-discharge
//! monitoring.
//!
//! This crate is deliberately free of file-system, network and runtime
//! dependencies. Every engine here is a pure function or an explicitly
//! constructed value; storage backends (`aftercare-store-json`) and the
//! agent pipeline (`aftercare-pipeline`) depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod config;
pub mod decision;
pub mod error;
pub mod knowledge;
pub mod patient;
pub mod reasoner;
pub mod record;
pub mod risk;
pub mod score;
pub mod session;
pub mod store;
pub mod task;
pub mod timestamp;

pub use error::{Error, Result};
