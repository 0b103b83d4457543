//! Flat-file backend for the Aftercare record store.
//!
//! Each patient's [`PersistentRecord`](aftercare_core::record::PersistentRecord)
//! lives in its own pretty-printed JSON document, `<patient-id>.json`, under a
//! single directory. All file access goes through [`tokio::fs`] so the store
//! never blocks the async runtime.

mod encode;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::JsonStore;

#[cfg(test)]
mod tests;
