//! triage-core
//!
//! Shared domain types, the error taxonomy, capability traits and
//! configuration for the triage workspace. Every other crate builds on these.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
