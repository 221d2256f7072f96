//! gpuperf - statistical regression gate for repeatable GPU workloads
//!
//! This library turns raw per-iteration samples from an external workload
//! runner into descriptive statistics, persists them as versioned baselines,
//! and decides whether a new run is a genuine slowdown using either a fixed
//! threshold or a one-tailed Welch t-test.

pub mod cli;
pub mod config;
pub mod error;
pub mod measurement;
pub mod orchestrator;
pub mod regression;
pub mod report;
pub mod store;

pub use error::{ErrorKind, GateError};
