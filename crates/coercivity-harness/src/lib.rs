//! Artifact-producing harness for the coercivity certification engine.
//!
//! This crate provides:
//! - Stage orchestration with structured JSONL logs
//! - CSV tables and JSON summaries with stable names and columns
//! - Kernel tables as an injectable kernel source
//! - SHA-256 artifact index and an append-only hash manifest

#![forbid(unsafe_code)]

pub mod artifacts;
pub mod error;
pub mod integrity;
pub mod runner;
pub mod structured_log;

pub use error::HarnessError;
pub use runner::{CertificationRunner, RunReport, Stage};
