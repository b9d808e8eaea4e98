//! # coercivity-core
//!
//! Grid-based numeric certification of a spectral coercivity inequality.
//!
//! Every quantity is a uniform-grid rectangle-rule approximation: a kernel
//! profile `Khat(xi)` is tabulated, quadratic forms
//! `Q = (1/2pi) * sum Khat |A|^2 dxi` are evaluated against test packets, and
//! the scans built on top of them report pass/fail verdicts and constants
//! certified at the sampled points only.
//!
//! - [`kernel`]: kernel profile construction and the [`KernelSource`] seam.
//! - [`quadratic`]: test packets and the quadratic-form evaluator.
//! - [`verifier`]: randomized inequality check with exact and tolerant verdicts.
//! - [`resonant`]: closed-form flipping amplitudes and the full resonant scan.
//! - [`archimedean`]: digamma residual bounds on the critical contour.
//!
//! All computations are pure functions of the grid and parameters. No `unsafe`
//! code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod archimedean;
pub mod config;
pub mod error;
pub mod grid;
pub mod kernel;
pub mod parallel;
pub mod quadratic;
pub mod resonant;
pub mod special;
pub mod verifier;

pub use archimedean::{ArchimedeanBoundEstimator, ArchimedeanReport, BoundConstants};
pub use config::CertificationConfig;
pub use error::{CertifyError, Result};
pub use grid::{Grid, GridShape};
pub use kernel::{KernelParams, KernelProfile, KernelSource};
pub use quadratic::{QuadraticFormEvaluator, TestPacket};
pub use resonant::{ResonantPlan, ResonantReport, ResonantScanner};
pub use verifier::{InequalityVerifier, SamplingPlan, VerificationReport};
