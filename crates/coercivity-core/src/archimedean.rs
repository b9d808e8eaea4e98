//! Archimedean residual bounds.
//!
//! Along the critical contour `z(xi) = 1/4 + i*xi/(4*pi)` the residual
//!
//! ```text
//! resid(xi) = Re psi(z) - log|z|
//! ```
//!
//! decays like `1/xi^2`. The estimator tabulates it on a symmetric grid and
//! reports the smallest constants that make
//!
//! ```text
//! -C_lower / (1 + xi^2) <= resid(xi) <= C_upper / (1 + xi^2)
//! ```
//!
//! hold at every sampled point. Nothing is claimed between grid points.

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::Serialize;

use crate::config::CertificationConfig;
use crate::error::{CertifyError, Result};
use crate::grid::Grid;
use crate::parallel::ordered_map;
use crate::special::{DigammaOptions, digamma};

/// `z(xi)` on the contour `Re z = 1/4`.
#[inline]
#[must_use]
pub fn contour_point(xi: f64) -> Complex64 {
    Complex64::new(0.25, xi / (4.0 * PI))
}

/// One row of `arch_bounds_scan.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArchimedeanRow {
    pub xi: f64,
    #[serde(rename = "Repsi")]
    pub re_psi: f64,
    pub log_mod_z: f64,
    pub resid: f64,
}

impl ArchimedeanRow {
    /// `resid * (1 + xi^2)`.
    #[must_use]
    pub fn scaled(&self) -> f64 {
        self.resid * (1.0 + self.xi * self.xi)
    }
}

/// Grid-certified constants plus the metadata needed to reproduce them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundConstants {
    pub xi_max: f64,
    pub xi_step: f64,
    pub grid_points: usize,
    #[serde(rename = "C_lower")]
    pub c_lower: f64,
    #[serde(rename = "C_upper")]
    pub c_upper: f64,
    /// First `xi` attaining `C_lower`; `None` when the constant is clamped
    /// to zero, since no sampled point then reaches the bound.
    pub argmax_lower_xi: Option<f64>,
    /// First `xi` attaining `C_upper`; `None` when clamped.
    pub argmax_upper_xi: Option<f64>,
    /// Stirling-series truncation target `2^-precision_bits` for `psi`.
    ///
    /// This is not the accuracy of `resid`: `Re psi - log|z|` cancels, so the
    /// residual carries roughly 1e-12 relative error at f64 working precision.
    pub precision_bits: u32,
}

impl BoundConstants {
    /// Both constants are clamped at zero, and a clamped constant has no
    /// argmax. `None` for an empty table.
    #[must_use]
    pub fn from_rows(
        rows: &[ArchimedeanRow],
        xi_max: f64,
        xi_step: f64,
        precision_bits: u32,
    ) -> Option<Self> {
        let first = rows.first()?;
        let mut lower = (-first.scaled(), first.xi);
        let mut upper = (first.scaled(), first.xi);
        for row in &rows[1..] {
            let s = row.scaled();
            if -s > lower.0 {
                lower = (-s, row.xi);
            }
            if s > upper.0 {
                upper = (s, row.xi);
            }
        }
        Some(Self {
            xi_max,
            xi_step,
            grid_points: rows.len(),
            c_lower: lower.0.max(0.0),
            c_upper: upper.0.max(0.0),
            argmax_lower_xi: (lower.0 >= 0.0).then_some(lower.1),
            argmax_upper_xi: (upper.0 >= 0.0).then_some(upper.1),
            precision_bits,
        })
    }

    /// `resid >= -C_lower / (1 + xi^2)`.
    #[must_use]
    pub fn lower_holds(&self, row: &ArchimedeanRow) -> bool {
        row.scaled() >= -self.c_lower
    }

    /// `resid <= C_upper / (1 + xi^2)`.
    #[must_use]
    pub fn upper_holds(&self, row: &ArchimedeanRow) -> bool {
        row.scaled() <= self.c_upper
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArchimedeanReport {
    pub rows: Vec<ArchimedeanRow>,
    pub constants: BoundConstants,
}

#[derive(Debug, Clone)]
pub struct ArchimedeanBoundEstimator {
    grid: Grid,
    xi_max: f64,
    xi_step: f64,
    opts: DigammaOptions,
    workers: usize,
}

impl ArchimedeanBoundEstimator {
    /// Grid `arange(-xi_max, xi_max + 1e-12, xi_step)`.
    ///
    /// `precision_bits` is checked when the digamma is evaluated, so an
    /// unsupported request surfaces as a numeric error from [`Self::run`].
    pub fn new(xi_max: f64, xi_step: f64, precision_bits: u32) -> Result<Self> {
        Ok(Self {
            grid: Grid::symmetric(xi_max, xi_step)?,
            xi_max,
            xi_step,
            opts: DigammaOptions::default().with_precision_bits(precision_bits),
            workers: 1,
        })
    }

    pub fn from_config(cfg: &CertificationConfig) -> Result<Self> {
        Self::new(cfg.arch_xi_max, cfg.arch_xi_step, cfg.arch_precision_bits)
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn residual_at(&self, xi: f64) -> Result<ArchimedeanRow> {
        let z = contour_point(xi);
        let re_psi = digamma(z, &self.opts)?.re;
        let log_mod_z = z.norm().ln();
        Ok(ArchimedeanRow {
            xi,
            re_psi,
            log_mod_z,
            resid: re_psi - log_mod_z,
        })
    }

    pub fn run(&self) -> Result<ArchimedeanReport> {
        let rows = ordered_map(self.grid.points(), self.workers, |&xi| self.residual_at(xi))?;
        let constants =
            BoundConstants::from_rows(&rows, self.xi_max, self.xi_step, self.opts.precision_bits)
                .ok_or_else(|| CertifyError::grid_mismatch("archimedean grid is empty"))?;
        Ok(ArchimedeanReport { rows, constants })
    }
}
