//! Resonant-threshold search.
//!
//! A hypothetical spectral defect at `±2γ` is modelled as a negative Gaussian
//! bump added to the kernel,
//!
//! ```text
//! Z(xi; γ, amp, σz) = -amp * [G(xi; 2γ, σz) + G(xi; -2γ, σz)]
//! ```
//!
//! and probed with the resonant packet
//!
//! ```text
//! A(xi; γ, R) = G(xi; 2γ, 1/R) + G(xi; -2γ, 1/R)
//! ```
//!
//! `Q` is linear in the kernel and `Z` is linear in `amp`, so
//! `Q(K + amp*Z1, A) = Q0 + amp*Qb` holds exactly, with `Q0 = Q(K, A)` and
//! `Qb = Q(K + Z1, A) - Q0`. The flipping amplitude is therefore solved in
//! closed form from a single unit probe: `amp* = Q0 / (-Qb)` for `Qb < 0`,
//! and `+inf` otherwise (no amplitude can flip the sign).
//!
//! A negative `amp*` means the baseline `Q0` is already negative.

use serde::Serialize;

use crate::config::CertificationConfig;
use crate::error::{CertifyError, Result};
use crate::grid::Grid;
use crate::kernel::KernelProfile;
use crate::parallel::ordered_map;
use crate::quadratic::{QuadraticFormEvaluator, TestPacket, gaussian};

/// Lower clamp on `R` before taking `1/R`.
pub const MIN_RESONANCE_R: f64 = 1e-6;

/// Lobe pair `G(xi; 2γ, s) + G(xi; -2γ, s)`.
#[inline]
fn lobes(xi: f64, gamma: f64, s: f64) -> f64 {
    gaussian(xi, 2.0 * gamma, s) + gaussian(xi, -2.0 * gamma, s)
}

/// The resonant packet, narrowing as `R` grows.
#[must_use]
pub fn resonant_packet(grid: &Grid, gamma: f64, r: f64) -> TestPacket {
    let sigma_a = 1.0 / r.max(MIN_RESONANCE_R);
    TestPacket::real(grid, |xi| lobes(xi, gamma, sigma_a))
}

/// The kernel defect at amplitude `amp`.
#[must_use]
pub fn bump(grid: &Grid, gamma: f64, amp: f64, sigma_z: f64) -> KernelProfile {
    KernelProfile::tabulate(grid, |xi| -amp * lobes(xi, gamma, sigma_z))
}

/// Scan axes and the defect width.
#[derive(Debug, Clone, PartialEq)]
pub struct ResonantPlan {
    pub gammas: Vec<f64>,
    pub rs: Vec<f64>,
    pub sigma_z: f64,
    pub amps: Vec<f64>,
}

impl ResonantPlan {
    pub fn new(gammas: Vec<f64>, rs: Vec<f64>, sigma_z: f64, amps: Vec<f64>) -> Result<Self> {
        for (field, list) in [("res_gammas", &gammas), ("res_Rs", &rs), ("res_amp_list", &amps)] {
            if list.is_empty() {
                return Err(CertifyError::configuration(field, "[]", "must not be empty"));
            }
            if let Some(bad) = list.iter().find(|v| !v.is_finite()) {
                return Err(CertifyError::configuration(field, bad, "entries must be finite"));
            }
        }
        if !(sigma_z.is_finite() && sigma_z > 0.0) {
            return Err(CertifyError::configuration(
                "res_sigma_z",
                sigma_z,
                "must be finite and > 0",
            ));
        }
        Ok(Self {
            gammas,
            rs,
            sigma_z,
            amps,
        })
    }

    pub fn from_config(cfg: &CertificationConfig) -> Result<Self> {
        Self::new(
            cfg.res_gammas.clone(),
            cfg.res_rs.clone(),
            cfg.res_sigma_z,
            cfg.res_amp_list.clone(),
        )
    }

    /// `(γ, R)` cells, γ outermost.
    fn cells(&self) -> Vec<(f64, f64)> {
        self.gammas
            .iter()
            .flat_map(|&g| self.rs.iter().map(move |&r| (g, r)))
            .collect()
    }
}

/// One row of `resonant_amp_threshold.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdRow {
    pub gamma: f64,
    #[serde(rename = "R")]
    pub r: f64,
    #[serde(rename = "Q0")]
    pub q0: f64,
    #[serde(rename = "Qb_unit")]
    pub qb_unit: f64,
    pub amp_threshold: f64,
}

impl ThresholdRow {
    #[must_use]
    pub fn is_flippable(&self) -> bool {
        self.amp_threshold.is_finite()
    }
}

/// One row of `resonant_Q_scan.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanRow {
    pub gamma: f64,
    #[serde(rename = "R")]
    pub r: f64,
    pub amp: f64,
    #[serde(rename = "Q")]
    pub q: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanLocation {
    pub gamma: f64,
    #[serde(rename = "R")]
    pub r: f64,
    pub amp: f64,
}

/// Headline result: the smallest `Q` seen anywhere in the scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResonantSummary {
    #[serde(rename = "min_Q")]
    pub min_q: f64,
    pub at: ScanLocation,
    pub sigma_z: f64,
}

impl ResonantSummary {
    /// First minimum in scan order; `None` for an empty scan.
    #[must_use]
    pub fn from_scan(rows: &[ScanRow], sigma_z: f64) -> Option<Self> {
        let first = rows.first()?;
        let best = rows
            .iter()
            .skip(1)
            .fold(first, |best, row| if row.q < best.q { row } else { best });
        Some(Self {
            min_q: best.q,
            at: ScanLocation {
                gamma: best.gamma,
                r: best.r,
                amp: best.amp,
            },
            sigma_z,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResonantReport {
    pub thresholds: Vec<ThresholdRow>,
    pub scan: Vec<ScanRow>,
    pub summary: ResonantSummary,
}

/// Computes thresholds and the full `γ × R × amp` scan against one kernel.
#[derive(Debug, Clone)]
pub struct ResonantScanner<'a> {
    kernel: &'a KernelProfile,
    plan: ResonantPlan,
    eval: QuadraticFormEvaluator,
    workers: usize,
}

impl<'a> ResonantScanner<'a> {
    #[must_use]
    pub fn new(kernel: &'a KernelProfile, plan: ResonantPlan) -> Self {
        Self {
            kernel,
            eval: QuadraticFormEvaluator::for_kernel(kernel),
            plan,
            workers: 1,
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Closed-form flipping amplitude for one `(γ, R)`.
    pub fn threshold(&self, gamma: f64, r: f64) -> Result<ThresholdRow> {
        let grid = self.kernel.grid();
        let packet = resonant_packet(grid, gamma, r);
        let q0 = self.eval.evaluate(self.kernel, &packet)?;
        let probed = self
            .kernel
            .perturbed(&bump(grid, gamma, 1.0, self.plan.sigma_z))?;
        let qb_unit = self.eval.evaluate(&probed, &packet)? - q0;
        let amp_threshold = if qb_unit < 0.0 {
            q0 / -qb_unit
        } else {
            f64::INFINITY
        };
        Ok(ThresholdRow {
            gamma,
            r,
            q0,
            qb_unit,
            amp_threshold,
        })
    }

    /// `Q(Khat + Z(amp), A)` evaluated directly on the perturbed kernel.
    pub fn quadratic_form_at(&self, gamma: f64, r: f64, amp: f64) -> Result<f64> {
        let grid = self.kernel.grid();
        let packet = resonant_packet(grid, gamma, r);
        let effective = self
            .kernel
            .perturbed(&bump(grid, gamma, amp, self.plan.sigma_z))?;
        self.eval.evaluate(&effective, &packet)
    }

    pub fn run(&self) -> Result<ResonantReport> {
        let cells = self.plan.cells();
        let per_cell = ordered_map(&cells, self.workers, |&(gamma, r)| {
            let threshold = self.threshold(gamma, r)?;
            let rows = self
                .plan
                .amps
                .iter()
                .map(|&amp| {
                    Ok(ScanRow {
                        gamma,
                        r,
                        amp,
                        q: self.quadratic_form_at(gamma, r, amp)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok::<_, CertifyError>((threshold, rows))
        })?;

        let mut thresholds = Vec::with_capacity(per_cell.len());
        let mut scan = Vec::with_capacity(per_cell.len() * self.plan.amps.len());
        for (threshold, rows) in per_cell {
            thresholds.push(threshold);
            scan.extend(rows);
        }
        let summary = ResonantSummary::from_scan(&scan, self.plan.sigma_z).ok_or_else(|| {
            CertifyError::configuration("res_amp_list", "[]", "scan produced no rows")
        })?;
        Ok(ResonantReport {
            thresholds,
            scan,
            summary,
        })
    }
}
