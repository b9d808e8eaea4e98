//! Kernel profile construction.
//!
//! ```text
//! Khat(xi) = Lstar + c0 * xi^2 / (xi^2 + Xi0^2)
//! ```
//!
//! `Khat(0) = Lstar` exactly and `Khat(xi) -> Lstar + c0` as `|xi|` grows,
//! with `|Khat(xi) - (Lstar + c0)| = |c0| * Xi0^2 / (xi^2 + Xi0^2)`.

use crate::error::{CertifyError, Result};
use crate::grid::{Grid, GridShape};

/// The three scalars that parametrize a kernel profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    pub xi0: f64,
    pub c0: f64,
    pub lstar: f64,
}

impl KernelParams {
    pub fn new(xi0: f64, c0: f64, lstar: f64) -> Result<Self> {
        if !xi0.is_finite() || xi0 <= 0.0 {
            return Err(CertifyError::configuration("Xi0", xi0, "must be finite and > 0"));
        }
        if !c0.is_finite() {
            return Err(CertifyError::configuration("c0", c0, "must be finite"));
        }
        if !lstar.is_finite() {
            return Err(CertifyError::configuration("Lstar", lstar, "must be finite"));
        }
        Ok(Self { xi0, c0, lstar })
    }

    /// Weight `xi^2 / (xi^2 + Xi0^2)` used both by the kernel and the weighted norm.
    #[inline]
    #[must_use]
    pub fn gradient_weight(&self, xi: f64) -> f64 {
        let xi2 = xi * xi;
        xi2 / (xi2 + self.xi0 * self.xi0)
    }

    #[inline]
    #[must_use]
    pub fn value(&self, xi: f64) -> f64 {
        self.lstar + self.c0 * self.gradient_weight(xi)
    }

    /// `kappa_bar = c0 / (2 pi)`, the constant the verifier compares against.
    #[must_use]
    pub fn kappa_bar(&self) -> f64 {
        self.c0 / (2.0 * std::f64::consts::PI)
    }
}

/// A real weight tabulated on a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelProfile {
    grid: Grid,
    values: Vec<f64>,
}

impl KernelProfile {
    /// Tabulate `params` on `grid`.
    #[must_use]
    pub fn build(params: &KernelParams, grid: &Grid) -> Self {
        Self::tabulate(grid, |xi| params.value(xi))
    }

    /// Tabulate an arbitrary weight on `grid`.
    #[must_use]
    pub fn tabulate(grid: &Grid, f: impl Fn(f64) -> f64) -> Self {
        Self {
            values: grid.sample(f),
            grid: grid.clone(),
        }
    }

    /// Wrap externally tabulated values.
    pub fn from_values(grid: Grid, values: Vec<f64>) -> Result<Self> {
        if values.len() != grid.len() {
            return Err(CertifyError::grid_mismatch(format!(
                "kernel has {} values for a grid of {} points",
                values.len(),
                grid.len()
            )));
        }
        Ok(Self { grid, values })
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn shape(&self) -> GridShape {
        self.grid.shape()
    }

    /// Pointwise sum `self + other`; the grids must agree.
    pub fn perturbed(&self, other: &KernelProfile) -> Result<Self> {
        self.shape().ensure_matches(&other.shape(), "kernel perturbation")?;
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a + b)
            .collect();
        Ok(Self {
            grid: self.grid.clone(),
            values,
        })
    }

    /// `(xi, Khat)` pairs in grid order.
    pub fn rows(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.grid.points().iter().copied().zip(self.values.iter().copied())
    }
}

/// Supplies a kernel profile to dependent scans.
///
/// Scans never look for a profile themselves; the orchestration layer hands
/// them a source, which may be an in-memory profile or a tabulated artifact.
pub trait KernelSource {
    fn kernel_profile(&self) -> Result<KernelProfile>;

    /// Where the profile came from, for logs.
    fn describe(&self) -> String;
}

impl KernelSource for KernelProfile {
    fn kernel_profile(&self) -> Result<KernelProfile> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory kernel ({} points)", self.grid.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_a() -> KernelParams {
        KernelParams::new(16.0, 0.5, 0.0).unwrap()
    }

    #[test]
    fn rejects_non_positive_xi0() {
        for bad in [0.0, -16.0, f64::NAN, f64::INFINITY] {
            let err = KernelParams::new(bad, 0.5, 0.0).unwrap_err();
            assert!(matches!(err, CertifyError::Configuration { ref field, .. } if field == "Xi0"));
        }
    }

    #[test]
    fn value_at_origin_is_lstar_exactly() {
        for (xi0, c0, lstar) in [(16.0, 0.5, 0.0), (0.3, -7.0, 1.25), (1e6, 3.0, -2.5)] {
            let p = KernelParams::new(xi0, c0, lstar).unwrap();
            assert_eq!(p.value(0.0), lstar);
        }
    }

    #[test]
    fn scenario_a_reference_values() {
        let p = scenario_a();
        assert_eq!(p.value(0.0), 0.0);
        assert_eq!(p.value(16.0), 0.25);
        assert!((p.value(1e8) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tail_approaches_lstar_plus_c0() {
        let p = KernelParams::new(4.0, 2.0, 1.0).unwrap();
        for xi in [10.0, 100.0, 1_000.0, -5_000.0] {
            let gap = (p.value(xi) - 3.0).abs();
            assert!(gap <= 2.0 * 16.0 / (xi * xi) + 1e-15, "xi={xi} gap={gap}");
        }
    }

    #[test]
    fn profile_matches_params_on_grid() {
        let grid = Grid::linspace(-64.0, 64.0, 4097).unwrap();
        let k = KernelProfile::build(&scenario_a(), &grid);
        assert_eq!(k.values().len(), 4097);
        assert_eq!(k.values()[2048], 0.0);
        // xi = 16 sits at index 2048 + 16*32.
        assert_eq!(k.values()[2048 + 512], 0.25);
    }

    #[test]
    fn perturbation_requires_matching_grid() {
        let a = KernelProfile::build(&scenario_a(), &Grid::linspace(-1.0, 1.0, 5).unwrap());
        let b = KernelProfile::build(&scenario_a(), &Grid::linspace(-1.0, 1.0, 7).unwrap());
        assert!(matches!(
            a.perturbed(&b),
            Err(CertifyError::GridMismatch { .. })
        ));
        let doubled = a.perturbed(&a).unwrap();
        for (d, v) in doubled.values().iter().zip(a.values()) {
            assert_eq!(*d, 2.0 * v);
        }
    }

    #[test]
    fn from_values_checks_length() {
        let grid = Grid::linspace(-1.0, 1.0, 5).unwrap();
        assert!(KernelProfile::from_values(grid, vec![0.0; 4]).is_err());
    }
}
