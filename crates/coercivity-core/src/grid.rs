//! Uniform quadrature grids.
//!
//! A [`Grid`] is the fixed-step rectangle rule every quadratic form in this
//! crate is evaluated with. Sampled values (kernels, packets) carry the
//! [`GridShape`] they were produced on so that a mismatch is caught before
//! any summation happens.

use crate::error::{CertifyError, Result};

/// Relative tolerance on spacing agreement between grids.
pub const SPACING_RTOL: f64 = 1e-9;

/// Nudge added to `arange` stops so the closing endpoint is included.
pub const ARANGE_STOP_NUDGE: f64 = 1e-12;

/// Length and spacing of a grid; enough to decide quadrature compatibility.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridShape {
    pub len: usize,
    pub step: f64,
}

impl GridShape {
    /// Fails with `GridMismatch` unless `other` has the same length and spacing.
    pub fn ensure_matches(&self, other: &GridShape, what: &str) -> Result<()> {
        if self.len != other.len {
            return Err(CertifyError::grid_mismatch(format!(
                "{what}: length {} does not match grid length {}",
                other.len, self.len
            )));
        }
        if !spacing_close(self.step, other.step) {
            return Err(CertifyError::grid_mismatch(format!(
                "{what}: spacing {} does not match grid spacing {}",
                other.step, self.step
            )));
        }
        Ok(())
    }
}

fn spacing_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= SPACING_RTOL * a.abs().max(b.abs())
}

/// Ordered, uniformly spaced sample points.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    points: Vec<f64>,
    step: f64,
}

impl Grid {
    /// `n` points from `start` to `stop` inclusive.
    pub fn linspace(start: f64, stop: f64, n: usize) -> Result<Self> {
        if !start.is_finite() || !stop.is_finite() {
            return Err(CertifyError::configuration(
                "grid",
                format!("[{start}, {stop}]"),
                "endpoints must be finite",
            ));
        }
        if n < 2 {
            return Err(CertifyError::configuration(
                "grid.points",
                n,
                "a quadrature grid needs at least 2 points",
            ));
        }
        if stop <= start {
            return Err(CertifyError::configuration(
                "grid",
                format!("[{start}, {stop}]"),
                "stop must exceed start",
            ));
        }
        let step = (stop - start) / (n - 1) as f64;
        let mut points: Vec<f64> = (0..n).map(|k| start + k as f64 * step).collect();
        points[n - 1] = stop;
        Ok(Self { points, step })
    }

    /// Points `start + k*step` strictly below `stop`.
    pub fn arange(start: f64, stop: f64, step: f64) -> Result<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(CertifyError::configuration(
                "grid.step",
                step,
                "step must be finite and > 0",
            ));
        }
        if !start.is_finite() || !stop.is_finite() {
            return Err(CertifyError::configuration(
                "grid",
                format!("[{start}, {stop})"),
                "endpoints must be finite",
            ));
        }
        let n = ((stop - start) / step).ceil();
        if n.is_nan() || n < 2.0 {
            return Err(CertifyError::configuration(
                "grid",
                format!("[{start}, {stop}) step {step}"),
                "range yields fewer than 2 points",
            ));
        }
        let points = (0..n as usize).map(|k| start + k as f64 * step).collect();
        Ok(Self { points, step })
    }

    /// Symmetric grid `[-xi_max, xi_max]` with the given step, endpoint included.
    pub fn symmetric(xi_max: f64, step: f64) -> Result<Self> {
        if !(xi_max.is_finite() && xi_max > 0.0) {
            return Err(CertifyError::configuration(
                "xi_max",
                xi_max,
                "must be finite and > 0",
            ));
        }
        Self::arange(-xi_max, xi_max + ARANGE_STOP_NUDGE, step)
    }

    /// Adopt externally tabulated points; spacing must be uniform.
    pub fn from_points(points: Vec<f64>) -> Result<Self> {
        if points.len() < 2 {
            return Err(CertifyError::grid_mismatch(format!(
                "tabulated grid has {} point(s), need at least 2",
                points.len()
            )));
        }
        let step = points[1] - points[0];
        if !(step.is_finite() && step > 0.0) {
            return Err(CertifyError::grid_mismatch(format!(
                "tabulated grid must be increasing, first step is {step}"
            )));
        }
        for (i, pair) in points.windows(2).enumerate() {
            let d = pair[1] - pair[0];
            if !spacing_close(step, d) {
                return Err(CertifyError::grid_mismatch(format!(
                    "non-uniform spacing at index {}: {d} vs {step}",
                    i + 1
                )));
            }
        }
        Ok(Self { points, step })
    }

    #[must_use]
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    #[must_use]
    pub fn step(&self) -> f64 {
        self.step
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn shape(&self) -> GridShape {
        GridShape {
            len: self.points.len(),
            step: self.step,
        }
    }

    /// Tabulate `f` at every point.
    pub fn sample<F: Fn(f64) -> f64>(&self, f: F) -> Vec<f64> {
        self.points.iter().map(|&x| f(x)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_hits_both_endpoints() {
        let g = Grid::linspace(-64.0, 64.0, 4097).unwrap();
        assert_eq!(g.len(), 4097);
        assert_eq!(g.points()[0], -64.0);
        assert_eq!(g.points()[4096], 64.0);
        assert_eq!(g.points()[2048], 0.0);
        assert_eq!(g.step(), 1.0 / 32.0);
    }

    #[test]
    fn symmetric_grid_includes_closing_endpoint() {
        let g = Grid::symmetric(256.0, 0.25).unwrap();
        assert_eq!(g.len(), 2049);
        assert_eq!(g.points()[0], -256.0);
        assert_eq!(*g.points().last().unwrap(), 256.0);
    }

    #[test]
    fn arange_rejects_bad_step() {
        assert!(matches!(
            Grid::arange(0.0, 1.0, 0.0),
            Err(CertifyError::Configuration { .. })
        ));
        assert!(matches!(
            Grid::arange(0.0, 1.0, f64::NAN),
            Err(CertifyError::Configuration { .. })
        ));
    }

    #[test]
    fn from_points_rejects_non_uniform_spacing() {
        let err = Grid::from_points(vec![0.0, 1.0, 2.0, 3.5]).unwrap_err();
        assert!(matches!(err, CertifyError::GridMismatch { .. }));
    }

    #[test]
    fn from_points_accepts_tabulated_linspace() {
        let g = Grid::linspace(-2.0, 2.0, 33).unwrap();
        let again = Grid::from_points(g.points().to_vec()).unwrap();
        assert_eq!(again.shape(), g.shape());
    }

    #[test]
    fn shape_mismatch_reports_lengths() {
        let a = Grid::linspace(-1.0, 1.0, 11).unwrap().shape();
        let b = Grid::linspace(-1.0, 1.2, 12).unwrap().shape();
        let err = a.ensure_matches(&b, "packet").unwrap_err();
        assert!(err.to_string().contains("length 12"));
    }

    #[test]
    fn shape_mismatch_reports_spacing() {
        let a = Grid::linspace(-1.0, 1.0, 11).unwrap().shape();
        let b = Grid::linspace(-2.0, 2.0, 11).unwrap().shape();
        assert!(a.ensure_matches(&b, "packet").is_err());
    }
}
