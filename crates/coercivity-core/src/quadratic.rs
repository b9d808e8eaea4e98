//! Grid quadrature of the quadratic form.
//!
//! ```text
//! Q(A) = (1 / 2pi) * sum_i Khat_i * |A_i|^2 * dxi
//! ```
//!
//! The rule is the fixed-step rectangle sum; its error is whatever the grid
//! resolution allows and is not estimated here. Refining the grid is the
//! caller's lever.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::error::{CertifyError, Result};
use crate::grid::{Grid, GridShape};
use crate::kernel::{KernelParams, KernelProfile};

/// Unnormalized Gaussian bump `exp(-0.5 * ((x - mu) / s)^2)`.
#[inline]
#[must_use]
pub fn gaussian(x: f64, mu: f64, s: f64) -> f64 {
    let t = (x - mu) / s;
    (-0.5 * t * t).exp()
}

#[derive(Debug, Clone, PartialEq)]
enum Samples {
    Real(Vec<f64>),
    Complex(Vec<Complex64>),
}

/// A frequency-domain test function sampled on a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct TestPacket {
    shape: GridShape,
    samples: Samples,
}

impl TestPacket {
    /// Tabulate a real packet on `grid`.
    pub fn real<F: Fn(f64) -> f64>(grid: &Grid, f: F) -> Self {
        Self {
            shape: grid.shape(),
            samples: Samples::Real(grid.sample(f)),
        }
    }

    /// Tabulate a complex packet on `grid`.
    pub fn complex<F: Fn(f64) -> Complex64>(grid: &Grid, f: F) -> Self {
        Self {
            shape: grid.shape(),
            samples: Samples::Complex(grid.points().iter().map(|&x| f(x)).collect()),
        }
    }

    /// Wrap precomputed real samples that claim to live on `shape`.
    pub fn from_real_samples(shape: GridShape, values: Vec<f64>) -> Result<Self> {
        if values.len() != shape.len {
            return Err(CertifyError::grid_mismatch(format!(
                "packet has {} samples for a grid of {} points",
                values.len(),
                shape.len
            )));
        }
        Ok(Self {
            shape,
            samples: Samples::Real(values),
        })
    }

    #[must_use]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shape.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.len == 0
    }

    /// `|A_i|^2` at every sample.
    #[must_use]
    pub fn energy_density(&self) -> Vec<f64> {
        match &self.samples {
            Samples::Real(v) => v.iter().map(|a| a * a).collect(),
            Samples::Complex(v) => v.iter().map(Complex64::norm_sqr).collect(),
        }
    }
}

/// Evaluates quadratic forms on one fixed grid.
#[derive(Debug, Clone, Copy)]
pub struct QuadraticFormEvaluator {
    shape: GridShape,
}

impl QuadraticFormEvaluator {
    #[must_use]
    pub fn new(grid: &Grid) -> Self {
        Self {
            shape: grid.shape(),
        }
    }

    #[must_use]
    pub fn for_kernel(kernel: &KernelProfile) -> Self {
        Self {
            shape: kernel.shape(),
        }
    }

    /// `Q(A)` for the given kernel and packet.
    pub fn evaluate(&self, kernel: &KernelProfile, packet: &TestPacket) -> Result<f64> {
        self.shape.ensure_matches(&kernel.shape(), "kernel")?;
        self.shape.ensure_matches(&packet.shape(), "test packet")?;
        Ok(self.weighted_sum(kernel.values(), packet) / (2.0 * PI))
    }

    /// `sum_i w_i |A_i|^2 dxi` with `w_i = xi_i^2 / (xi_i^2 + Xi0^2)`.
    pub fn weighted_norm(
        &self,
        grid: &Grid,
        params: &KernelParams,
        packet: &TestPacket,
    ) -> Result<f64> {
        self.shape.ensure_matches(&grid.shape(), "weight grid")?;
        self.shape.ensure_matches(&packet.shape(), "test packet")?;
        let weights = grid.sample(|xi| params.gradient_weight(xi));
        Ok(self.weighted_sum(&weights, packet))
    }

    fn weighted_sum(&self, weights: &[f64], packet: &TestPacket) -> f64 {
        let sum: f64 = match &packet.samples {
            Samples::Real(v) => weights.iter().zip(v).map(|(w, a)| w * (a * a)).sum(),
            Samples::Complex(v) => weights.iter().zip(v).map(|(w, a)| w * a.norm_sqr()).sum(),
        };
        sum * self.shape.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Grid {
        Grid::linspace(-32.0, 32.0, 2049).unwrap()
    }

    #[test]
    fn gaussian_peak_and_width() {
        assert_eq!(gaussian(3.0, 3.0, 0.5), 1.0);
        assert!((gaussian(4.0, 3.0, 1.0) - (-0.5f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn constant_kernel_recovers_gaussian_mass() {
        let g = grid();
        let params = KernelParams::new(1.0, 0.0, 1.0).unwrap();
        let k = KernelProfile::build(&params, &g);
        let a = TestPacket::real(&g, |x| gaussian(x, 0.0, 1.0));
        let q = QuadraticFormEvaluator::new(&g).evaluate(&k, &a).unwrap();
        // integral of exp(-x^2) = sqrt(pi)
        let expected = PI.sqrt() / (2.0 * PI);
        assert!((q - expected).abs() < 1e-10, "q={q} expected={expected}");
    }

    #[test]
    fn linear_in_kernel() {
        let g = grid();
        let k1 = KernelProfile::build(&KernelParams::new(16.0, 0.5, 0.0).unwrap(), &g);
        let k2 = KernelProfile::build(&KernelParams::new(3.0, -1.25, 0.7).unwrap(), &g);
        let a = TestPacket::real(&g, |x| gaussian(x, 5.0, 0.8) + gaussian(x, -9.0, 1.7));
        let eval = QuadraticFormEvaluator::new(&g);
        let lhs = eval.evaluate(&k1.perturbed(&k2).unwrap(), &a).unwrap();
        let rhs = eval.evaluate(&k1, &a).unwrap() + eval.evaluate(&k2, &a).unwrap();
        assert!((lhs - rhs).abs() <= 1e-12 * lhs.abs().max(1.0));
    }

    #[test]
    fn complex_packet_uses_modulus() {
        let g = grid();
        let k = KernelProfile::build(&KernelParams::new(16.0, 0.5, 0.25).unwrap(), &g);
        let real = TestPacket::real(&g, |x| gaussian(x, 2.0, 1.0));
        let rotated = TestPacket::complex(&g, |x| {
            Complex64::from_polar(gaussian(x, 2.0, 1.0), 0.3 * x)
        });
        let eval = QuadraticFormEvaluator::new(&g);
        let a = eval.evaluate(&k, &real).unwrap();
        let b = eval.evaluate(&k, &rotated).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn non_negative_kernel_gives_non_negative_form() {
        let g = grid();
        let k = KernelProfile::build(&KernelParams::new(16.0, 0.5, 0.0).unwrap(), &g);
        let eval = QuadraticFormEvaluator::new(&g);
        for mu in [-20.0, -1.0, 0.0, 0.5, 13.0] {
            let a = TestPacket::real(&g, |x| gaussian(x, mu, 0.6));
            assert!(eval.evaluate(&k, &a).unwrap() >= 0.0);
        }
    }

    #[test]
    fn mismatched_packet_is_rejected() {
        let g = grid();
        let other = Grid::linspace(-32.0, 32.0, 2048).unwrap();
        let k = KernelProfile::build(&KernelParams::new(16.0, 0.5, 0.0).unwrap(), &g);
        let a = TestPacket::real(&other, |x| gaussian(x, 0.0, 1.0));
        let err = QuadraticFormEvaluator::new(&g).evaluate(&k, &a).unwrap_err();
        assert!(matches!(err, CertifyError::GridMismatch { .. }));
    }

    #[test]
    fn weighted_norm_vanishes_for_origin_spike() {
        let g = Grid::linspace(-1.0, 1.0, 3).unwrap();
        let params = KernelParams::new(16.0, 0.5, 0.0).unwrap();
        let a = TestPacket::from_real_samples(g.shape(), vec![0.0, 1.0, 0.0]).unwrap();
        let n = QuadraticFormEvaluator::new(&g)
            .weighted_norm(&g, &params, &a)
            .unwrap();
        assert_eq!(n, 0.0);
    }
}
