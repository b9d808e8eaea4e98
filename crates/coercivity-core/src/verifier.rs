//! Statistical check of the coercivity inequality on random packets.
//!
//! For each sampled packet `A`:
//!
//! ```text
//! Q(A) >= kappa_bar * sum_i w_i |A_i|^2 dxi,   kappa_bar = c0 / (2pi)
//! ```
//!
//! Packets are sums of two Gaussian bumps. All parameters come from a single
//! ChaCha8 stream seeded once per run, drawn per sample in the order
//! center1, center2, width1, width2. Draws are taken up front so the
//! (possibly parallel) evaluation cannot perturb the stream.
//!
//! This is a finite-sample sanity check, not a proof.

use rand::SeedableRng;
use rand::distributions::{Distribution, Uniform};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::config::CertificationConfig;
use crate::error::{CertifyError, Result};
use crate::kernel::{KernelParams, KernelProfile};
use crate::parallel::ordered_map;
use crate::quadratic::{QuadraticFormEvaluator, TestPacket, gaussian};

/// Name of the pseudo-random algorithm, recorded in summaries.
pub const RNG_ALGORITHM: &str = "chacha8 (rand_chacha 0.3, Uniform<f64> from rand 0.8)";

/// Floor of the tolerance allowance.
pub const EPS_FLOOR: f64 = 1e-12;

/// Allowance relative to the median |rhs|.
pub const EPS_RELATIVE: f64 = 1e-12;

/// How packets are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingPlan {
    pub samples: usize,
    pub seed: u64,
    pub center_range: [f64; 2],
    pub width_range: [f64; 2],
}

impl SamplingPlan {
    pub fn new(
        samples: usize,
        seed: u64,
        center_range: [f64; 2],
        width_range: [f64; 2],
    ) -> Result<Self> {
        if samples == 0 {
            return Err(CertifyError::configuration("iu_samples", 0, "must be at least 1"));
        }
        for (field, [lo, hi]) in [("iu_center_range", center_range), ("iu_width_range", width_range)] {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(CertifyError::configuration(
                    field,
                    format!("[{lo}, {hi}]"),
                    "must be a finite range with low < high",
                ));
            }
        }
        if width_range[0] <= 0.0 {
            return Err(CertifyError::configuration(
                "iu_width_range",
                format!("{width_range:?}"),
                "widths must be > 0",
            ));
        }
        Ok(Self {
            samples,
            seed,
            center_range,
            width_range,
        })
    }

    pub fn from_config(cfg: &CertificationConfig) -> Result<Self> {
        Self::new(
            cfg.iu_samples,
            cfg.iu_seed,
            cfg.iu_center_range,
            cfg.iu_width_range,
        )
    }

    /// Draw every packet's parameters from one seeded stream.
    #[must_use]
    pub fn draw(&self) -> Vec<PacketDraw> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let centers = Uniform::new(self.center_range[0], self.center_range[1]);
        let widths = Uniform::new(self.width_range[0], self.width_range[1]);
        (0..self.samples)
            .map(|_| {
                let c1 = centers.sample(&mut rng);
                let c2 = centers.sample(&mut rng);
                let s1 = widths.sample(&mut rng);
                let s2 = widths.sample(&mut rng);
                PacketDraw {
                    centers: [c1, c2],
                    widths: [s1, s2],
                }
            })
            .collect()
    }
}

/// Parameters of one two-bump packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketDraw {
    pub centers: [f64; 2],
    pub widths: [f64; 2],
}

impl PacketDraw {
    #[must_use]
    pub fn value(&self, xi: f64) -> f64 {
        gaussian(xi, self.centers[0], self.widths[0]) + gaussian(xi, self.centers[1], self.widths[1])
    }
}

/// One row of `IU_check_random.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IuSample {
    pub i: usize,
    #[serde(rename = "Q")]
    pub q: f64,
    pub rhs: f64,
    pub ok: bool,
}

impl IuSample {
    #[must_use]
    pub fn margin(&self) -> f64 {
        self.q - self.rhs
    }
}

/// Exact and tolerance-relaxed verdicts; both are always reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IuSummary {
    pub ok_fraction: f64,
    pub min_margin: f64,
    pub ok_fraction_tol: f64,
    pub min_margin_tol: f64,
    pub all_ok: bool,
    pub all_ok_tol: bool,
    pub eps_used: f64,
}

impl IuSummary {
    /// Aggregate sample rows. Returns `None` for an empty slice.
    #[must_use]
    pub fn from_samples(samples: &[IuSample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let abs_rhs: Vec<f64> = samples.iter().map(|s| s.rhs.abs()).collect();
        let med = median(&abs_rhs);
        let scale = if med == 0.0 { 1.0 } else { med };
        let eps = EPS_FLOOR.max(EPS_RELATIVE * scale);

        let margins: Vec<f64> = samples.iter().map(IuSample::margin).collect();
        let margins_tol: Vec<f64> = samples.iter().map(|s| s.q - (s.rhs - eps)).collect();

        let ok = margins.iter().filter(|m| **m >= 0.0).count() as f64;
        let ok_tol = margins_tol.iter().filter(|m| **m >= 0.0).count() as f64;
        let min_margin = margins.iter().copied().fold(f64::INFINITY, f64::min);
        let min_margin_tol = margins_tol.iter().copied().fold(f64::INFINITY, f64::min);

        Some(Self {
            ok_fraction: ok / n,
            min_margin,
            ok_fraction_tol: ok_tol / n,
            min_margin_tol,
            all_ok: min_margin >= 0.0,
            all_ok_tol: min_margin_tol >= 0.0,
            eps_used: eps,
        })
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub draws: Vec<PacketDraw>,
    pub samples: Vec<IuSample>,
    pub summary: IuSummary,
}

/// Samples packets and compares `Q` against the weighted norm.
#[derive(Debug, Clone)]
pub struct InequalityVerifier<'a> {
    kernel: &'a KernelProfile,
    params: KernelParams,
    plan: SamplingPlan,
    workers: usize,
}

impl<'a> InequalityVerifier<'a> {
    #[must_use]
    pub fn new(kernel: &'a KernelProfile, params: KernelParams, plan: SamplingPlan) -> Self {
        Self {
            kernel,
            params,
            plan,
            workers: 1,
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn run(&self) -> Result<VerificationReport> {
        let draws = self.plan.draw();
        let grid = self.kernel.grid();
        let eval = QuadraticFormEvaluator::for_kernel(self.kernel);
        let kappa_bar = self.params.kappa_bar();

        let indexed: Vec<(usize, PacketDraw)> = draws.iter().copied().enumerate().collect();
        let samples = ordered_map(&indexed, self.workers, |&(i, draw)| {
            let packet = TestPacket::real(grid, |xi| draw.value(xi));
            let q = eval.evaluate(self.kernel, &packet)?;
            let rhs = kappa_bar * eval.weighted_norm(grid, &self.params, &packet)?;
            Ok::<_, CertifyError>(IuSample {
                i,
                q,
                rhs,
                ok: q >= rhs,
            })
        })?;

        let summary = IuSummary::from_samples(&samples).ok_or_else(|| {
            CertifyError::configuration("iu_samples", 0, "no samples were evaluated")
        })?;
        Ok(VerificationReport {
            draws,
            samples,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    fn default_plan() -> SamplingPlan {
        SamplingPlan::from_config(&CertificationConfig::default()).unwrap()
    }

    #[test]
    fn draws_are_reproducible_and_in_range() {
        let plan = default_plan();
        let a = plan.draw();
        let b = plan.draw();
        assert_eq!(a.len(), 64);
        for (x, y) in a.iter().zip(&b) {
            for k in 0..2 {
                assert_eq!(x.centers[k].to_bits(), y.centers[k].to_bits());
                assert_eq!(x.widths[k].to_bits(), y.widths[k].to_bits());
            }
            assert!(x.centers.iter().all(|c| (-24.0..24.0).contains(c)));
            assert!(x.widths.iter().all(|s| (0.5..2.0).contains(s)));
        }
    }

    #[test]
    fn different_seed_changes_draws() {
        let plan = default_plan();
        let other = SamplingPlan { seed: 124, ..plan };
        assert_ne!(plan.draw(), other.draw());
    }

    #[test]
    fn draw_order_is_centers_then_widths() {
        let plan = SamplingPlan::new(1, 7, [-24.0, 24.0], [0.5, 2.0]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let centers = Uniform::new(-24.0, 24.0);
        let widths = Uniform::new(0.5, 2.0);
        let expected = PacketDraw {
            centers: [centers.sample(&mut rng), centers.sample(&mut rng)],
            widths: [widths.sample(&mut rng), widths.sample(&mut rng)],
        };
        assert_eq!(plan.draw()[0], expected);
    }

    #[test]
    fn invalid_plans_rejected() {
        assert!(SamplingPlan::new(0, 1, [-1.0, 1.0], [0.5, 2.0]).is_err());
        assert!(SamplingPlan::new(4, 1, [1.0, 1.0], [0.5, 2.0]).is_err());
        assert!(SamplingPlan::new(4, 1, [-1.0, 1.0], [0.0, 2.0]).is_err());
    }

    #[test]
    fn summary_reports_both_verdicts() {
        let samples = [
            IuSample { i: 0, q: 1.0, rhs: 0.5, ok: true },
            IuSample { i: 1, q: 2.0, rhs: 2.0 + 1e-13, ok: false },
            IuSample { i: 2, q: 3.0, rhs: 1.0, ok: true },
        ];
        let s = IuSummary::from_samples(&samples).unwrap();
        // median |rhs| = 1.0, so eps = 1e-12
        assert_eq!(s.eps_used, 1e-12);
        assert!((s.ok_fraction - 2.0 / 3.0).abs() < 1e-15);
        assert_eq!(s.ok_fraction_tol, 1.0);
        assert!(!s.all_ok);
        assert!(s.all_ok_tol);
        assert!(s.min_margin < 0.0);
        assert!(s.min_margin_tol > 0.0);
    }

    #[test]
    fn eps_scales_with_large_rhs() {
        let samples = [
            IuSample { i: 0, q: 5e6, rhs: 4e6, ok: true },
            IuSample { i: 1, q: 5e6, rhs: 2e6, ok: true },
        ];
        let s = IuSummary::from_samples(&samples).unwrap();
        assert!((s.eps_used - 3e-6).abs() < 1e-18);
    }

    #[test]
    fn zero_median_falls_back_to_unit_scale() {
        let samples = [IuSample { i: 0, q: 0.0, rhs: 0.0, ok: true }];
        assert_eq!(IuSummary::from_samples(&samples).unwrap().eps_used, 1e-12);
        assert!(IuSummary::from_samples(&[]).is_none());
    }

    #[test]
    fn default_kernel_passes_and_is_deterministic() {
        let cfg = CertificationConfig::default();
        let params = cfg.kernel_params().unwrap();
        let kernel = KernelProfile::build(&params, &cfg.kernel_grid().unwrap());
        let plan = SamplingPlan::new(8, cfg.iu_seed, cfg.iu_center_range, cfg.iu_width_range)
            .unwrap();
        let serial = InequalityVerifier::new(&kernel, params, plan).run().unwrap();
        let parallel = InequalityVerifier::new(&kernel, params, plan)
            .with_workers(3)
            .run()
            .unwrap();
        assert_eq!(serial, parallel);
        // With Lstar = 0 the kernel equals 2pi * kappa_bar * w pointwise.
        assert!(serial.summary.all_ok_tol);
        assert_eq!(serial.samples.len(), 8);
        assert!(serial.samples.iter().enumerate().all(|(i, s)| s.i == i));
    }

    #[test]
    fn negative_floor_fails_the_check() {
        let grid = Grid::linspace(-64.0, 64.0, 2049).unwrap();
        let params = KernelParams::new(16.0, 0.5, 0.0).unwrap();
        let shifted = KernelProfile::build(&KernelParams::new(16.0, 0.5, -0.1).unwrap(), &grid);
        let plan = SamplingPlan::new(16, 123, [-24.0, 24.0], [0.5, 2.0]).unwrap();
        let report = InequalityVerifier::new(&shifted, params, plan).run().unwrap();
        assert_eq!(report.summary.ok_fraction, 0.0);
        assert!(!report.summary.all_ok_tol);
    }
}
