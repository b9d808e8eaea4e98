//! Complex digamma with explicit precision control.
//!
//! ## Method
//!
//! Upward recurrence pushes the argument out to a minimum modulus,
//!
//! ```text
//! psi(z) = psi(z + N) - sum_{k=0}^{N-1} 1 / (z + k)
//! ```
//!
//! and the Stirling series finishes the job:
//!
//! ```text
//! psi(w) ~ ln w - 1/(2w) - sum_{n>=1} B_{2n} / (2n w^{2n})
//! ```
//!
//! The series is asymptotic, so terms shrink only up to an optimal index and
//! then grow. Truncation happens at the first term below `2^-precision_bits`
//! relative to the running value; if the terms start growing first the
//! evaluation fails instead of returning a silently inaccurate number. The
//! recurrence sum is carried with Neumaier compensation so that the reduction
//! near the contour `Re z = 1/4` does not eat the low-order bits the
//! archimedean residual depends on.

use num_complex::Complex64;

use crate::error::{CertifyError, Result};

/// Highest precision an f64 evaluation can honestly promise.
pub const MAX_PRECISION_BITS: u32 = f64::MANTISSA_DIGITS - 1;

/// `B_{2n} / (2n)` for `n = 1..=15`.
const STIRLING_COEFFS: [f64; 15] = [
    1.0 / 12.0,
    -1.0 / 120.0,
    1.0 / 252.0,
    -1.0 / 240.0,
    1.0 / 132.0,
    -691.0 / 32_760.0,
    1.0 / 12.0,
    -3_617.0 / 8_160.0,
    43_867.0 / 14_364.0,
    -174_611.0 / 6_600.0,
    854_513.0 / 3_036.0,
    -236_364_091.0 / 65_520.0,
    8_553_103.0 / 156.0,
    -23_749_461_029.0 / 24_360.0,
    8_615_841_276_005.0 / 429_660.0,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DigammaOptions {
    /// The Stirling series stops once a term falls below `2^-precision_bits`
    /// relative to the partial sum. This bounds the series truncation only;
    /// callers that subtract nearby quantities lose accuracy beyond it.
    pub precision_bits: u32,
    /// Recurrence runs until `|w|` reaches this modulus.
    pub min_modulus: f64,
    /// Cap on recurrence steps.
    pub max_shift: u32,
}

impl Default for DigammaOptions {
    fn default() -> Self {
        Self {
            precision_bits: 50,
            min_modulus: 10.0,
            max_shift: 100_000,
        }
    }
}

impl DigammaOptions {
    #[must_use]
    pub fn with_precision_bits(mut self, bits: u32) -> Self {
        self.precision_bits = bits;
        self
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        (-f64::from(self.precision_bits)).exp2()
    }
}

/// Neumaier-compensated accumulator.
#[derive(Debug, Default, Clone, Copy)]
struct CompensatedSum {
    sum: f64,
    carry: f64,
}

impl CompensatedSum {
    fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.carry += (self.sum - t) + x;
        } else {
            self.carry += (x - t) + self.sum;
        }
        self.sum = t;
    }

    fn value(self) -> f64 {
        self.sum + self.carry
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct CompensatedComplexSum {
    re: CompensatedSum,
    im: CompensatedSum,
}

impl CompensatedComplexSum {
    fn add(&mut self, z: Complex64) {
        self.re.add(z.re);
        self.im.add(z.im);
    }

    fn value(self) -> Complex64 {
        Complex64::new(self.re.value(), self.im.value())
    }
}

/// `psi(z)` at the precision requested in `opts`.
pub fn digamma(z: Complex64, opts: &DigammaOptions) -> Result<Complex64> {
    if opts.precision_bits == 0 || opts.precision_bits > MAX_PRECISION_BITS {
        return Err(CertifyError::numeric_precision(
            "digamma",
            format!(
                "requested {} bits, f64 working precision supports 1..={MAX_PRECISION_BITS}",
                opts.precision_bits
            ),
        ));
    }
    if !z.re.is_finite() || !z.im.is_finite() {
        return Err(CertifyError::numeric_precision(
            "digamma",
            format!("non-finite argument {z}"),
        ));
    }

    let mut w = z;
    let mut reduction = CompensatedComplexSum::default();
    let mut steps = 0u32;
    while w.norm() < opts.min_modulus {
        if w.norm_sqr() == 0.0 {
            return Err(CertifyError::numeric_precision(
                "digamma",
                format!("pole at z = {z}"),
            ));
        }
        if steps == opts.max_shift {
            return Err(CertifyError::numeric_precision(
                "digamma",
                format!(
                    "recurrence budget of {} steps exhausted before |w| >= {}",
                    opts.max_shift, opts.min_modulus
                ),
            ));
        }
        reduction.add(w.inv());
        w += 1.0;
        steps += 1;
    }

    let tol = opts.tolerance();
    let inv = w.inv();
    let inv2 = inv * inv;
    let head = w.ln() - 0.5 * inv;
    let mut tail = CompensatedComplexSum::default();
    let mut power = inv2;
    let mut prev = f64::INFINITY;
    let mut converged = false;
    for &c in &STIRLING_COEFFS {
        let term = power * c;
        let mag = term.norm();
        if mag > prev {
            break;
        }
        tail.add(term);
        if mag <= tol * (head - tail.value()).norm() {
            converged = true;
            break;
        }
        prev = mag;
        power *= inv2;
    }
    if !converged {
        return Err(CertifyError::numeric_precision(
            "digamma",
            format!(
                "asymptotic series at |w| = {:.3} did not reach 2^-{} (z = {z})",
                w.norm(),
                opts.precision_bits
            ),
        ));
    }

    Ok(head - tail.value() - reduction.value())
}
