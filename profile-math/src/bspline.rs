//! Least-squares cubic B-spline profiles
//!
//! Implements regression (smoothing) splines: unlike an interpolating spline,
//! the curve does not pass through the samples but minimizes the squared
//! residuals for a fixed set of interior knots. The basis is built on a
//! clamped knot vector so the spline is defined on exactly [lo, hi] of the
//! fit domain.
//!
//! # Mathematical Background
//!
//! With full knot vector t₀ ≤ … ≤ t_{m-1} and degree k there are
//! n = m − k − 1 basis functions B_{i,k}, generated by the Cox–de Boor
//! recursion
//!
//! B_{i,p}(x) = (x − tᵢ)/(t_{i+p} − tᵢ)·B_{i,p−1}(x)
//!            + (t_{i+p+1} − x)/(t_{i+p+1} − t_{i+1})·B_{i+1,p−1}(x)
//!
//! and the curve is S(x) = Σ cᵢ·B_{i,k}(x). Its derivative is
//!
//! S'(x) = Σ cᵢ·k·[B_{i,k−1}(x)/(t_{i+k} − tᵢ) − B_{i+1,k−1}(x)/(t_{i+k+1} − t_{i+1})]
//!
//! Outside [lo, hi] the first or last polynomial piece is continued.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::error::FitError;
use crate::lstsq;

/// Degree used for all profile splines
pub const CUBIC: usize = 3;

/// B-spline on a clamped knot vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSpline {
    /// Full knot vector including the repeated boundary knots
    pub knots: Vec<f64>,
    /// One coefficient per basis function
    pub coeffs: Vec<f64>,
    pub degree: usize,
}

/// Interior knots evenly spread across `domain`.
///
/// An evenly spaced grid of `count + 2` points is laid from `lo` to `hi` and
/// its first and last points are dropped, leaving `count` strictly interior
/// knots.
pub fn even_interior_knots(domain: (f64, f64), count: usize) -> Vec<f64> {
    let (lo, hi) = domain;
    let step = (hi - lo) / (count + 1) as f64;
    (1..=count).map(|j| lo + step * j as f64).collect()
}

/// Clamped knot vector: `degree + 1` copies of each end around `interior`
pub fn clamped_knots(domain: (f64, f64), interior: &[f64], degree: usize) -> Vec<f64> {
    let (lo, hi) = domain;
    let mut knots = Vec::with_capacity(interior.len() + 2 * (degree + 1));
    knots.extend(std::iter::repeat(lo).take(degree + 1));
    knots.extend_from_slice(interior);
    knots.extend(std::iter::repeat(hi).take(degree + 1));
    knots
}

impl BSpline {
    /// Least-squares fit of a spline with the given interior knots.
    ///
    /// # Arguments
    /// * `xs`, `ys` - Samples to fit
    /// * `interior` - Strictly increasing interior knots inside `domain`
    /// * `degree` - Spline degree (3 for cubic)
    /// * `domain` - (lo, hi) support of the spline
    ///
    /// # Errors
    /// * `FitError::InsufficientSamples` - fewer samples than basis functions
    /// * `FitError::RankDeficient` - some basis function has no support in the
    ///   samples (a gap between knots, typically after heavy clipping)
    pub fn fit(
        xs: &[f64],
        ys: &[f64],
        interior: &[f64],
        degree: usize,
        domain: (f64, f64),
    ) -> Result<Self, FitError> {
        if xs.len() != ys.len() {
            return Err(FitError::MismatchedLengths {
                x_len: xs.len(),
                y_len: ys.len(),
            });
        }
        if domain.1 <= domain.0 {
            return Err(FitError::ArgumentError(format!(
                "spline domain [{}, {}] is empty",
                domain.0, domain.1
            )));
        }
        if interior.windows(2).any(|w| w[1] <= w[0])
            || interior.iter().any(|&k| k <= domain.0 || k >= domain.1)
        {
            return Err(FitError::ArgumentError(
                "interior knots must be strictly increasing and inside the domain".to_string(),
            ));
        }

        let knots = clamped_knots(domain, interior, degree);
        let nbasis = knots.len() - degree - 1;
        if xs.len() < nbasis {
            return Err(FitError::InsufficientSamples {
                active: xs.len(),
                required: nbasis,
            });
        }

        let mut design = DMatrix::zeros(xs.len(), nbasis);
        for (row, &x) in xs.iter().enumerate() {
            let span = find_span(&knots, degree, x);
            let basis = basis_at_span(&knots, degree, span, x);
            for (col, b) in basis.into_iter().enumerate() {
                design[(row, col)] = b;
            }
        }
        let rhs = DVector::from_column_slice(ys);

        let solution = lstsq::solve(design, &rhs)?;
        Ok(Self {
            knots,
            coeffs: solution.iter().copied().collect(),
            degree,
        })
    }

    /// Knots strictly inside the support
    pub fn interior_knots(&self) -> &[f64] {
        &self.knots[self.degree + 1..self.knots.len() - self.degree - 1]
    }

    /// (lo, hi) support of the spline
    pub fn domain(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }
}

impl Curve for BSpline {
    fn value(&self, x: f64) -> f64 {
        let span = find_span(&self.knots, self.degree, x);
        basis_at_span(&self.knots, self.degree, span, x)
            .iter()
            .zip(&self.coeffs)
            .map(|(b, c)| b * c)
            .sum()
    }

    fn derivative(&self, x: f64) -> f64 {
        if self.degree == 0 {
            return 0.0;
        }
        let k = self.degree;
        let t = &self.knots;
        let span = find_span(t, k, x);
        // Degree k-1 basis over the same knots has one more function than
        // the degree k basis.
        let lower = basis_at_span(t, k - 1, span, x);

        self.coeffs
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let left = safe_ratio(lower[i], t[i + k] - t[i]);
                let right = safe_ratio(lower[i + 1], t[i + k + 1] - t[i + 1]);
                c * k as f64 * (left - right)
            })
            .sum()
    }
}

/// Index `i` of the knot interval [tᵢ, tᵢ₊₁) holding `x`.
///
/// Restricted to the non-degenerate spans `degree ..= n - 1` so that points
/// at or beyond the right end use the last piece and points left of the
/// support use the first one.
fn find_span(knots: &[f64], degree: usize, x: f64) -> usize {
    let n = knots.len() - degree - 1;
    if x >= knots[n] {
        return n - 1;
    }
    if x <= knots[degree] {
        return degree;
    }

    // Binary search for efficiency
    let mut left = degree;
    let mut right = n;
    while left < right - 1 {
        let mid = (left + right) / 2;
        if x < knots[mid] {
            right = mid;
        } else {
            left = mid;
        }
    }
    left
}

/// All basis functions of degree `degree` at `x`, with the degree-0 indicator
/// placed on `span`. Returns `knots.len() - degree - 1` values.
fn basis_at_span(knots: &[f64], degree: usize, span: usize, x: f64) -> Vec<f64> {
    let m = knots.len();
    let mut b = vec![0.0; m - 1];
    b[span] = 1.0;

    for p in 1..=degree {
        for i in 0..(m - 1 - p) {
            let left = safe_ratio(x - knots[i], knots[i + p] - knots[i]) * b[i];
            let right =
                safe_ratio(knots[i + p + 1] - x, knots[i + p + 1] - knots[i + 1]) * b[i + 1];
            b[i] = left + right;
        }
    }

    b.truncate(m - 1 - degree);
    b
}

/// `num / den` with the B-spline convention 0/0 = 0 on repeated knots
fn safe_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
