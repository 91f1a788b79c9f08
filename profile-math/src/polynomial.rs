//! Least-squares polynomial profiles.
//!
//! Polynomials are fitted in a normalized variable `u = (x - center) / scale`
//! chosen so that the fit domain maps onto [-1, 1]. Raw detector coordinates
//! run to a few thousand, and a Vandermonde matrix built on them loses most
//! of its precision for anything beyond a cubic.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::error::FitError;
use crate::lstsq;

/// Polynomial in the normalized coordinate of its fit domain.
///
/// `coeffs` are ordered by descending degree, so `coeffs[0]` multiplies
/// `u^degree` and the last entry is the constant term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    pub coeffs: Vec<f64>,
    pub center: f64,
    pub scale: f64,
}

impl Polynomial {
    /// Fit a polynomial of the given degree to `(xs, ys)`.
    ///
    /// # Arguments
    /// * `xs`, `ys` - Samples to fit (same length)
    /// * `degree` - Polynomial degree; `degree + 1` coefficients are solved for
    /// * `domain` - (lo, hi) range used to normalize x
    ///
    /// # Errors
    /// * `FitError::InsufficientSamples` - fewer samples than coefficients
    /// * `FitError::RankDeficient` - samples do not determine the polynomial
    pub fn fit(
        xs: &[f64],
        ys: &[f64],
        degree: usize,
        domain: (f64, f64),
    ) -> Result<Self, FitError> {
        if xs.len() != ys.len() {
            return Err(FitError::MismatchedLengths {
                x_len: xs.len(),
                y_len: ys.len(),
            });
        }
        let ncoeff = degree + 1;
        if xs.len() < ncoeff {
            return Err(FitError::InsufficientSamples {
                active: xs.len(),
                required: ncoeff,
            });
        }

        let (center, scale) = normalization(domain);
        let design = DMatrix::from_fn(xs.len(), ncoeff, |row, col| {
            let u = (xs[row] - center) / scale;
            u.powi((degree - col) as i32)
        });
        let rhs = DVector::from_column_slice(ys);

        let solution = lstsq::solve(design, &rhs)?;
        Ok(Self {
            coeffs: solution.iter().copied().collect(),
            center,
            scale,
        })
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    fn to_u(&self, x: f64) -> f64 {
        (x - self.center) / self.scale
    }
}

impl Curve for Polynomial {
    fn value(&self, x: f64) -> f64 {
        let u = self.to_u(x);
        self.coeffs.iter().fold(0.0, |acc, &c| acc * u + c)
    }

    fn derivative(&self, x: f64) -> f64 {
        let u = self.to_u(x);
        let degree = self.degree();
        let dp_du = self
            .coeffs
            .iter()
            .take(degree)
            .enumerate()
            .fold(0.0, |acc, (i, &c)| acc * u + c * (degree - i) as f64);
        dp_du / self.scale
    }
}

/// Center and half-width mapping `domain` onto [-1, 1]
fn normalization(domain: (f64, f64)) -> (f64, f64) {
    let (lo, hi) = domain;
    let center = 0.5 * (lo + hi);
    let half_width = 0.5 * (hi - lo);
    if half_width > 0.0 {
        (center, half_width)
    } else {
        (center, 1.0)
    }
}
