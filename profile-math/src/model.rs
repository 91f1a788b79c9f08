//! Model families for profile fitting and the fitted result.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bspline::{even_interior_knots, BSpline, CUBIC};
use crate::curve::Curve;
use crate::error::FitError;
use crate::polynomial::Polynomial;

/// Which kind of curve to fit, and how flexible it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Polynomial { degree: usize },
    /// Cubic spline with evenly spaced interior knots
    Spline { interior_knots: usize },
}

impl ModelSpec {
    /// Decode the signed coefficient count used on the command line.
    ///
    /// Negative values select a polynomial of degree `|ncoeff| - 1`, positive
    /// values a cubic spline with `ncoeff` interior knots. Zero is rejected.
    pub fn from_ncoeff(ncoeff: i32) -> Result<Self, FitError> {
        match ncoeff {
            0 => Err(FitError::ArgumentError(
                "ncoeff must be non-zero".to_string(),
            )),
            n if n < 0 => Ok(ModelSpec::Polynomial {
                degree: n.unsigned_abs() as usize - 1,
            }),
            n => Ok(ModelSpec::Spline {
                interior_knots: n as usize,
            }),
        }
    }

    /// Number of free parameters, i.e. the minimum number of active samples
    pub fn degrees_of_freedom(&self) -> usize {
        match *self {
            ModelSpec::Polynomial { degree } => degree + 1,
            ModelSpec::Spline { interior_knots } => interior_knots + CUBIC + 1,
        }
    }

    /// Least-squares fit of this model family over `domain`
    pub fn fit(&self, xs: &[f64], ys: &[f64], domain: (f64, f64)) -> Result<FittedModel, FitError> {
        match *self {
            ModelSpec::Polynomial { degree } => {
                Polynomial::fit(xs, ys, degree, domain).map(FittedModel::Polynomial)
            }
            ModelSpec::Spline { interior_knots } => {
                let interior = even_interior_knots(domain, interior_knots);
                BSpline::fit(xs, ys, &interior, CUBIC, domain).map(FittedModel::Spline)
            }
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSpec::Polynomial { degree } => write!(f, "polynomial of degree {degree}"),
            ModelSpec::Spline { interior_knots } => {
                write!(f, "cubic spline with {interior_knots} interior knots")
            }
        }
    }
}

/// A converged (or intermediate) fit of one model family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedModel {
    Polynomial(Polynomial),
    Spline(BSpline),
}

impl FittedModel {
    /// Coefficients in the model's own ordering (descending degree for
    /// polynomials, one per basis function for splines)
    pub fn coefficients(&self) -> &[f64] {
        match self {
            FittedModel::Polynomial(p) => &p.coeffs,
            FittedModel::Spline(s) => &s.coeffs,
        }
    }

    /// True when every coefficient is finite
    pub fn is_finite(&self) -> bool {
        self.coefficients().iter().all(|c| c.is_finite())
    }
}

impl Curve for FittedModel {
    fn value(&self, x: f64) -> f64 {
        match self {
            FittedModel::Polynomial(p) => p.value(x),
            FittedModel::Spline(s) => s.value(x),
        }
    }

    fn derivative(&self, x: f64) -> f64 {
        match self {
            FittedModel::Polynomial(p) => p.derivative(x),
            FittedModel::Spline(s) => s.derivative(x),
        }
    }
}
