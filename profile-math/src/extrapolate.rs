//! Linear continuation of a fitted curve beyond its fit domain.
//!
//! High-order polynomials and splines swing wildly outside the range they
//! were fitted on. Beyond each end of the fit domain the curve is therefore
//! replaced by its tangent line at that end, which keeps the result
//! continuous and once differentiable at both boundaries.

use serde::{Deserialize, Serialize};

use crate::curve::Curve;

/// Value and slope of a curve at one end of its fit domain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tangent {
    pub x: f64,
    pub value: f64,
    pub slope: f64,
}

impl Tangent {
    pub fn of<C: Curve>(curve: &C, x: f64) -> Self {
        Self {
            x,
            value: curve.value(x),
            slope: curve.derivative(x),
        }
    }

    pub fn at(&self, x: f64) -> f64 {
        self.value + self.slope * (x - self.x)
    }
}

/// Which rule produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Below,
    Interior,
    Above,
}

/// A curve evaluated directly on [lo, hi] and along its end tangents outside
#[derive(Debug, Clone, PartialEq)]
pub struct Extrapolated<C> {
    curve: C,
    lower: Tangent,
    upper: Tangent,
}

impl<C: Curve> Extrapolated<C> {
    /// Wrap `curve`, freezing its tangents at `domain.0` and `domain.1`
    pub fn new(curve: C, domain: (f64, f64)) -> Self {
        let lower = Tangent::of(&curve, domain.0);
        let upper = Tangent::of(&curve, domain.1);
        Self {
            curve,
            lower,
            upper,
        }
    }

    pub fn inner(&self) -> &C {
        &self.curve
    }

    pub fn lower(&self) -> Tangent {
        self.lower
    }

    pub fn upper(&self) -> Tangent {
        self.upper
    }

    /// Boundary points belong to the interior
    pub fn branch(&self, x: f64) -> Branch {
        if x < self.lower.x {
            Branch::Below
        } else if x > self.upper.x {
            Branch::Above
        } else {
            Branch::Interior
        }
    }
}

impl<C: Curve> Curve for Extrapolated<C> {
    fn value(&self, x: f64) -> f64 {
        match self.branch(x) {
            Branch::Below => self.lower.at(x),
            Branch::Interior => self.curve.value(x),
            Branch::Above => self.upper.at(x),
        }
    }

    fn derivative(&self, x: f64) -> f64 {
        match self.branch(x) {
            Branch::Below => self.lower.slope,
            Branch::Interior => self.curve.derivative(x),
            Branch::Above => self.upper.slope,
        }
    }
}

/// Predicted values on an integer pixel grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledCurve {
    /// Strictly increasing pixel coordinates
    pub xs: Vec<i64>,
    pub values: Vec<f64>,
}

impl SampledCurve {
    /// Evaluate `curve` at each pixel of `xs`
    pub fn sample<C: Curve>(curve: &C, xs: &[i64]) -> Self {
        Self {
            xs: xs.to_vec(),
            values: xs.iter().map(|&x| curve.value(x as f64)).collect(),
        }
    }

    /// Exact lookup; `None` when `x` is not one of the sampled pixels
    pub fn get(&self, x: i64) -> Option<f64> {
        self.xs.binary_search(&x).ok().map(|i| self.values[i])
    }

    /// (first, last) sampled pixel
    pub fn range(&self) -> Option<(i64, i64)> {
        Some((*self.xs.first()?, *self.xs.last()?))
    }

    /// Same grid, values passed through `f`
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            xs: self.xs.clone(),
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}
