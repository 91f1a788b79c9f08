//! One-dimensional curve abstraction shared by fitted models and their
//! extrapolations.

/// A smooth curve y(x) that can report its value and first derivative.
pub trait Curve {
    /// Value of the curve at `x`
    fn value(&self, x: f64) -> f64;

    /// First derivative dy/dx at `x`
    fn derivative(&self, x: f64) -> f64;

    /// Evaluate the curve at every point of `xs`
    fn values(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.value(x)).collect()
    }
}

impl<C: Curve + ?Sized> Curve for &C {
    fn value(&self, x: f64) -> f64 {
        (**self).value(x)
    }

    fn derivative(&self, x: f64) -> f64 {
        (**self).derivative(x)
    }
}
