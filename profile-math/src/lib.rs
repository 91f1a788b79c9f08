//! profile-math - Robust fitting of one-dimensional illumination profiles
//!
//! This crate provides the numerical core used to model smooth detector
//! response along one axis:
//!
//! - **Polynomial** - least-squares polynomials in a normalized coordinate
//! - **BSpline** - least-squares cubic regression splines on even knots
//! - **SigmaClipper** - iterative fit with RMS-multiple outlier rejection
//! - **Extrapolated** - tangent-line continuation beyond the fit domain
//!
//! # Example
//!
//! ```
//! use profile_math::{ClipConfig, Curve, Extrapolated, ModelSpec, SigmaClipper};
//!
//! let xs: Vec<f64> = (0..100).map(f64::from).collect();
//! let ys: Vec<f64> = xs.iter().map(|x| 1.0 + 0.02 * x).collect();
//!
//! let clipper = SigmaClipper::new(
//!     ModelSpec::Polynomial { degree: 1 },
//!     (10.0, 90.0),
//!     ClipConfig::default(),
//! )
//! .unwrap();
//! let outcome = clipper.fit(&xs[10..=90], &ys[10..=90]).unwrap();
//!
//! let curve = Extrapolated::new(outcome.model, (10.0, 90.0));
//! assert!((curve.value(0.0) - 1.0).abs() < 1e-9);
//! ```

pub mod bspline;
pub mod curve;
pub mod error;
pub mod extrapolate;
pub mod lstsq;
pub mod model;
pub mod polynomial;
pub mod sigma_clip;
pub mod stats;

pub use bspline::BSpline;
pub use curve::Curve;
pub use error::FitError;
pub use extrapolate::{Branch, Extrapolated, SampledCurve, Tangent};
pub use model::{FittedModel, ModelSpec};
pub use polynomial::Polynomial;
pub use sigma_clip::{ClipConfig, ClipOutcome, ClipState, CycleRecord, SigmaClipper};
