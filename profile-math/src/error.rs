//! Error types shared by the profile fitting algorithms.

use thiserror::Error;

/// Errors that can occur while fitting or clipping a 1-D profile
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("Invalid argument: {0}")]
    ArgumentError(String),

    #[error("X and Y slices must have the same length ({x_len} vs {y_len})")]
    MismatchedLengths { x_len: usize, y_len: usize },

    /// Fewer active samples than free model parameters
    #[error("fit degeneracy: {active} active samples but the model needs at least {required}")]
    InsufficientSamples { active: usize, required: usize },

    /// Design matrix lost rank (e.g. no samples between two spline knots)
    #[error("fit degeneracy: design matrix rank {rank} is below the {required} model parameters")]
    RankDeficient { rank: usize, required: usize },

    #[error("no convergence after {cycles} clipping cycles (last cycle rejected {last_rejected} samples at rms={last_rms:.6e})")]
    NonConvergence {
        cycles: usize,
        last_rejected: usize,
        last_rms: f64,
    },

    #[error("clipping deadline of {limit_ms} ms exceeded after {cycles} cycles")]
    DeadlineExceeded { limit_ms: u128, cycles: usize },

    #[error("non-finite {what} encountered at x={x}")]
    NonFinite { what: &'static str, x: f64 },

    #[error("SVD decomposition failed: {0}")]
    SvdFailed(&'static str),
}

impl FitError {
    /// True for the failures where the model could not be determined from the
    /// active samples.
    pub fn is_degeneracy(&self) -> bool {
        matches!(
            self,
            FitError::InsufficientSamples { .. } | FitError::RankDeficient { .. }
        )
    }
}
