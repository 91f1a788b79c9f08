//! Error taxonomy of the normalization pipeline.

use profile_math::FitError;
use thiserror::Error;
use ucm::UcmError;

/// Bad argument values, detected before any file is touched
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("nccd must be at least 1, got {0}")]
    CcdIndex(i64),

    #[error("OK X range is empty: x1 = {x1} must be below x2 = {x2}")]
    OkRange { x1: i64, x2: i64 },

    #[error("Y extraction range is empty: y1 = {y1} must not exceed y2 = {y2}")]
    RowRange { y1: i64, y2: i64 },

    #[error("fit range [{xf1}, {xf2}] must be non-empty and lie inside the OK range [{x1}, {x2}]")]
    FitRange { xf1: i64, xf2: i64, x1: i64, x2: i64 },

    #[error("ncoeff must be non-zero (negative for a polynomial, positive for a spline)")]
    ZeroCoefficients,

    #[error("rejection threshold must be a finite value above 1, got {0}")]
    Threshold(f64),

    #[error("max-cycles must be at least 1")]
    ZeroCycles,

    #[error("timeout must be a positive number of seconds, got {0}")]
    Timeout(f64),

    #[error("unrecognised plot device '{0}' (use 'none' or a path ending in .png or .svg)")]
    Device(String),
}

/// Arguments that are valid on their own but do not match the frame
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("CCD {nccd} requested but the frame has {available} CCDs")]
    NoSuchCcd { nccd: usize, available: usize },

    #[error("no window covers the extraction rows {y1} to {y2}")]
    NoCoveringWindow { y1: i64, y2: i64 },

    #[error("no profile column lies inside the OK range [{x1}, {x2}]")]
    EmptyOkDomain { x1: i64, x2: i64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    /// A column inside the OK range has no exact counterpart on the curve grid
    #[error("column x={x} of window {window} is inside the OK range but off the fitted curve's grid")]
    GridMismatch { window: usize, x: i64 },

    #[error("non-finite {what} at column x={x}")]
    NonFinite { what: &'static str, x: i64 },
}

/// Any failure of a normalization run
#[derive(Error, Debug)]
pub enum SnormError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Ucm(#[from] UcmError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize fit report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("failed to draw fit plot: {0}")]
    Plot(String),
}
