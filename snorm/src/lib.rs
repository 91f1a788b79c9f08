//! Spectral normalization of flat-field frames
//!
//! A flat field taken through a spectrograph carries the spectral response
//! of lamp, grating and detector along X. This crate removes it: the mean
//! profile of a window is fitted in log space with a sigma-clipped
//! polynomial or spline, continued linearly beyond the fit range, and every
//! window of the CCD is divided by the exponentiated curve.

pub mod config;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod plot;
pub mod profile;
pub mod report;

pub use config::{Args, EdgePolicy, NormalizeConfig, PlotDevice};
pub use error::{ConfigurationError, NormalizeError, SnormError, ValidationError};
pub use normalize::Normalizer;
pub use pipeline::{normalize_frame, run, Normalized};
pub use profile::{Profile, ProfileExtractor};
pub use report::FitReport;
