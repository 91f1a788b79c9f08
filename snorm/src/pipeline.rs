//! End-to-end normalization of one CCD of a frame.
//!
//! [`normalize_frame`] is the pure part: profile extraction, robust fit,
//! extrapolation and division, producing a new frame. [`run`] wraps it with
//! file input, an atomic output write, and the optional plot and report.

use log::info;
use profile_math::{ClipOutcome, Extrapolated, FittedModel, SampledCurve, SigmaClipper};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use ucm::{with_ucm_extension, Frame};

use crate::config::NormalizeConfig;
use crate::error::{ConfigurationError, SnormError};
use crate::normalize::{curve_grid, Normalizer};
use crate::plot;
use crate::profile::{Profile, ProfileExtractor};
use crate::report::FitReport;

/// Everything produced by one normalization
#[derive(Debug, Clone)]
pub struct Normalized {
    /// Copy of the input with the selected CCD normalized
    pub frame: Frame,
    pub profile: Profile,
    pub outcome: ClipOutcome,
    /// Converged fit with tangent-line continuation outside the fit range
    pub curve: Extrapolated<FittedModel>,
    /// `curve` sampled on the OK column grid, in log space
    pub log_grid: SampledCurve,
}

/// Sigma-clipped fit of the profile samples inside the fit range
pub fn fit_profile(profile: &Profile, config: &NormalizeConfig) -> Result<ClipOutcome, SnormError> {
    let (xs, ys) = profile.fit_samples(config.xf1, config.xf2);
    let clipper = SigmaClipper::new(config.model, config.fit_domain(), config.clip.clone())?;
    let outcome = clipper.fit(&xs, &ys)?;

    info!(
        "Fitted {} to {} samples: {} cycles, {} rejected, rms = {:.6}",
        config.model,
        xs.len(),
        outcome.cycles.len(),
        outcome.rejected_x.len(),
        outcome.final_rms()
    );
    Ok(outcome)
}

/// Normalize the configured CCD of `frame`, leaving `frame` untouched
pub fn normalize_frame(frame: &Frame, config: &NormalizeConfig) -> Result<Normalized, SnormError> {
    let ccd = config.ccd_index();
    let windows = frame.ccd(ccd).map_err(|_| ConfigurationError::NoSuchCcd {
        nccd: config.nccd,
        available: frame.nccd(),
    })?;

    let profile = ProfileExtractor::from_config(config).extract(windows, frame.xbin, frame.ybin)?;
    let outcome = fit_profile(&profile, config)?;
    let curve = Extrapolated::new(outcome.model.clone(), config.fit_domain());

    let (x1, x2) = config.ok_range();
    let anchor = profile
        .ok_samples()
        .next()
        .map(|(x, _)| x)
        .ok_or(ConfigurationError::EmptyOkDomain { x1, x2 })?;
    let grid = curve_grid(anchor, frame.xbin, config.ok_range());
    let log_grid = SampledCurve::sample(&curve, &grid);

    let mut normalized = frame.clone();
    Normalizer::new(&curve, &grid, config.ok_range(), config.edge_policy)?
        .normalize_in_place(normalized.ccd_mut(ccd)?, frame.xbin)?;

    Ok(Normalized {
        frame: normalized,
        profile,
        outcome,
        curve,
        log_grid,
    })
}

/// Write `frame` through a temporary file in the destination directory that
/// is renamed into place only once fully written. Returns the final path.
pub fn write_atomically(frame: &Frame, path: &Path) -> Result<PathBuf, SnormError> {
    let path = with_ucm_extension(path);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir)?;
    ucm::write_to(frame, BufWriter::new(tmp.as_file_mut()))?;
    tmp.persist(&path).map_err(|e| e.error)?;
    Ok(path)
}

/// Read, normalize, plot, report and write as configured
pub fn run(config: &NormalizeConfig) -> Result<Normalized, SnormError> {
    let frame = Frame::read(&config.input)?;
    info!(
        "Read {} with {} CCDs, binning {}x{}",
        with_ucm_extension(&config.input).display(),
        frame.nccd(),
        frame.xbin,
        frame.ybin
    );

    let normalized = normalize_frame(&frame, config)?;
    let written = write_atomically(&normalized.frame, &config.output)?;
    info!("Normalized frame written to {}", written.display());

    // Plot and report only describe an output that exists
    plot::render_fit(config, &normalized)?;
    if let Some(path) = &config.report {
        FitReport::new(config, &normalized).save_to_file(path)?;
        info!("Fit report written to {}", path.display());
    }
    Ok(normalized)
}
