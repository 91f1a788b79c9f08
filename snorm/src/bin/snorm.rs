//! Normalise the spectral response of a flat field.
//!
//! Usage:
//! ```text
//! snorm device nccd iname oname x1 x2 y1 y2 xf1 xf2 ncoeff [thresh]
//!       [--max-cycles N] [--timeout-secs S] [--edge-policy leave|extrapolate]
//!       [--report PATH]
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;
use snorm::{Args, NormalizeConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = NormalizeConfig::try_from(args).context("Invalid arguments")?;
    info!(
        "Normalising CCD {} of {} with a {}",
        config.nccd,
        config.input.display(),
        config.model
    );

    let normalized = snorm::run(&config).context("Normalization failed")?;
    if !normalized.outcome.rejected_x.is_empty() {
        info!("Rejected columns: {:?}", normalized.outcome.rejected_x);
    }
    Ok(())
}
