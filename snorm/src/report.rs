//! JSON summary of a normalization run.

use profile_math::{CycleRecord, FittedModel, Tangent};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::NormalizeConfig;
use crate::error::SnormError;
use crate::pipeline::Normalized;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub config: NormalizeConfig,
    /// 1-based window the profile was taken from
    pub profile_window: usize,
    pub description: String,
    pub model: FittedModel,
    pub lower_tangent: Tangent,
    pub upper_tangent: Tangent,
    pub n_fit_samples: usize,
    pub n_active: usize,
    pub cycles: Vec<CycleRecord>,
    pub rejected_x: Vec<f64>,
    pub final_rms: f64,
}

impl FitReport {
    pub fn new(config: &NormalizeConfig, run: &Normalized) -> Self {
        let outcome = &run.outcome;
        Self {
            config: config.clone(),
            profile_window: run.profile.window + 1,
            description: config.model.to_string(),
            model: outcome.model.clone(),
            lower_tangent: run.curve.lower(),
            upper_tangent: run.curve.upper(),
            n_fit_samples: outcome.mask.len(),
            n_active: outcome.mask.iter().filter(|&&keep| keep).count(),
            cycles: outcome.cycles.clone(),
            rejected_x: outcome.rejected_x.clone(),
            final_rms: outcome.final_rms(),
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), SnormError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, SnormError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
