//! Iterative sigma-clipping regression.
//!
//! Each cycle fits the model to the active samples, measures the RMS of the
//! active residuals and deactivates every sample whose residual is not below
//! `threshold × rms`. The loop stops as soon as a cycle rejects nothing.
//!
//! ```text
//!   Fitting ──(rejected > 0)──▶ Fitting
//!      │
//!      ├──(rejected == 0)─────────▶ Converged
//!      └──(degenerate / non-finite / cap / deadline)──▶ Failed
//! ```
//!
//! Every cycle works from an immutable [`ClipState`]; the next state is a new
//! value, so a cycle can never see a half-updated mask.

use log::debug;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::curve::Curve;
use crate::error::FitError;
use crate::model::{FittedModel, ModelSpec};
use crate::stats::{count_active, max_abs, rms};

/// Relative RMS below which a fit is treated as exact and nothing is clipped.
///
/// Without it a noise-free profile, whose residuals are pure round-off, would
/// have arbitrary samples rejected against a cutoff of a few ulps.
pub const EXACT_FIT_RMS: f64 = 1e-12;

/// Parameters of the clipping loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipConfig {
    /// Rejection threshold as a multiple of the RMS; must exceed 1
    pub threshold: f64,
    /// Maximum number of fit cycles before giving up
    pub max_cycles: usize,
    /// Optional wall-clock budget for the whole loop
    pub deadline: Option<Duration>,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            threshold: 3.0,
            max_cycles: 50,
            deadline: None,
        }
    }
}

impl ClipConfig {
    pub fn validate(&self) -> Result<(), FitError> {
        if !(self.threshold > 1.0) || !self.threshold.is_finite() {
            return Err(FitError::ArgumentError(format!(
                "rejection threshold must be a finite value > 1, got {}",
                self.threshold
            )));
        }
        if self.max_cycles == 0 {
            return Err(FitError::ArgumentError(
                "max_cycles must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Statistics of one fit cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Zero-based cycle index
    pub cycle: usize,
    /// Samples used by this cycle's fit
    pub n_active: usize,
    /// Pre-rejection RMS of the active residuals
    pub rms: f64,
    /// Samples rejected at the end of this cycle
    pub n_rejected: usize,
}

/// Input of one clipping cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ClipState {
    pub cycle: usize,
    pub active: Vec<bool>,
}

impl ClipState {
    /// First cycle: every sample active
    pub fn initial(n: usize) -> Self {
        Self {
            cycle: 0,
            active: vec![true; n],
        }
    }
}

/// Result of a converged clipping run
#[derive(Debug, Clone, PartialEq)]
pub struct ClipOutcome {
    pub model: FittedModel,
    /// Final active set, aligned with the input samples
    pub mask: Vec<bool>,
    pub cycles: Vec<CycleRecord>,
    /// X values of the rejected samples, in input order
    pub rejected_x: Vec<f64>,
}

impl ClipOutcome {
    /// RMS of the final, converged cycle
    pub fn final_rms(&self) -> f64 {
        self.cycles.last().map(|c| c.rms).unwrap_or(f64::NAN)
    }
}

/// What a single cycle produced
struct CycleStep {
    model: FittedModel,
    record: CycleRecord,
    next: ClipState,
}

/// Sigma-clipping fitter for one model family over one fit domain
#[derive(Debug, Clone)]
pub struct SigmaClipper {
    spec: ModelSpec,
    domain: (f64, f64),
    config: ClipConfig,
}

impl SigmaClipper {
    /// Create a fitter, validating the configuration.
    ///
    /// # Arguments
    /// * `spec` - Model family to fit
    /// * `domain` - (lo, hi) fit domain; spline knots and polynomial
    ///   normalization are derived from it
    /// * `config` - Threshold, cycle cap and deadline
    pub fn new(spec: ModelSpec, domain: (f64, f64), config: ClipConfig) -> Result<Self, FitError> {
        config.validate()?;
        if !(domain.0 < domain.1) {
            return Err(FitError::ArgumentError(format!(
                "fit domain [{}, {}] is empty",
                domain.0, domain.1
            )));
        }
        Ok(Self {
            spec,
            domain,
            config,
        })
    }

    pub fn spec(&self) -> ModelSpec {
        self.spec
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    /// Run the clipping loop to convergence.
    ///
    /// # Arguments
    /// * `xs`, `ys` - Samples inside the fit domain
    ///
    /// # Returns
    /// The converged model, final mask, per-cycle log and rejected x values.
    ///
    /// # Errors
    /// * `FitError::InsufficientSamples` / `FitError::RankDeficient` - the
    ///   active set cannot determine the model
    /// * `FitError::NonConvergence` - still rejecting after `max_cycles`
    /// * `FitError::DeadlineExceeded` - the deadline passed between cycles
    /// * `FitError::NonFinite` - NaN or infinity in data, fit or RMS
    pub fn fit(&self, xs: &[f64], ys: &[f64]) -> Result<ClipOutcome, FitError> {
        if xs.len() != ys.len() {
            return Err(FitError::MismatchedLengths {
                x_len: xs.len(),
                y_len: ys.len(),
            });
        }
        if let Some((&x, _)) = xs.iter().zip(ys).find(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(FitError::NonFinite {
                what: "observation",
                x,
            });
        }

        let started = Instant::now();
        let rms_floor = EXACT_FIT_RMS * max_abs(ys).max(1.0);
        let mut state = ClipState::initial(xs.len());
        let mut cycles = Vec::new();

        loop {
            if let Some(limit) = self.config.deadline {
                if started.elapsed() >= limit {
                    return Err(FitError::DeadlineExceeded {
                        limit_ms: limit.as_millis(),
                        cycles: cycles.len(),
                    });
                }
            }

            let step = self.cycle(&state, xs, ys, rms_floor)?;
            debug!(
                "clip cycle {}: {} active, rms={:.6e}, rejected {}",
                step.record.cycle, step.record.n_active, step.record.rms, step.record.n_rejected
            );
            cycles.push(step.record);

            if step.record.n_rejected == 0 {
                let rejected_x = xs
                    .iter()
                    .zip(&step.next.active)
                    .filter(|(_, &keep)| !keep)
                    .map(|(&x, _)| x)
                    .collect();
                return Ok(ClipOutcome {
                    model: step.model,
                    mask: step.next.active,
                    cycles,
                    rejected_x,
                });
            }

            if cycles.len() >= self.config.max_cycles {
                return Err(FitError::NonConvergence {
                    cycles: cycles.len(),
                    last_rejected: step.record.n_rejected,
                    last_rms: step.record.rms,
                });
            }

            state = step.next;
        }
    }

    /// One fit / measure / reject cycle
    fn cycle(
        &self,
        state: &ClipState,
        xs: &[f64],
        ys: &[f64],
        rms_floor: f64,
    ) -> Result<CycleStep, FitError> {
        let n_active = count_active(&state.active);
        let required = self.spec.degrees_of_freedom();
        if n_active < required {
            return Err(FitError::InsufficientSamples {
                active: n_active,
                required,
            });
        }

        let (active_x, active_y): (Vec<f64>, Vec<f64>) = xs
            .iter()
            .zip(ys)
            .zip(&state.active)
            .filter(|(_, &keep)| keep)
            .map(|((&x, &y), _)| (x, y))
            .unzip();

        let model = self.spec.fit(&active_x, &active_y, self.domain)?;
        if !model.is_finite() {
            return Err(FitError::NonFinite {
                what: "coefficient",
                x: active_x[0],
            });
        }

        // Residuals for every sample; only active ones enter the RMS
        let mut residuals = Vec::with_capacity(xs.len());
        for (&x, &y) in xs.iter().zip(ys) {
            let predicted = model.value(x);
            if !predicted.is_finite() {
                return Err(FitError::NonFinite {
                    what: "prediction",
                    x,
                });
            }
            residuals.push((y - predicted).abs());
        }
        let active_residuals: Vec<f64> = residuals
            .iter()
            .zip(&state.active)
            .filter(|(_, &keep)| keep)
            .map(|(&r, _)| r)
            .collect();
        let cycle_rms = rms(&active_residuals);
        if !cycle_rms.is_finite() {
            return Err(FitError::NonFinite {
                what: "rms",
                x: active_x[0],
            });
        }

        let next_active: Vec<bool> = if cycle_rms <= rms_floor {
            state.active.clone()
        } else {
            let cutoff = self.config.threshold * cycle_rms;
            state
                .active
                .iter()
                .zip(&residuals)
                .map(|(&keep, &r)| keep && r < cutoff)
                .collect()
        };
        let n_rejected = n_active - count_active(&next_active);

        Ok(CycleStep {
            model,
            record: CycleRecord {
                cycle: state.cycle,
                n_active,
                rms: cycle_rms,
                n_rejected,
            },
            next: ClipState {
                cycle: state.cycle + 1,
                active: next_active,
            },
        })
    }
}
