//! Command line arguments and the validated run configuration built from them.
//!
//! Arguments are parsed once with clap and converted into a
//! [`NormalizeConfig`] by `TryFrom`, which performs every range check. The
//! rest of the pipeline only ever sees a validated configuration.

use clap::{Parser, ValueEnum};
use profile_math::{ClipConfig, ModelSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ValidationError;

/// Treatment of window columns outside the OK range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Leave the pixels unmodified
    #[default]
    Leave,
    /// Divide by the linear extrapolation of the fitted curve
    Extrapolate,
}

impl fmt::Display for EdgePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgePolicy::Leave => write!(f, "leave"),
            EdgePolicy::Extrapolate => write!(f, "extrapolate"),
        }
    }
}

/// Where the fit plot goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlotDevice {
    None,
    Png { path: PathBuf },
    Svg { path: PathBuf },
}

impl FromStr for PlotDevice {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        if matches!(lower.as_str(), "none" | "null" | "/null") {
            Ok(PlotDevice::None)
        } else if lower.ends_with(".png") {
            Ok(PlotDevice::Png {
                path: PathBuf::from(trimmed),
            })
        } else if lower.ends_with(".svg") {
            Ok(PlotDevice::Svg {
                path: PathBuf::from(trimmed),
            })
        } else {
            Err(ValidationError::Device(s.to_string()))
        }
    }
}

/// Positional arguments follow the classic order
/// `device nccd iname oname x1 x2 y1 y2 xf1 xf2 ncoeff [thresh]`.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "snorm",
    version,
    about = "Remove the spectral response from a flat field by fitting its log profile along X"
)]
pub struct Args {
    /// Plot device: 'none', or an output path ending in .png or .svg
    pub device: String,

    /// CCD to normalise (1-based)
    #[arg(allow_negative_numbers = true)]
    pub nccd: i64,

    /// Input frame ('.ucm' appended if missing)
    pub iname: PathBuf,

    /// Output frame ('.ucm' appended if missing)
    pub oname: PathBuf,

    /// First X column of the OK range
    #[arg(allow_negative_numbers = true)]
    pub x1: i64,

    /// Last X column of the OK range
    #[arg(allow_negative_numbers = true)]
    pub x2: i64,

    /// First row used to extract the profile
    #[arg(allow_negative_numbers = true)]
    pub y1: i64,

    /// Last row used to extract the profile
    #[arg(allow_negative_numbers = true)]
    pub y2: i64,

    /// First X column of the fit range
    #[arg(allow_negative_numbers = true)]
    pub xf1: i64,

    /// Last X column of the fit range
    #[arg(allow_negative_numbers = true)]
    pub xf2: i64,

    /// Negative: polynomial of degree |ncoeff|-1; positive: spline with ncoeff interior knots
    #[arg(allow_negative_numbers = true)]
    pub ncoeff: i32,

    /// Rejection threshold in multiples of the RMS
    #[arg(default_value_t = 3.0, allow_negative_numbers = true)]
    pub thresh: f64,

    /// Maximum number of reject-and-refit cycles
    #[arg(long, default_value_t = 50)]
    pub max_cycles: usize,

    /// Abort the fit if it has not converged after this many seconds
    #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
    pub timeout_secs: Option<f64>,

    /// What to do with columns outside the OK range
    #[arg(long, value_enum, default_value_t = EdgePolicy::Leave)]
    pub edge_policy: EdgePolicy,

    /// Write a JSON fit report to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

/// Validated configuration of one normalization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    pub device: PlotDevice,
    /// 1-based CCD index
    pub nccd: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    pub x1: i64,
    pub x2: i64,
    pub y1: i64,
    pub y2: i64,
    pub xf1: i64,
    pub xf2: i64,
    pub model: ModelSpec,
    pub clip: ClipConfig,
    pub edge_policy: EdgePolicy,
    pub report: Option<PathBuf>,
}

impl NormalizeConfig {
    /// Zero-based CCD index
    pub fn ccd_index(&self) -> usize {
        self.nccd - 1
    }

    pub fn ok_range(&self) -> (i64, i64) {
        (self.x1, self.x2)
    }

    pub fn fit_range(&self) -> (i64, i64) {
        (self.xf1, self.xf2)
    }

    /// Fit range as the floating point domain used by the models
    pub fn fit_domain(&self) -> (f64, f64) {
        (self.xf1 as f64, self.xf2 as f64)
    }

    /// Check every cross-field constraint
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.nccd == 0 {
            return Err(ValidationError::CcdIndex(0));
        }
        if self.x1 >= self.x2 {
            return Err(ValidationError::OkRange {
                x1: self.x1,
                x2: self.x2,
            });
        }
        if self.y1 > self.y2 {
            return Err(ValidationError::RowRange {
                y1: self.y1,
                y2: self.y2,
            });
        }
        if !(self.x1 <= self.xf1 && self.xf1 < self.xf2 && self.xf2 <= self.x2) {
            return Err(ValidationError::FitRange {
                xf1: self.xf1,
                xf2: self.xf2,
                x1: self.x1,
                x2: self.x2,
            });
        }
        let zero_sized = match self.model {
            ModelSpec::Polynomial { .. } => false,
            ModelSpec::Spline { interior_knots } => interior_knots == 0,
        };
        if zero_sized {
            return Err(ValidationError::ZeroCoefficients);
        }
        let t = self.clip.threshold;
        if !(t.is_finite() && t > 1.0) {
            return Err(ValidationError::Threshold(t));
        }
        if self.clip.max_cycles == 0 {
            return Err(ValidationError::ZeroCycles);
        }
        if self.clip.deadline.is_some_and(|d| d.is_zero()) {
            return Err(ValidationError::Timeout(0.0));
        }
        Ok(())
    }
}

impl TryFrom<Args> for NormalizeConfig {
    type Error = ValidationError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let nccd = usize::try_from(args.nccd)
            .ok()
            .filter(|&n| n >= 1)
            .ok_or(ValidationError::CcdIndex(args.nccd))?;
        let model =
            ModelSpec::from_ncoeff(args.ncoeff).map_err(|_| ValidationError::ZeroCoefficients)?;
        let deadline = match args.timeout_secs {
            None => None,
            Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => return Err(ValidationError::Timeout(secs)),
        };

        let config = NormalizeConfig {
            device: args.device.parse()?,
            nccd,
            input: args.iname,
            output: args.oname,
            x1: args.x1,
            x2: args.x2,
            y1: args.y1,
            y2: args.y2,
            xf1: args.xf1,
            xf2: args.xf2,
            model,
            clip: ClipConfig {
                threshold: args.thresh,
                max_cycles: args.max_cycles,
                deadline,
            },
            edge_policy: args.edge_policy,
            report: args.report,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<NormalizeConfig, ValidationError> {
        let mut argv = vec!["snorm"];
        argv.extend_from_slice(extra);
        NormalizeConfig::try_from(Args::try_parse_from(argv).unwrap())
    }

    const BASE: [&str; 11] = [
        "none", "2", "flat", "flat_norm", "1", "1000", "200", "300", "50", "950", "-5",
    ];

    fn with(index: usize, value: &'static str) -> Vec<&'static str> {
        let mut argv = BASE.to_vec();
        argv[index] = value;
        argv
    }

    #[test]
    fn test_valid_polynomial_config() {
        let config = parse(&BASE).unwrap();
        assert_eq!(config.device, PlotDevice::None);
        assert_eq!(config.nccd, 2);
        assert_eq!(config.ccd_index(), 1);
        assert_eq!(config.input, PathBuf::from("flat"));
        assert_eq!(config.ok_range(), (1, 1000));
        assert_eq!(config.fit_domain(), (50.0, 950.0));
        assert_eq!(config.model, ModelSpec::Polynomial { degree: 4 });
        assert_eq!(config.clip, ClipConfig::default());
        assert_eq!(config.edge_policy, EdgePolicy::Leave);
        assert!(config.report.is_none());
    }

    #[test]
    fn test_spline_and_options() {
        let mut argv = with(10, "6");
        argv.extend_from_slice(&[
            "2.5",
            "--max-cycles",
            "7",
            "--timeout-secs",
            "1.5",
            "--edge-policy",
            "extrapolate",
            "--report",
            "fit.json",
        ]);
        let config = parse(&argv).unwrap();
        assert_eq!(config.model, ModelSpec::Spline { interior_knots: 6 });
        assert_eq!(config.clip.threshold, 2.5);
        assert_eq!(config.clip.max_cycles, 7);
        assert_eq!(config.clip.deadline, Some(Duration::from_millis(1500)));
        assert_eq!(config.edge_policy, EdgePolicy::Extrapolate);
        assert_eq!(config.report, Some(PathBuf::from("fit.json")));
    }

    #[test]
    fn test_validation_failures() {
        assert_eq!(parse(&with(1, "0")), Err(ValidationError::CcdIndex(0)));
        assert_eq!(parse(&with(1, "-1")), Err(ValidationError::CcdIndex(-1)));
        assert_eq!(
            parse(&with(5, "1")),
            Err(ValidationError::OkRange { x1: 1, x2: 1 })
        );
        assert_eq!(
            parse(&with(7, "100")),
            Err(ValidationError::RowRange { y1: 200, y2: 100 })
        );
        assert!(matches!(
            parse(&with(8, "0")),
            Err(ValidationError::FitRange { xf1: 0, .. })
        ));
        assert!(matches!(
            parse(&with(9, "1001")),
            Err(ValidationError::FitRange { xf2: 1001, .. })
        ));
        assert!(matches!(
            parse(&with(9, "50")),
            Err(ValidationError::FitRange { .. })
        ));
        assert_eq!(parse(&with(10, "0")), Err(ValidationError::ZeroCoefficients));
        assert_eq!(
            parse(&with(0, "fit.ps")),
            Err(ValidationError::Device("fit.ps".to_string()))
        );

        let mut argv = BASE.to_vec();
        argv.push("1.0");
        assert_eq!(parse(&argv), Err(ValidationError::Threshold(1.0)));

        let mut argv = BASE.to_vec();
        argv.extend_from_slice(&["--max-cycles", "0"]);
        assert_eq!(parse(&argv), Err(ValidationError::ZeroCycles));

        let mut argv = BASE.to_vec();
        argv.extend_from_slice(&["--timeout-secs", "-2"]);
        assert_eq!(parse(&argv), Err(ValidationError::Timeout(-2.0)));
    }

    #[test]
    fn test_fit_range_may_touch_ok_range() {
        let mut argv = with(8, "1");
        argv[9] = "1000";
        let config = parse(&argv).unwrap();
        assert_eq!(config.fit_range(), config.ok_range());
    }

    #[test]
    fn test_plot_device_parsing() {
        assert_eq!("NULL".parse::<PlotDevice>(), Ok(PlotDevice::None));
        assert_eq!(
            "plots/fit.PNG".parse::<PlotDevice>(),
            Ok(PlotDevice::Png {
                path: PathBuf::from("plots/fit.PNG")
            })
        );
        assert_eq!(
            "fit.svg".parse::<PlotDevice>(),
            Ok(PlotDevice::Svg {
                path: PathBuf::from("fit.svg")
            })
        );
    }

    #[test]
    fn test_config_serializes_for_report() {
        let config = parse(&BASE).unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["model"]["kind"], "polynomial");
        assert_eq!(json["edge_policy"], "leave");
        assert_eq!(json["device"]["kind"], "none");
    }
}
