//! End-to-end tests of profile fitting and frame normalization

use approx::assert_relative_eq;
use ndarray::Array2;
use profile_math::{ClipConfig, Curve, ModelSpec};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use snorm::{
    normalize_frame, ConfigurationError, EdgePolicy, FitReport, NormalizeConfig, NormalizeError,
    PlotDevice, SnormError,
};
use std::path::{Path, PathBuf};
use ucm::{Frame, Header, HeaderValue, Window};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two CCDs; CCD 1 has a 20-row profile window and a 10-row window at twice
/// the illumination, CCD 2 a single window.
fn synthetic_frame(illumination: impl Fn(i64) -> f64) -> Frame {
    let window = |lly: i32, ny: usize, scale: f64| {
        let data = Array2::from_shape_fn((ny, 100), |(_, col)| {
            (scale * illumination(col as i64 + 1)) as f32
        });
        Window::new(1, lly, data)
    };
    let mut header = Header::new();
    header.set("Instrument", HeaderValue::Str("spectrograph".into()), "");
    Frame {
        header,
        ccds: vec![
            vec![window(1, 20, 1.0), window(201, 10, 2.0)],
            vec![window(1, 20, 3.0)],
        ],
        xbin: 1,
        ybin: 1,
        nxtot: 100,
        nytot: 300,
    }
}

fn base_config(input: &Path, output: &Path) -> NormalizeConfig {
    NormalizeConfig {
        device: PlotDevice::None,
        nccd: 1,
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        x1: 5,
        x2: 95,
        y1: 5,
        y2: 15,
        xf1: 10,
        xf2: 90,
        model: ModelSpec::Polynomial { degree: 2 },
        clip: ClipConfig::default(),
        edge_policy: EdgePolicy::Leave,
        report: None,
    }
}

fn in_memory_config() -> NormalizeConfig {
    base_config(&PathBuf::from("in"), &PathBuf::from("out"))
}

#[test]
fn test_flat_profile_normalizes_to_uniform_image() {
    init_logging();
    let frame = synthetic_frame(|_| 1234.5);
    let config = NormalizeConfig {
        edge_policy: EdgePolicy::Extrapolate,
        ..in_memory_config()
    };

    let result = normalize_frame(&frame, &config).unwrap();
    assert!(result.outcome.rejected_x.is_empty());

    let ccd = result.frame.ccd(0).unwrap();
    assert!(ccd[0].data.iter().all(|&v| v == 1.0));
    assert!(ccd[1].data.iter().all(|&v| v == 2.0));
}

#[test]
fn test_unrejected_pixels_are_divided_by_fit() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(11);
    let noise: Vec<f64> = (0..=100).map(|_| rng.gen_range(-0.002..0.002)).collect();
    let spikes = [30_i64, 61];
    let illumination = move |x: i64| {
        let dx = (x - 50) as f64;
        let spike = if spikes.contains(&x) { 0.3 } else { 0.0 };
        (7.0 + 0.004 * dx - 2e-5 * dx * dx + noise[x as usize] + spike).exp()
    };
    let frame = synthetic_frame(illumination);
    let config = NormalizeConfig {
        model: ModelSpec::Spline { interior_knots: 4 },
        ..in_memory_config()
    };

    let result = normalize_frame(&frame, &config).unwrap();
    for x in spikes {
        assert!(result.outcome.rejected_x.contains(&(x as f64)));
    }

    let input = frame.window(0, 0).unwrap();
    let output = result.frame.window(0, 0).unwrap();
    let fit_xs = config.xf1..=config.xf2;
    assert_eq!(result.outcome.mask.len(), fit_xs.clone().count());

    for (x, &active) in fit_xs.zip(&result.outcome.mask) {
        if !active {
            continue;
        }
        let col = (x - 1) as usize;
        let expected = f64::from(input.data[[3, col]]) / result.curve.value(x as f64).exp();
        assert_relative_eq!(f64::from(output.data[[3, col]]), expected, max_relative = 1e-6);
    }
}

#[test]
fn test_leave_policy_and_other_ccds_untouched() {
    let frame = synthetic_frame(|x| 100.0 + x as f64);
    let result = normalize_frame(&frame, &in_memory_config()).unwrap();

    let input = frame.window(0, 0).unwrap();
    let output = result.frame.window(0, 0).unwrap();
    // Columns 1-4 and 96-100 lie outside the OK range
    for col in (0..4).chain(95..100) {
        assert_eq!(output.data.column(col), input.data.column(col));
    }
    assert_ne!(output.data.column(4), input.data.column(4));

    assert_eq!(result.frame.ccd(1).unwrap(), frame.ccd(1).unwrap());
    assert_eq!(result.frame.header, frame.header);
    assert!(result.frame.same_format(&frame));
}

#[test]
fn test_extraction_rows_without_covering_window() {
    let frame = synthetic_frame(|_| 10.0);
    let config = NormalizeConfig {
        y1: 15,
        y2: 205,
        ..in_memory_config()
    };
    match normalize_frame(&frame, &config) {
        Err(SnormError::Configuration(ConfigurationError::NoCoveringWindow { y1, y2 })) => {
            assert_eq!((y1, y2), (15, 205));
        }
        other => panic!("expected NoCoveringWindow, got {other:?}"),
    }
}

#[test]
fn test_ccd_beyond_frame() {
    let frame = synthetic_frame(|_| 10.0);
    let config = NormalizeConfig {
        nccd: 3,
        ..in_memory_config()
    };
    assert!(matches!(
        normalize_frame(&frame, &config),
        Err(SnormError::Configuration(ConfigurationError::NoSuchCcd {
            nccd: 3,
            available: 2
        }))
    ));
}

#[test]
fn test_degenerate_fit_range_is_fit_error() {
    let frame = synthetic_frame(|_| 10.0);
    // Three samples cannot determine a cubic spline with three knots
    let config = NormalizeConfig {
        xf1: 10,
        xf2: 12,
        model: ModelSpec::Spline { interior_knots: 3 },
        ..in_memory_config()
    };
    match normalize_frame(&frame, &config) {
        Err(SnormError::Fit(e)) => assert!(e.is_degeneracy()),
        other => panic!("expected a fit degeneracy, got {other:?}"),
    }
}

#[test]
fn test_run_writes_output_and_report() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let frame = synthetic_frame(|x| 500.0 * (1.0 + 0.001 * x as f64));
    frame.write(dir.path().join("flat")).unwrap();

    let config = NormalizeConfig {
        report: Some(dir.path().join("fit.json")),
        ..base_config(&dir.path().join("flat"), &dir.path().join("flat_norm"))
    };
    let result = snorm::run(&config).unwrap();

    let written = Frame::read(dir.path().join("flat_norm.ucm")).unwrap();
    assert!(written.same_format(&frame));
    assert_eq!(written, result.frame);

    let report = FitReport::load_from_file(&dir.path().join("fit.json")).unwrap();
    assert_eq!(report.config, config);
    assert_eq!(report.profile_window, 1);
    assert_eq!(report.n_fit_samples, 81);
    assert_eq!(report.cycles.len(), result.outcome.cycles.len());
    assert_eq!(report.rejected_x, result.outcome.rejected_x);
    let coeffs = result.outcome.model.coefficients();
    assert_eq!(report.model.coefficients().len(), coeffs.len());
    for (a, b) in report.model.coefficients().iter().zip(coeffs) {
        assert_relative_eq!(*a, *b, max_relative = 1e-12);
    }
}

#[test]
fn test_failed_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let frame = synthetic_frame(|_| 10.0);
    frame.write(dir.path().join("flat.ucm")).unwrap();

    let config = NormalizeConfig {
        y1: 400,
        y2: 410,
        report: Some(dir.path().join("fit.json")),
        ..base_config(&dir.path().join("flat.ucm"), &dir.path().join("flat_norm"))
    };
    assert!(snorm::run(&config).is_err());
    assert!(!dir.path().join("flat_norm.ucm").exists());
    assert!(!dir.path().join("fit.json").exists());

    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_unwritable_output_leaves_no_report() {
    let dir = tempfile::tempdir().unwrap();
    let frame = synthetic_frame(|_| 10.0);
    frame.write(dir.path().join("flat")).unwrap();

    let config = NormalizeConfig {
        report: Some(dir.path().join("fit.json")),
        ..base_config(
            &dir.path().join("flat"),
            &dir.path().join("missing").join("flat_norm"),
        )
    };
    assert!(matches!(snorm::run(&config), Err(SnormError::Io(_))));
    assert!(!dir.path().join("fit.json").exists());
}

#[test]
fn test_overflowing_pixels_fail_normalization() {
    // Profile window so faint that dividing the bright window overflows f32
    let mut frame = synthetic_frame(|_| 1e-35);
    frame.window_mut(0, 1).unwrap().data.fill(1e10);

    match normalize_frame(&frame, &in_memory_config()) {
        Err(SnormError::Normalize(NormalizeError::NonFinite { what, .. })) => {
            assert_eq!(what, "normalized pixel");
        }
        other => panic!("expected a non-finite pixel, got {other:?}"),
    }
}

#[test]
fn test_missing_input_propagates_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(&dir.path().join("absent"), &dir.path().join("out"));
    assert!(matches!(
        snorm::run(&config),
        Err(SnormError::Ucm(ucm::UcmError::Io(_)))
    ));
}
