//! Spectral profile extraction.
//!
//! The profile is the mean of all rows of the first window whose rows cover
//! the requested extraction range, one value per binned column. Columns
//! inside the OK range are replaced by the natural log of their mean; the
//! remaining columns keep their linear mean and are never fitted.

use log::{debug, warn};
use ucm::Window;

use crate::config::NormalizeConfig;
use crate::error::{ConfigurationError, SnormError};
use profile_math::FitError;

/// Mean column profile of one window
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Index of the source window within its CCD
    pub window: usize,
    pub xbin: u32,
    /// Column coordinates, increasing by `xbin`
    pub xs: Vec<i64>,
    /// ln(mean) for columns in the OK range, linear mean elsewhere
    pub values: Vec<f64>,
    pub ok_range: (i64, i64),
}

impl Profile {
    pub fn is_ok(&self, x: i64) -> bool {
        self.ok_range.0 <= x && x <= self.ok_range.1
    }

    /// (x, log value) pairs inside the OK range
    pub fn ok_samples(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.xs
            .iter()
            .zip(&self.values)
            .filter(|(&x, _)| self.is_ok(x))
            .map(|(&x, &v)| (x, v))
    }

    /// Log samples with `lo <= x <= hi`, as fit inputs
    pub fn fit_samples(&self, lo: i64, hi: i64) -> (Vec<f64>, Vec<f64>) {
        self.ok_samples()
            .filter(|&(x, _)| lo <= x && x <= hi)
            .map(|(x, v)| (x as f64, v))
            .unzip()
    }
}

/// Extracts the log profile described by a run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileExtractor {
    pub ok_range: (i64, i64),
    pub rows: (i64, i64),
}

impl ProfileExtractor {
    pub fn new(ok_range: (i64, i64), rows: (i64, i64)) -> Self {
        Self { ok_range, rows }
    }

    pub fn from_config(config: &NormalizeConfig) -> Self {
        Self::new(config.ok_range(), (config.y1, config.y2))
    }

    /// First window whose unbinned rows cover the whole extraction range
    pub fn find_covering_window(&self, windows: &[Window], ybin: u32) -> Option<usize> {
        let (y1, y2) = self.rows;
        let mut covering = windows.iter().enumerate().filter(|(_, w)| {
            w.y_range(ybin)
                .is_some_and(|rows| rows.contains(&y1) && rows.contains(&y2))
        });
        let (first, _) = covering.next()?;
        let others = covering.count();
        if others > 0 {
            warn!(
                "{} windows cover rows {}-{}; using window {}",
                others + 1,
                y1,
                y2,
                first + 1
            );
        }
        Some(first)
    }

    /// Build the log profile from one CCD's windows.
    ///
    /// # Errors
    /// * `ConfigurationError::NoCoveringWindow` - no window spans the rows
    /// * `ConfigurationError::EmptyOkDomain` - no column of the window falls
    ///   in the OK range
    /// * `FitError::NonFinite` - a mean inside the OK range has no logarithm
    pub fn extract(&self, windows: &[Window], xbin: u32, ybin: u32) -> Result<Profile, SnormError> {
        let (y1, y2) = self.rows;
        let index = self
            .find_covering_window(windows, ybin)
            .ok_or(ConfigurationError::NoCoveringWindow { y1, y2 })?;
        let window = &windows[index];

        let (xs, means) = mean_profile(window, xbin);
        let (x1, x2) = self.ok_range;
        let mut values = Vec::with_capacity(means.len());
        let mut n_ok = 0;
        for (&x, &mean) in xs.iter().zip(&means) {
            if x1 <= x && x <= x2 {
                let log = mean.ln();
                if !log.is_finite() {
                    return Err(FitError::NonFinite {
                        what: "log profile value",
                        x: x as f64,
                    }
                    .into());
                }
                values.push(log);
                n_ok += 1;
            } else {
                values.push(mean);
            }
        }
        if n_ok == 0 {
            return Err(ConfigurationError::EmptyOkDomain { x1, x2 }.into());
        }

        debug!(
            "Profile from window {}: {} columns, {} in OK range [{}, {}]",
            index + 1,
            xs.len(),
            n_ok,
            x1,
            x2
        );

        Ok(Profile {
            window: index,
            xbin,
            xs,
            values,
            ok_range: self.ok_range,
        })
    }
}

/// Column coordinates and the mean over all rows of each column
pub fn mean_profile(window: &Window, xbin: u32) -> (Vec<i64>, Vec<f64>) {
    let ny = window.ny() as f64;
    window
        .data
        .columns()
        .into_iter()
        .enumerate()
        .map(|(col, column)| {
            let sum: f64 = column.iter().map(|&v| f64::from(v)).sum();
            (window.column_x(col, xbin), sum / ny)
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    fn window(llx: i32, lly: i32, ny: usize, nx: usize, value: f32) -> Window {
        Window::new(llx, lly, Array2::from_elem((ny, nx), value))
    }

    #[test]
    fn test_find_covering_window_picks_first_match() {
        let windows = vec![
            window(1, 1, 10, 4, 1.0),
            window(1, 101, 50, 4, 1.0),
            window(1, 81, 100, 4, 1.0),
        ];
        let extractor = ProfileExtractor::new((1, 8), (120, 150));
        assert_eq!(extractor.find_covering_window(&windows, 1), Some(1));

        // 45 binned rows of height 2 starting at 101 cover rows 101 to 190
        let windows = vec![window(1, 101, 45, 4, 1.0)];
        let extractor = ProfileExtractor::new((1, 8), (150, 190));
        assert_eq!(extractor.find_covering_window(&windows, 2), Some(0));
        let extractor = ProfileExtractor::new((1, 8), (150, 191));
        assert_eq!(extractor.find_covering_window(&windows, 2), None);
    }

    #[test]
    fn test_partial_cover_is_not_enough() {
        let windows = vec![window(1, 1, 10, 4, 1.0), window(1, 11, 10, 4, 1.0)];
        let extractor = ProfileExtractor::new((1, 4), (5, 15));
        assert_eq!(extractor.find_covering_window(&windows, 1), None);
        assert!(matches!(
            extractor.extract(&windows, 1, 1),
            Err(SnormError::Configuration(
                ConfigurationError::NoCoveringWindow { y1: 5, y2: 15 }
            ))
        ));
    }

    #[test]
    fn test_mean_profile_averages_all_rows() {
        let w = Window::new(11, 1, array![[1.0, 2.0, 3.0], [3.0, 6.0, 9.0]]);
        let (xs, means) = mean_profile(&w, 2);
        assert_eq!(xs, vec![11, 13, 15]);
        assert_eq!(means, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_log_only_inside_ok_range() {
        let w = Window::new(1, 1, array![[1.0, 2.0, 4.0, 8.0], [1.0, 2.0, 4.0, 8.0]]);
        let extractor = ProfileExtractor::new((2, 3), (1, 2));
        let profile = extractor.extract(&[w], 1, 1).unwrap();

        assert_eq!(profile.window, 0);
        assert_eq!(profile.values[0], 1.0);
        assert_relative_eq!(profile.values[1], 2.0_f64.ln());
        assert_relative_eq!(profile.values[2], 4.0_f64.ln());
        assert_eq!(profile.values[3], 8.0);

        let ok: Vec<i64> = profile.ok_samples().map(|(x, _)| x).collect();
        assert_eq!(ok, vec![2, 3]);
        let (fx, fy) = profile.fit_samples(3, 3);
        assert_eq!(fx, vec![3.0]);
        assert_relative_eq!(fy[0], 4.0_f64.ln());
    }

    #[test]
    fn test_non_positive_mean_in_ok_range_is_non_finite() {
        let w = Window::new(1, 1, array![[1.0, -2.0, 0.0], [1.0, 1.0, 0.0]]);
        let extractor = ProfileExtractor::new((1, 3), (1, 2));
        match extractor.extract(&[w.clone()], 1, 1) {
            Err(SnormError::Fit(FitError::NonFinite { x, .. })) => assert_eq!(x, 2.0),
            other => panic!("unexpected result {other:?}"),
        }

        // The same columns are harmless outside the OK range
        let extractor = ProfileExtractor::new((1, 1), (1, 2));
        assert!(extractor.extract(&[w], 1, 1).is_ok());
    }

    #[test]
    fn test_empty_ok_domain() {
        let w = window(100, 1, 4, 10, 5.0);
        let extractor = ProfileExtractor::new((1, 50), (1, 4));
        assert!(matches!(
            extractor.extract(&[w], 1, 1),
            Err(SnormError::Configuration(
                ConfigurationError::EmptyOkDomain { x1: 1, x2: 50 }
            ))
        ));
    }
}
