//! Division of window pixels by the exponentiated profile fit.
//!
//! The log-space curve is sampled once on the binned column grid spanning the
//! OK range and exponentiated. Every window column inside the OK range is
//! divided by the sample at exactly its X coordinate; columns outside the OK
//! range are handled according to the [`EdgePolicy`].

use log::debug;
use profile_math::{Curve, SampledCurve};
use ucm::Window;

use crate::config::EdgePolicy;
use crate::error::NormalizeError;

/// Columns of the binned grid through `anchor` that lie in `range`
pub fn curve_grid(anchor: i64, xbin: u32, range: (i64, i64)) -> Vec<i64> {
    let step = i64::from(xbin.max(1));
    let offset = (range.0 - anchor).rem_euclid(step);
    let first = if offset == 0 {
        range.0
    } else {
        range.0 + step - offset
    };
    (first..=range.1).step_by(step as usize).collect()
}

fn checked_divisor(x: i64, value: f64) -> Result<f64, NormalizeError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(NormalizeError::NonFinite {
            what: "exponentiated fit",
            x,
        })
    }
}

fn quotient(v: f32, d: f64) -> f32 {
    (f64::from(v) / d) as f32
}

/// Applies one fitted log profile to any number of windows
#[derive(Debug, Clone)]
pub struct Normalizer<C> {
    log_curve: C,
    linear: SampledCurve,
    ok_range: (i64, i64),
    policy: EdgePolicy,
}

impl<C: Curve> Normalizer<C> {
    /// Exponentiate `log_curve` on `grid`.
    ///
    /// # Arguments
    /// * `log_curve` - Fitted (and extrapolated) curve in log space
    /// * `grid` - Increasing column coordinates covering the OK range
    /// * `ok_range` - Inclusive OK column range
    /// * `policy` - Treatment of columns outside `ok_range`
    pub fn new(
        log_curve: C,
        grid: &[i64],
        ok_range: (i64, i64),
        policy: EdgePolicy,
    ) -> Result<Self, NormalizeError> {
        let linear = SampledCurve::sample(&log_curve, grid).map(f64::exp);
        for (&x, &v) in linear.xs.iter().zip(&linear.values) {
            checked_divisor(x, v)?;
        }
        Ok(Self {
            log_curve,
            linear,
            ok_range,
            policy,
        })
    }

    /// Exponentiated curve on the OK grid
    pub fn linear(&self) -> &SampledCurve {
        &self.linear
    }

    pub fn policy(&self) -> EdgePolicy {
        self.policy
    }

    /// Divisor for column `x` of window `window`, `None` if it is left alone
    pub fn divisor(&self, window: usize, x: i64) -> Result<Option<f64>, NormalizeError> {
        let (x1, x2) = self.ok_range;
        if x1 <= x && x <= x2 {
            return self
                .linear
                .get(x)
                .map(Some)
                .ok_or(NormalizeError::GridMismatch { window, x });
        }
        match self.policy {
            EdgePolicy::Leave => Ok(None),
            EdgePolicy::Extrapolate => {
                checked_divisor(x, self.log_curve.value(x as f64).exp()).map(Some)
            }
        }
    }

    /// Divisors of every column of `window`, checking that each quotient
    /// stays finite in `f32`
    fn column_divisors(
        &self,
        index: usize,
        window: &Window,
        xbin: u32,
    ) -> Result<Vec<Option<f64>>, NormalizeError> {
        (0..window.nx())
            .map(|col| {
                let x = window.column_x(col, xbin);
                let divisor = self.divisor(index, x)?;
                if let Some(d) = divisor {
                    let column = window.data.column(col);
                    if column.iter().any(|&v| !quotient(v, d).is_finite()) {
                        return Err(NormalizeError::NonFinite {
                            what: "normalized pixel",
                            x,
                        });
                    }
                }
                Ok(divisor)
            })
            .collect()
    }

    /// Divide every window in place.
    ///
    /// All divisors and quotients are checked before the first pixel changes,
    /// so on error the windows are untouched.
    pub fn normalize_in_place(
        &self,
        windows: &mut [Window],
        xbin: u32,
    ) -> Result<(), NormalizeError> {
        let divisors = windows
            .iter()
            .enumerate()
            .map(|(i, w)| self.column_divisors(i, w, xbin))
            .collect::<Result<Vec<_>, _>>()?;

        for (window, column_divisors) in windows.iter_mut().zip(divisors) {
            let mut n_divided = 0;
            let columns = window.data.columns_mut().into_iter();
            for (mut column, divisor) in columns.zip(column_divisors) {
                if let Some(d) = divisor {
                    column.mapv_inplace(|v| quotient(v, d));
                    n_divided += 1;
                }
            }
            debug!(
                "Window at ({}, {}): normalized {} of {} columns",
                window.llx,
                window.lly,
                n_divided,
                window.nx()
            );
        }
        Ok(())
    }

    /// Normalized copies of `windows`
    pub fn normalize(&self, windows: &[Window], xbin: u32) -> Result<Vec<Window>, NormalizeError> {
        let mut out = windows.to_vec();
        self.normalize_in_place(&mut out, xbin)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    /// ln y = a + b x
    #[derive(Debug)]
    struct LogLine {
        a: f64,
        b: f64,
    }

    impl Curve for LogLine {
        fn value(&self, x: f64) -> f64 {
            self.a + self.b * x
        }
        fn derivative(&self, _x: f64) -> f64 {
            self.b
        }
    }

    fn ones(llx: i32, nx: usize) -> Window {
        Window::new(llx, 1, Array2::from_elem((3, nx), 1.0))
    }

    #[test]
    fn test_curve_grid_alignment() {
        assert_eq!(curve_grid(11, 2, (1, 9)), vec![1, 3, 5, 7, 9]);
        assert_eq!(curve_grid(12, 2, (1, 9)), vec![2, 4, 6, 8]);
        assert_eq!(curve_grid(0, 3, (-4, 4)), vec![-3, 0, 3]);
        assert_eq!(curve_grid(5, 1, (5, 7)), vec![5, 6, 7]);
    }

    #[test]
    fn test_divides_ok_columns_and_leaves_edges() {
        let curve = LogLine { a: 2.0_f64.ln(), b: 0.0 };
        let normalizer =
            Normalizer::new(curve, &curve_grid(1, 1, (3, 6)), (3, 6), EdgePolicy::Leave).unwrap();

        let out = normalizer.normalize(&[ones(1, 8)], 1).unwrap();
        let row: Vec<f32> = out[0].data.row(0).to_vec();
        assert_eq!(row, vec![1.0, 1.0, 0.5, 0.5, 0.5, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_extrapolate_policy_divides_edges() {
        let curve = LogLine { a: 0.0, b: 0.1 };
        let normalizer =
            Normalizer::new(curve, &curve_grid(1, 1, (3, 6)), (3, 6), EdgePolicy::Extrapolate)
                .unwrap();

        let out = normalizer.normalize(&[ones(1, 8)], 1).unwrap();
        for (col, &v) in out[0].data.row(2).iter().enumerate() {
            let x = (col + 1) as f64;
            assert_relative_eq!(f64::from(v), (-0.1 * x).exp(), max_relative = 1e-6);
        }
    }

    #[test]
    fn test_binned_windows_share_grid() {
        let curve = LogLine { a: 0.0, b: 0.01 };
        let grid = curve_grid(1, 2, (1, 40));
        let normalizer = Normalizer::new(curve, &grid, (1, 40), EdgePolicy::Leave).unwrap();

        // Second window starts further along the same binned grid
        let mut windows = vec![ones(1, 10), ones(21, 10)];
        normalizer.normalize_in_place(&mut windows, 2).unwrap();
        let first = f64::from(windows[1].data[[0, 0]]);
        assert_relative_eq!(first, (-0.21_f64).exp(), max_relative = 1e-6);
        // x = 39 is the last column inside the OK range
        let last = f64::from(windows[1].data[[1, 9]]);
        assert_relative_eq!(last, (-0.39_f64).exp(), max_relative = 1e-6);
    }

    #[test]
    fn test_grid_mismatch_leaves_windows_untouched() {
        let curve = LogLine { a: 1.0, b: 0.0 };
        let grid = curve_grid(1, 2, (1, 40));
        let normalizer = Normalizer::new(curve, &grid, (1, 40), EdgePolicy::Leave).unwrap();

        let mut windows = vec![ones(1, 10), ones(22, 4)];
        let err = normalizer.normalize_in_place(&mut windows, 2).unwrap_err();
        assert_eq!(err, NormalizeError::GridMismatch { window: 1, x: 22 });
        assert!(windows.iter().all(|w| w.data.iter().all(|&v| v == 1.0)));
    }

    #[test]
    fn test_overflowing_fit_is_non_finite() {
        let curve = LogLine { a: 0.0, b: 100.0 };
        let err = Normalizer::new(curve, &[1, 2, 3, 4, 5, 6, 7, 8], (1, 8), EdgePolicy::Leave)
            .unwrap_err();
        assert_eq!(
            err,
            NormalizeError::NonFinite {
                what: "exponentiated fit",
                x: 8
            }
        );
    }

    #[test]
    fn test_overflowing_quotient_leaves_windows_untouched() {
        let curve = LogLine { a: -80.0, b: 0.0 };
        let normalizer = Normalizer::new(curve, &[1, 2, 3, 4], (1, 4), EdgePolicy::Leave).unwrap();

        let mut windows = vec![ones(1, 4), Window::new(1, 5, Array2::from_elem((2, 4), 1e10))];
        let err = normalizer.normalize_in_place(&mut windows, 1).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::NonFinite {
                what: "normalized pixel",
                x: 1
            }
        );
        assert!(windows[0].data.iter().all(|&v| v == 1.0));
        assert!(windows[1].data.iter().all(|&v| v == 1e10));
    }
}
