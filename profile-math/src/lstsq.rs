//! Linear least squares via singular value decomposition.

use nalgebra::{DMatrix, DVector};

use crate::error::FitError;

/// Solve `design * coeffs ≈ rhs` in the least-squares sense.
///
/// The SVD is used rather than the normal equations so that nearly collinear
/// columns are detected through the numerical rank instead of producing huge,
/// meaningless coefficients.
///
/// # Errors
/// * `FitError::RankDeficient` - rank of `design` is below its column count
/// * `FitError::SvdFailed` - nalgebra could not build U or Vᵀ
pub fn solve(design: DMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>, FitError> {
    let (nrows, ncols) = design.shape();
    let svd = design.svd(true, true);

    let sigma_max = svd.singular_values.max();
    let tolerance = sigma_max * f64::EPSILON * nrows.max(ncols) as f64;

    let rank = svd.rank(tolerance);
    if rank < ncols {
        return Err(FitError::RankDeficient {
            rank,
            required: ncols,
        });
    }

    svd.solve(rhs, tolerance).map_err(FitError::SvdFailed)
}
