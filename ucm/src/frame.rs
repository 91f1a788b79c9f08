//! In-memory representation of a multi-CCD, multi-window frame.

use ndarray::Array2;
use std::ops::RangeInclusive;

use crate::error::UcmError;
use crate::header::Header;

/// Rectangular readout region of one CCD.
///
/// `data` is indexed `[row, column]` with row 0 at the bottom (lowest Y).
/// Coordinates are in unbinned detector pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Lower-left X pixel
    pub llx: i32,
    /// Lower-left Y pixel
    pub lly: i32,
    pub data: Array2<f32>,
}

impl Window {
    pub fn new(llx: i32, lly: i32, data: Array2<f32>) -> Self {
        Self { llx, lly, data }
    }

    /// Number of binned columns
    pub fn nx(&self) -> usize {
        self.data.ncols()
    }

    /// Number of binned rows
    pub fn ny(&self) -> usize {
        self.data.nrows()
    }

    /// X coordinate of binned column `col`
    pub fn column_x(&self, col: usize, xbin: u32) -> i64 {
        i64::from(self.llx) + i64::from(xbin) * col as i64
    }

    /// X coordinates of the first and last column, `None` for an empty window
    pub fn x_range(&self, xbin: u32) -> Option<RangeInclusive<i64>> {
        let nx = self.nx();
        (nx > 0).then(|| self.column_x(0, xbin)..=self.column_x(nx - 1, xbin))
    }

    /// Unbinned rows covered by the window, `None` for an empty window
    pub fn y_range(&self, ybin: u32) -> Option<RangeInclusive<i64>> {
        let ny = self.ny() as i64;
        let first = i64::from(self.lly);
        (ny > 0).then(|| first..=first + i64::from(ybin) * ny - 1)
    }
}

/// A complete frame: header, windows of every CCD and shared binning
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: Header,
    /// `ccds[nc][nw]` is window `nw` of CCD `nc` (both zero-based)
    pub ccds: Vec<Vec<Window>>,
    pub xbin: u32,
    pub ybin: u32,
    /// Maximum X dimension of the detector
    pub nxtot: u32,
    /// Maximum Y dimension of the detector
    pub nytot: u32,
}

impl Frame {
    pub fn nccd(&self) -> usize {
        self.ccds.len()
    }

    pub fn nwin(&self, ccd: usize) -> Result<usize, UcmError> {
        self.ccd(ccd).map(|windows| windows.len())
    }

    pub fn ccd(&self, ccd: usize) -> Result<&[Window], UcmError> {
        self.ccds
            .get(ccd)
            .map(Vec::as_slice)
            .ok_or(UcmError::NoSuchCcd {
                ccd,
                nccd: self.ccds.len(),
            })
    }

    pub fn ccd_mut(&mut self, ccd: usize) -> Result<&mut [Window], UcmError> {
        let nccd = self.ccds.len();
        self.ccds
            .get_mut(ccd)
            .map(Vec::as_mut_slice)
            .ok_or(UcmError::NoSuchCcd { ccd, nccd })
    }

    pub fn window(&self, ccd: usize, window: usize) -> Result<&Window, UcmError> {
        self.ccd(ccd)?
            .get(window)
            .ok_or(UcmError::NoSuchWindow { ccd, window })
    }

    pub fn window_mut(&mut self, ccd: usize, window: usize) -> Result<&mut Window, UcmError> {
        self.ccd_mut(ccd)?
            .get_mut(window)
            .ok_or(UcmError::NoSuchWindow { ccd, window })
    }

    /// Minimum pixel value over all windows of a CCD (0 if it has none)
    pub fn min(&self, ccd: usize) -> Result<f32, UcmError> {
        Ok(self
            .ccd(ccd)?
            .iter()
            .flat_map(|w| w.data.iter().copied())
            .reduce(f32::min)
            .unwrap_or(0.0))
    }

    /// Maximum pixel value over all windows of a CCD (0 if it has none)
    pub fn max(&self, ccd: usize) -> Result<f32, UcmError> {
        Ok(self
            .ccd(ccd)?
            .iter()
            .flat_map(|w| w.data.iter().copied())
            .reduce(f32::max)
            .unwrap_or(0.0))
    }

    /// True when both frames share CCD count, window layout and binning.
    /// Pixel values and headers are not compared.
    pub fn same_format(&self, other: &Frame) -> bool {
        if self.nccd() != other.nccd()
            || self.xbin != other.xbin
            || self.ybin != other.ybin
            || self.nxtot != other.nxtot
            || self.nytot != other.nytot
        {
            return false;
        }
        self.ccds.iter().zip(&other.ccds).all(|(a, b)| {
            a.len() == b.len()
                && a.iter().zip(b).all(|(wa, wb)| {
                    wa.llx == wb.llx && wa.lly == wb.lly && wa.data.dim() == wb.data.dim()
                })
        })
    }
}
