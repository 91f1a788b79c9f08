//! ucm - Reader and writer for multi-CCD, multi-window detector frames
//!
//! A frame holds an ordered typed header plus, for every CCD, a list of
//! rectangular windows of pixel data sharing one binning factor.
//!
//! ```no_run
//! use ucm::Frame;
//!
//! let mut frame = Frame::read("flat.ucm")?;
//! let peak = frame.max(0)?;
//! for win in frame.ccd_mut(0)? {
//!     win.data.mapv_inplace(|v| v / peak);
//! }
//! frame.write("flat_scaled")?;
//! # Ok::<(), ucm::UcmError>(())
//! ```

pub mod error;
pub mod frame;
pub mod header;
pub mod io;

pub use error::UcmError;
pub use frame::{Frame, Window};
pub use header::{Header, HeaderItem, HeaderValue};
pub use io::{read_from, with_ucm_extension, write_to, MAGIC};
