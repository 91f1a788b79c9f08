//! Binary ucm reader and writer.
//!
//! Layout (every integer is a 4-byte `i32`):
//!
//! ```text
//! magic
//! nitems, then per item: name, type code, comment, value
//! nccd, then per CCD: nwin, then per window:
//!     llx lly nx ny xbin ybin nxtot nytot iout, then nx*ny pixels
//! ```
//!
//! Strings are an `i32` byte count followed by the bytes. Files written on
//! big-endian machines are recognised from the byte order of the magic
//! number. Pixels are `f32` when `iout == 0` and `u16` when `iout == 1`.
//! Frames are always written little-endian with `f32` pixels.

use log::debug;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::UcmError;
use crate::frame::{Frame, Window};
use crate::header::{type_code, Header, HeaderValue};

/// Format identifier stored in the first word of every ucm file
pub const MAGIC: i32 = 47561009;

/// Largest element count accepted for a single vector or string before the
/// data is considered corrupt
const MAX_ELEMENTS: usize = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

/// Append `.ucm` to `path` unless it already ends with it
pub fn with_ucm_extension(path: &Path) -> PathBuf {
    if path.to_string_lossy().ends_with(".ucm") {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(".ucm");
        PathBuf::from(name)
    }
}

struct ByteReader<R> {
    inner: R,
    endian: Endian,
}

macro_rules! read_scalar {
    ($name:ident, $ty:ty) => {
        fn $name(&mut self) -> Result<$ty, UcmError> {
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            self.inner.read_exact(&mut buf)?;
            Ok(match self.endian {
                Endian::Little => <$ty>::from_le_bytes(buf),
                Endian::Big => <$ty>::from_be_bytes(buf),
            })
        }
    };
}

impl<R: Read> ByteReader<R> {
    read_scalar!(read_i32, i32);
    read_scalar!(read_u32, u32);
    read_scalar!(read_u16, u16);
    read_scalar!(read_f32, f32);
    read_scalar!(read_f64, f64);

    fn read_u8(&mut self) -> Result<u8, UcmError> {
        let mut buf = [0u8; 1];
        self.inner.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_count(&mut self, what: &str) -> Result<usize, UcmError> {
        let n = self.read_i32()?;
        usize::try_from(n)
            .ok()
            .filter(|&n| n <= MAX_ELEMENTS)
            .ok_or_else(|| UcmError::Format(format!("invalid {what} count {n}")))
    }

    fn read_string(&mut self) -> Result<String, UcmError> {
        let len = self.read_count("string length")?;
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| UcmError::Format(format!("string is not UTF-8: {e}")))
    }

    fn read_vec<T>(
        &mut self,
        n: usize,
        mut read_one: impl FnMut(&mut Self) -> Result<T, UcmError>,
    ) -> Result<Vec<T>, UcmError> {
        (0..n).map(|_| read_one(self)).collect()
    }

    fn read_value(&mut self, name: &str, code: i32) -> Result<HeaderValue, UcmError> {
        use type_code::*;
        let value = match code {
            DOUBLE => HeaderValue::Double(self.read_f64()?),
            INT => HeaderValue::Int(self.read_i32()?),
            UINT => HeaderValue::UInt(self.read_u32()?),
            FLOAT => HeaderValue::Float(self.read_f32()?),
            STRING => HeaderValue::Str(self.read_string()?),
            BOOL => HeaderValue::Bool(self.read_u8()? != 0),
            DIR => HeaderValue::Dir,
            TIME => HeaderValue::Time {
                mjd: self.read_i32()?,
                hour: self.read_f64()?,
            },
            DVECTOR => {
                let n = self.read_count("vector")?;
                HeaderValue::DVector(self.read_vec(n, Self::read_f64)?)
            }
            UCHAR => HeaderValue::UChar(self.read_u8()?),
            USINT => HeaderValue::USInt(self.read_u16()?),
            IVECTOR => {
                let n = self.read_count("vector")?;
                HeaderValue::IVector(self.read_vec(n, Self::read_i32)?)
            }
            FVECTOR => {
                let n = self.read_count("vector")?;
                HeaderValue::FVector(self.read_vec(n, Self::read_f32)?)
            }
            _ => {
                return Err(UcmError::UnsupportedHeaderType {
                    name: name.to_string(),
                    code,
                })
            }
        };
        Ok(value)
    }
}

fn detect_endian(word: [u8; 4]) -> Result<Endian, UcmError> {
    if i32::from_le_bytes(word) == MAGIC {
        Ok(Endian::Little)
    } else if i32::from_be_bytes(word) == MAGIC {
        Ok(Endian::Big)
    } else {
        Err(UcmError::BadMagic(u32::from_le_bytes(word)))
    }
}

fn non_negative(value: i32, what: &str) -> Result<u32, UcmError> {
    u32::try_from(value).map_err(|_| UcmError::Format(format!("negative {what} {value}")))
}

fn positive(value: i32, what: &str) -> Result<u32, UcmError> {
    match non_negative(value, what)? {
        0 => Err(UcmError::Format(format!("zero {what}"))),
        v => Ok(v),
    }
}

/// Decode a frame from any byte source
pub fn read_from<R: Read>(mut source: R) -> Result<Frame, UcmError> {
    let mut word = [0u8; 4];
    source.read_exact(&mut word)?;
    let endian = detect_endian(word)?;
    let mut r = ByteReader {
        inner: source,
        endian,
    };

    let nitems = r.read_count("header item")?;
    let mut header = Header::new();
    for _ in 0..nitems {
        let name = r.read_string()?;
        let code = r.read_i32()?;
        let comment = r.read_string()?;
        let value = r.read_value(&name, code)?;
        header.set(name, value, comment);
    }

    // Binning is stored per window but is a property of the whole frame
    let mut binning: Option<[u32; 4]> = None;

    let nccd = r.read_count("CCD")?;
    let mut ccds = Vec::with_capacity(nccd.min(16));
    for nc in 0..nccd {
        let nwin = r.read_count("window")?;
        let mut windows = Vec::with_capacity(nwin.min(64));
        for nw in 0..nwin {
            let llx = r.read_i32()?;
            let lly = r.read_i32()?;
            let nx = non_negative(r.read_i32()?, "nx")? as usize;
            let ny = non_negative(r.read_i32()?, "ny")? as usize;
            let this = [
                positive(r.read_i32()?, "xbin")?,
                positive(r.read_i32()?, "ybin")?,
                non_negative(r.read_i32()?, "nxtot")?,
                non_negative(r.read_i32()?, "nytot")?,
            ];
            match binning {
                None => binning = Some(this),
                Some(first) if first != this => {
                    return Err(UcmError::Format(format!(
                        "CCD {nc} window {nw} has binning/size {this:?}, expected {first:?}"
                    )))
                }
                Some(_) => {}
            }

            let npix = nx
                .checked_mul(ny)
                .filter(|&n| n <= MAX_ELEMENTS)
                .ok_or_else(|| {
                    UcmError::Format(format!("window of {nx}x{ny} pixels is too large"))
                })?;
            let pixels = match r.read_i32()? {
                0 => r.read_vec(npix, ByteReader::read_f32)?,
                1 => r.read_vec(npix, |r| r.read_u16().map(f32::from))?,
                iout => {
                    return Err(UcmError::Format(format!(
                        "unrecognised pixel output type {iout}"
                    )))
                }
            };
            let data = Array2::from_shape_vec((ny, nx), pixels)
                .map_err(|e| UcmError::Format(e.to_string()))?;
            windows.push(Window::new(llx, lly, data));
        }
        ccds.push(windows);
    }

    let [xbin, ybin, nxtot, nytot] = binning.unwrap_or([1, 1, 0, 0]);
    debug!(
        "Read ucm frame: {} header items, {} CCDs, binning {}x{}, {:?} byte order",
        header.len(),
        ccds.len(),
        xbin,
        ybin,
        endian
    );

    Ok(Frame {
        header,
        ccds,
        xbin,
        ybin,
        nxtot,
        nytot,
    })
}

fn write_i32<W: Write>(w: &mut W, v: i32) -> Result<(), UcmError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_len<W: Write>(w: &mut W, len: usize) -> Result<(), UcmError> {
    let n = i32::try_from(len).map_err(|_| UcmError::Format(format!("length {len} too large")))?;
    write_i32(w, n)
}

fn write_string<W: Write>(w: &mut W, s: &str) -> Result<(), UcmError> {
    write_len(w, s.len())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn write_value<W: Write>(w: &mut W, value: &HeaderValue) -> Result<(), UcmError> {
    match value {
        HeaderValue::Double(v) => w.write_all(&v.to_le_bytes())?,
        HeaderValue::Int(v) => w.write_all(&v.to_le_bytes())?,
        HeaderValue::UInt(v) => w.write_all(&v.to_le_bytes())?,
        HeaderValue::Float(v) => w.write_all(&v.to_le_bytes())?,
        HeaderValue::Str(s) => write_string(w, s)?,
        HeaderValue::Bool(b) => w.write_all(&[u8::from(*b)])?,
        HeaderValue::Dir => {}
        HeaderValue::Time { mjd, hour } => {
            w.write_all(&mjd.to_le_bytes())?;
            w.write_all(&hour.to_le_bytes())?;
        }
        HeaderValue::DVector(vs) => {
            write_len(w, vs.len())?;
            for v in vs {
                w.write_all(&v.to_le_bytes())?;
            }
        }
        HeaderValue::UChar(c) => w.write_all(&[*c])?,
        HeaderValue::USInt(v) => w.write_all(&v.to_le_bytes())?,
        HeaderValue::IVector(vs) => {
            write_len(w, vs.len())?;
            for v in vs {
                w.write_all(&v.to_le_bytes())?;
            }
        }
        HeaderValue::FVector(vs) => {
            write_len(w, vs.len())?;
            for v in vs {
                w.write_all(&v.to_le_bytes())?;
            }
        }
    }
    Ok(())
}

fn dimension(value: impl TryInto<i32>, what: &str) -> Result<i32, UcmError> {
    value
        .try_into()
        .map_err(|_| UcmError::Format(format!("{what} does not fit in a 32-bit field")))
}

/// Encode a frame to any byte sink
pub fn write_to<W: Write>(frame: &Frame, mut sink: W) -> Result<(), UcmError> {
    write_i32(&mut sink, MAGIC)?;

    write_len(&mut sink, frame.header.len())?;
    for (name, item) in frame.header.iter() {
        write_string(&mut sink, name)?;
        write_i32(&mut sink, item.value.type_code())?;
        write_string(&mut sink, &item.comment)?;
        write_value(&mut sink, &item.value)?;
    }

    let bins = [
        dimension(frame.xbin, "xbin")?,
        dimension(frame.ybin, "ybin")?,
        dimension(frame.nxtot, "nxtot")?,
        dimension(frame.nytot, "nytot")?,
    ];

    write_len(&mut sink, frame.ccds.len())?;
    for windows in &frame.ccds {
        write_len(&mut sink, windows.len())?;
        for win in windows {
            write_i32(&mut sink, win.llx)?;
            write_i32(&mut sink, win.lly)?;
            write_i32(&mut sink, dimension(win.nx(), "nx")?)?;
            write_i32(&mut sink, dimension(win.ny(), "ny")?)?;
            for b in bins {
                write_i32(&mut sink, b)?;
            }
            write_i32(&mut sink, 0)?;
            // Logical iteration order is row-major regardless of memory layout
            for v in win.data.iter() {
                sink.write_all(&v.to_le_bytes())?;
            }
        }
    }
    sink.flush()?;
    Ok(())
}

impl Frame {
    /// Read a frame from disk, appending `.ucm` to the path when missing
    pub fn read(path: impl AsRef<Path>) -> Result<Frame, UcmError> {
        let path = with_ucm_extension(path.as_ref());
        debug!("Reading ucm frame from {}", path.display());
        read_from(BufReader::new(File::open(&path)?))
    }

    /// Write a frame to disk, appending `.ucm` to the path when missing.
    /// Returns the path actually written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<PathBuf, UcmError> {
        let path = with_ucm_extension(path.as_ref());
        debug!("Writing ucm frame to {}", path.display());
        write_to(self, BufWriter::new(File::create(&path)?))?;
        Ok(path)
    }
}
