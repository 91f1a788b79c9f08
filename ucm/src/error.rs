use thiserror::Error;

/// Errors that can occur while reading or writing ucm frames
#[derive(Error, Debug)]
pub enum UcmError {
    #[error("ucm I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a ucm file: first word {0:#010x} is not the ucm magic number in either byte order")]
    BadMagic(u32),

    #[error("header item '{name}' has unsupported type code {code}")]
    UnsupportedHeaderType { name: String, code: i32 },

    #[error("malformed ucm data: {0}")]
    Format(String),

    #[error("CCD {ccd} does not exist (frame has {nccd} CCDs)")]
    NoSuchCcd { ccd: usize, nccd: usize },

    #[error("window {window} of CCD {ccd} does not exist")]
    NoSuchWindow { ccd: usize, window: usize },
}
