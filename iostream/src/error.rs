//! Error types for stream operations.
//!
//! Short transfers are not errors: a read returning `Ok(0)` means the end of
//! the data, and a write returning fewer bytes than requested means the sink
//! is full. [`Error`] covers everything else.

use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stream operation error.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation on a wrapped `std::io` object failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A view was requested with `min > max`.
    #[error("invalid window: min {min} > max {max}")]
    InvalidWindow { min: u64, max: u64 },

    /// Options failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Pending bytes could not be pushed into the wrapped stream.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { expected: usize, written: usize },

    /// The write-behind worker stopped after a failed write.
    #[error("async writer stopped")]
    WriterStopped,

    /// A worker thread panicked before returning its stream.
    #[error("worker thread panicked")]
    WorkerPanicked,

    /// The stream cannot perform the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The buffer cannot be resized while it holds data.
    #[error("buffer is in use")]
    BufferBusy,

    /// A chain link outlived the layer it points to.
    #[error("stream link detached")]
    Detached,

    /// A line was not valid UTF-8.
    #[error("invalid utf-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::InvalidWindow { .. } | Error::InvalidConfig(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            Error::ShortWrite { .. } => io::Error::new(io::ErrorKind::WriteZero, err),
            Error::Unsupported(_) => io::Error::new(io::ErrorKind::Unsupported, err),
            Error::Utf8(_) => io::Error::new(io::ErrorKind::InvalidData, err),
            _ => io::Error::other(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidWindow { min: 10, max: 5 };
        assert_eq!(err.to_string(), "invalid window: min 10 > max 5");

        let err = Error::ShortWrite {
            expected: 8,
            written: 3,
        };
        assert_eq!(err.to_string(), "short write: 3 of 8 bytes");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("pipe closed"));
    }

    #[test]
    fn test_error_into_io_kind() {
        let io_err: io::Error = Error::Unsupported("seek").into();
        assert_eq!(io_err.kind(), io::ErrorKind::Unsupported);

        let io_err: io::Error = Error::InvalidConfig("zero".into()).into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);

        let original = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let io_err: io::Error = Error::Io(original).into();
        assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
    }
}
