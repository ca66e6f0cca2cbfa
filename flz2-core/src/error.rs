//! Error types and result handling for compression and decompression sessions.

use std::fmt;
use std::io;

/// Result alias using the crate-level [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type covering all failure modes in the engine.
#[derive(Debug)]
pub enum Error {
    /// The requested compression preset is outside the supported range.
    InvalidPreset {
        /// Preset level requested by the caller
        preset: u32,
    },

    /// I/O failure while reading input or writing output.
    Io(io::Error),

    /// Malformed container data or an invalid back-reference during
    /// decompression. Fatal; no further bytes are emitted after detection.
    CorruptStream(&'static str),

    /// The whole-stream checksum did not match the reconstructed output.
    ///
    /// Reported only after the full output has been produced; bytes already
    /// written to the sink are not retracted.
    IntegrityError {
        /// Digest stored in the container trailer
        expected: u64,
        /// Digest computed over the reconstructed output
        actual: u64,
    },

    /// Requested buffer could not be allocated.
    AllocationFailed {
        /// Size in bytes of the buffer that failed to allocate
        capacity: usize,
    },

    /// The requested thread count exceeds the safe limit for the host.
    InvalidThreadCount {
        /// Number of threads requested by the user
        requested: u32,
        /// Maximum safe thread count for the current system
        maximum: u32,
    },

    /// A worker thread or blocking task terminated abnormally.
    WorkerFailure(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidPreset { preset } => {
                write!(f, "unsupported preset level {preset} (valid range is 1..=10)")
            }
            Error::Io(err) => write!(f, "I/O error: {err}"),
            Error::CorruptStream(detail) => write!(f, "compressed data is corrupt: {detail}"),
            Error::IntegrityError { expected, actual } => write!(
                f,
                "integrity check failed: stored digest {expected:#018x}, computed {actual:#018x}",
            ),
            Error::AllocationFailed { capacity } => {
                write!(f, "unable to allocate buffer of {capacity} bytes")
            }
            Error::InvalidThreadCount { requested, maximum } => write!(
                f,
                "requested {requested} threads exceeds safe limit of {maximum}",
            ),
            Error::WorkerFailure(detail) => write!(f, "worker failed: {detail}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
