//! Error types for CLI operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Warning conditions for CLI operations.
///
/// These are non-fatal conditions: the offending file is skipped and
/// processing continues with the remaining inputs.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Input file lacks the recognized compression extension
    #[error("{}: Filename has an unknown suffix, skipping", path.display())]
    UnknownSuffix {
        /// Path to the input file
        path: PathBuf,
    },

    /// Input file already has the target suffix
    #[error("{}: Already has `.{}` suffix, skipping", path.display(), suffix)]
    AlreadyHasSuffix {
        /// Path to the input file
        path: PathBuf,
        /// The suffix that already exists
        suffix: String,
    },
}

/// Main error type for CLI operations.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Failed to open input file
    #[error("{path}: {source}")]
    OpenInput {
        /// Path to the input file
        path: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Failed to create output file
    #[error("{}: {source}", path.display())]
    CreateOutput {
        /// Path to the output file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Output file already exists
    #[error("{}: Output file already exists. Use --force to overwrite.", path.display())]
    OutputExists {
        /// Path to the existing file
        path: PathBuf,
    },

    /// Cannot determine output filename
    #[error("{}: Cannot determine output filename", path.display())]
    InvalidOutputFilename {
        /// Path to the input file
        path: PathBuf,
    },

    /// The engine reported a failure while processing a stream
    #[error("{path}: {source}")]
    Engine {
        /// Path to the file being processed (or "(stdin)")
        path: String,
        /// Underlying engine error
        #[source]
        source: flz2_core::Error,
    },

    /// Failed to remove input file
    #[error("{path}: Cannot remove: {source}")]
    RemoveFile {
        /// Path to the file
        path: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Specialized `Result` type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// This represents both "real" failures and warning/notice conditions.
#[derive(Debug, ThisError)]
pub enum CliError {
    /// Warning/notice condition.
    #[error(transparent)]
    Warning(#[from] Warning),

    /// Real failure condition.
    #[error(transparent)]
    Error(#[from] Error),
}

impl CliError {
    /// Returns a reference to the warning if this error represents a warning/notice.
    pub fn as_warning(&self) -> Option<&Warning> {
        match self {
            CliError::Warning(warning) => Some(warning),
            CliError::Error(_) => None,
        }
    }
}

/// Formats an error message for stderr, respecting `-q/-qq`.
///
/// # Parameters
///
/// * `program` - Program name prefix to use in error output (e.g. `"flz2"`)
/// * `quiet` - Quiet level (as counted by `-q` occurrences)
/// * `err` - The error returned by the CLI runner
///
/// # Returns
///
/// Returns `None` when the message should be suppressed by `quiet`,
/// otherwise a formatted single-line message suitable for stderr.
pub fn format_error_for_stderr(program: &str, quiet: u8, err: &CliError) -> Option<String> {
    if quiet >= 2 {
        return None;
    }
    if quiet >= 1 && err.as_warning().is_some() {
        return None;
    }
    Some(format!("{program}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that warnings are suppressed by a single -q.
    #[test]
    fn single_quiet_suppresses_warnings() {
        let warning = CliError::Warning(Warning::UnknownSuffix {
            path: PathBuf::from("data.bin"),
        });
        assert!(format_error_for_stderr("flz2", 0, &warning).is_some());
        assert!(format_error_for_stderr("flz2", 1, &warning).is_none());
    }

    /// Test that real errors survive a single -q but not -qq.
    #[test]
    fn double_quiet_suppresses_errors() {
        let error = CliError::Error(Error::OutputExists {
            path: PathBuf::from("out.lzma2"),
        });
        assert!(format_error_for_stderr("flz2", 0, &error).is_some());
        assert!(format_error_for_stderr("flz2", 1, &error).is_some());
        assert!(format_error_for_stderr("flz2", 2, &error).is_none());
    }

    /// Test that messages carry the program prefix and file context.
    #[test]
    fn messages_include_context() {
        let error = CliError::Error(Error::Engine {
            path: "archive.lzma2".to_string(),
            source: flz2_core::Error::CorruptStream("stream header magic mismatch"),
        });
        let msg = format_error_for_stderr("flz2", 0, &error).unwrap();
        assert!(msg.starts_with("flz2: "));
        assert!(msg.contains("archive.lzma2"));
        assert!(msg.contains("magic"));
    }
}
