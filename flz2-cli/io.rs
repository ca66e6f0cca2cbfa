//! File I/O operations and path manipulation for the flz2 CLI.

use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{CliConfig, OperationMode};
use crate::error::{CliError, Error, Result, Warning};

/// File extension used for compressed streams.
pub const LZMA2_EXTENSION: &str = "lzma2";

/// Default buffer size for CLI file I/O (512 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 512 * 1024;

/// Checks if a file path has the recognized compression extension.
///
/// Recognizes `.lzma2` (case-insensitive).
///
/// # Parameters
///
/// * `path` - The file path to check
///
/// # Returns
///
/// Returns `true` if the file has a `.lzma2` extension, `false` otherwise.
pub fn has_lzma2_extension(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(OsStr::to_str) {
        ext.eq_ignore_ascii_case(LZMA2_EXTENSION)
    } else {
        false
    }
}

/// Generates an output filename based on input path and operation mode.
///
/// # Parameters
///
/// * `input` - The input file path
/// * `mode` - The operation mode
///
/// # Returns
///
/// The generated output path. Test mode produces an empty path since it
/// writes no output.
///
/// # Errors
///
/// Returns an error in these cases:
///
/// - Compression mode: the file already carries the `.lzma2` suffix
/// - Decompression mode: the input lacks the `.lzma2` suffix
/// - Decompression mode: no valid file stem can be derived from the input
pub fn generate_output_filename(input: &Path, mode: OperationMode) -> Result<PathBuf> {
    match mode {
        OperationMode::Compress => {
            let mut output = input.to_path_buf();

            if let Some(file_name) = input.file_name().and_then(OsStr::to_str) {
                let target_suffix = format!(".{LZMA2_EXTENSION}");
                if file_name.ends_with(&target_suffix) {
                    return Err(CliError::from(Warning::AlreadyHasSuffix {
                        path: input.to_path_buf(),
                        suffix: LZMA2_EXTENSION.to_string(),
                    }));
                }
            }

            // If the file has an extension, append the compression extension after it
            match input
                .extension()
                .and_then(OsStr::to_str)
                .filter(|ext| !ext.is_empty())
            {
                Some(ext) => {
                    let new_ext = format!("{ext}.{LZMA2_EXTENSION}");
                    output.set_extension(new_ext);
                }
                None => {
                    output.set_extension(LZMA2_EXTENSION);
                }
            }
            Ok(output)
        }
        OperationMode::Decompress => {
            if !has_lzma2_extension(input) {
                return Err(CliError::from(Warning::UnknownSuffix {
                    path: input.to_path_buf(),
                }));
            }

            // Get the file stem (filename without the last extension)
            let stem = input
                .file_stem()
                .ok_or_else(|| Error::InvalidOutputFilename {
                    path: input.to_path_buf(),
                })
                .map_err(CliError::from)?;

            // Use the parent directory, or current directory if none
            let parent = input.parent().unwrap_or_else(|| Path::new("."));
            Ok(parent.join(stem))
        }
        // No output file for test mode
        OperationMode::Test => Ok(PathBuf::new()),
    }
}

/// Opens an input reader for the given path, or stdin if path is empty.
///
/// # Parameters
///
/// * `path` - Path to the input file, or empty string for stdin
///
/// # Returns
///
/// A trait object implementing [`io::Read`] that wraps either:
///
/// - A buffered file reader for non-empty paths
/// - A buffered stdin reader for empty paths
///
/// # Errors
///
/// Returns an error if the file cannot be opened.
pub fn open_input(path: &str) -> Result<Box<dyn io::Read>> {
    if path.is_empty() {
        Ok(Box::new(io::BufReader::with_capacity(
            DEFAULT_BUFFER_SIZE,
            io::stdin(),
        )))
    } else {
        let file = File::open(path).map_err(|source| {
            CliError::from(Error::OpenInput {
                path: path.to_string(),
                source,
            })
        })?;
        Ok(Box::new(io::BufReader::with_capacity(
            DEFAULT_BUFFER_SIZE,
            file,
        )))
    }
}

/// Opens an output writer for the given path or stdout.
///
/// # Parameters
///
/// * `path` - Optional path to the output file. If `None`, writes to stdout
/// * `config` - CLI configuration controlling stdout mode and force overwrite
///
/// # Returns
///
/// A trait object implementing [`io::Write`] that wraps either:
///
/// - A buffered file writer for file output
/// - A buffered stdout writer for stdout output
///
/// # Errors
///
/// Returns an error in the following cases:
///
/// - The output file already exists and `config.force` is `false`
/// - The file cannot be created due to permissions, disk space, etc.
pub fn open_output(path: Option<&Path>, config: &CliConfig) -> Result<Box<dyn io::Write>> {
    let use_stdout = config.stdout || path.is_none_or(|p| p.as_os_str().is_empty());

    if use_stdout {
        Ok(Box::new(io::BufWriter::with_capacity(
            DEFAULT_BUFFER_SIZE,
            io::stdout(),
        )))
    } else if let Some(path) = path {
        // Check if output file exists and we're not forcing overwrite
        if path.exists() && !config.force {
            return Err(CliError::from(Error::OutputExists {
                path: path.to_path_buf(),
            }));
        }
        let file = File::create(path).map_err(|source| {
            CliError::from(Error::CreateOutput {
                path: path.to_path_buf(),
                source,
            })
        })?;

        Ok(Box::new(io::BufWriter::with_capacity(
            DEFAULT_BUFFER_SIZE,
            file,
        )))
    } else {
        // Fallback to stdout if no path is provided
        Ok(Box::new(io::BufWriter::with_capacity(
            DEFAULT_BUFFER_SIZE,
            io::stdout(),
        )))
    }
}
