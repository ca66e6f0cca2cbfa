//! High-level file processing and CLI orchestration.

use std::io;
use std::path::PathBuf;

use crate::config::{CliConfig, OperationMode};
use crate::error::{format_error_for_stderr, Error, Result};
use crate::io::{generate_output_filename, open_input, open_output};
use crate::operations::{compress_file, decompress_file};

/// Removes the input file after successful processing.
///
/// Automatically determines whether to remove the input file based on the
/// operation mode and configuration flags.
///
/// # Parameters
///
/// * `input_path` - Path to the input file to potentially remove (empty string for stdin)
/// * `config` - CLI configuration controlling file retention behavior
///
/// # Returns
///
/// Returns `Ok(())` if the file was removed or if removal was not necessary.
///
/// # Errors
///
/// Returns an error if file removal fails.
pub fn cleanup_input_file(input_path: &str, config: &CliConfig) -> Result<()> {
    // Never delete the input file in Test mode
    if config.mode == OperationMode::Test {
        return Ok(());
    }

    if !config.keep && !input_path.is_empty() && !config.stdout {
        std::fs::remove_file(input_path).map_err(|source| Error::RemoveFile {
            path: input_path.to_string(),
            source,
        })?;

        if config.verbose {
            eprintln!("Removed input file: {input_path}");
        }
    }
    Ok(())
}

/// Processes a single file according to the CLI configuration.
///
/// This is the main entry point for file processing operations. It
/// orchestrates the complete workflow:
///
/// 1. Opens the input file (or stdin if path is empty)
/// 2. Generates the output filename (if needed)
/// 3. Opens the output destination (file or stdout)
/// 4. Performs the requested operation (compress/decompress/test)
/// 5. Cleans up the input file if configured to do so
///
/// # Parameters
///
/// * `input_path` - Path to the input file, or empty string to read from stdin
/// * `config` - CLI configuration specifying operation mode, levels, and flags
///
/// # Operation Modes
///
/// - **Compress**: Reads raw data and writes a `.lzma2` stream
/// - **Decompress**: Reads a `.lzma2` stream and writes reconstructed data
/// - **Test**: Validates a `.lzma2` stream without producing output
///
/// # Returns
///
/// Returns `Ok(())` if the operation completed successfully.
///
/// # Errors
///
/// Returns an error in these cases:
///
/// - Input file cannot be opened or read
/// - Output filename generation fails (e.g., decompressing file without valid extension)
/// - Output file creation fails (permissions, disk space, etc.)
/// - Output file exists and `force` flag is not set
/// - Compression/decompression operation fails
/// - Input file removal fails (when cleanup is enabled)
pub fn process_file(input_path: &str, config: &CliConfig) -> Result<()> {
    // Use empty PathBuf for stdin, otherwise use the provided path
    let input_path_buf = if input_path.is_empty() {
        PathBuf::new()
    } else {
        PathBuf::from(input_path)
    };

    // Derive the output name before opening anything so suffix warnings
    // skip the file without touching it. An explicit output path bypasses
    // the suffix rules entirely.
    let output_path = if config.stdout || config.mode == OperationMode::Test {
        None
    } else if let Some(output) = &config.output {
        Some(output.clone())
    } else if input_path.is_empty() {
        None
    } else {
        Some(generate_output_filename(&input_path_buf, config.mode)?)
    };

    let input = open_input(input_path)?;
    let output = open_output(output_path.as_deref(), config)?;

    match config.mode {
        OperationMode::Compress => {
            compress_file(input, output, input_path, config)?;
        }
        OperationMode::Decompress => {
            decompress_file(input, output, input_path, config)?;
        }
        OperationMode::Test => {
            // In test mode, decompress but discard output
            decompress_file(input, io::sink(), input_path, config)?;
            if config.verbose && config.quiet == 0 {
                let name = if input_path.is_empty() {
                    "(stdin)"
                } else {
                    input_path
                };
                eprintln!("Test successful: {name}");
            }
        }
    }

    cleanup_input_file(input_path, config)?;

    Ok(())
}

/// Runs a CLI command over multiple input files.
///
/// Processes each file with [`process_file`]. Warning conditions (such as an
/// unknown suffix) are reported to stderr and the file is skipped; real
/// errors stop processing.
///
/// # Parameters
///
/// * `files` - Slice of input file paths to process. Empty slice reads from stdin.
/// * `config` - CLI configuration specifying operation mode and options.
/// * `program` - Program name to include in stderr messages (e.g., "flz2").
///
/// # Returns
///
/// Returns `Ok(warned)` if every file either succeeded or was skipped with a
/// warning; `warned` is `true` when at least one warning was emitted.
///
/// # Errors
///
/// Returns the first non-warning error encountered. Processing stops at that
/// file; earlier files keep their results.
pub fn run_cli(files: &[String], config: &CliConfig, program: &str) -> Result<bool> {
    let mut warned = false;

    if files.is_empty() {
        process_file("", config)?;
        return Ok(false);
    }

    for file in files {
        match process_file(file, config) {
            Ok(()) => {}
            Err(err) if err.as_warning().is_some() => {
                warned = true;
                if let Some(message) = format_error_for_stderr(program, config.quiet, &err) {
                    eprintln!("{message}");
                }
            }
            Err(err) => return Err(err),
        }
    }

    Ok(warned)
}
