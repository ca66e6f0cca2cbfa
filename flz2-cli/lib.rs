//! Common CLI utilities and shared functionality for the `flz2` command-line
//! tool.
//!
//! This crate provides the high-level plumbing between the command line and
//! the `flz2-core` engine: configuration resolution, file I/O handling,
//! output filename derivation, and per-file orchestration.

pub mod config;
pub mod error;
pub mod io;
pub mod operations;
pub mod process;

pub use config::{CliConfig, OperationMode};
pub use error::{format_error_for_stderr, CliError, Error, Result, Warning};
pub use io::{generate_output_filename, open_input, open_output, LZMA2_EXTENSION};
pub use operations::{compress_file, decompress_file, parse_byte_size};
pub use process::{process_file, run_cli};
