//! CLI configuration shared by all operation modes.

use std::path::PathBuf;

/// Represents different modes of operation for the CLI utility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// Compress input data
    Compress,
    /// Decompress input data
    Decompress,
    /// Validate compressed data integrity without extracting
    Test,
}

/// Configuration for CLI operations.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct CliConfig {
    /// Operation mode
    pub mode: OperationMode,
    /// Force overwrite existing files
    pub force: bool,
    /// Keep input files after processing
    pub keep: bool,
    /// Output to stdout
    pub stdout: bool,
    /// Explicit output path, overriding suffix-based derivation
    pub output: Option<PathBuf>,
    /// Verbose output
    pub verbose: bool,
    /// Quiet level (counted `-q` occurrences)
    pub quiet: u8,
    /// Compression preset level (1-10)
    pub preset: Option<u32>,
    /// Number of worker threads (0 = auto)
    pub threads: Option<u32>,
    /// Explicit block size in bytes for compression
    pub block_size: Option<u64>,
    /// Whether to append the whole-stream integrity digest
    pub integrity: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Compress,
            force: false,
            keep: true,
            stdout: false,
            output: None,
            verbose: false,
            quiet: 0,
            preset: None,
            threads: None,
            block_size: None,
            integrity: true,
        }
    }
}
