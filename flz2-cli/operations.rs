//! Compression and decompression operations for the flz2 CLI.

use std::io;
use std::num::NonZeroU64;
use std::time::Instant;

use flz2_core::{
    compress, decompress, CompressionOptions, DecompressionOptions, Preset, StreamSummary,
    Threading,
};

use crate::config::CliConfig;
use crate::error::{CliError, Error, Result};

/// Builds engine compression options from the CLI configuration.
fn build_compression_options(path: &str, config: &CliConfig) -> Result<CompressionOptions> {
    let mut options = CompressionOptions::default().with_integrity(config.integrity);

    if let Some(level) = config.preset {
        let preset = Preset::new(level).map_err(|source| {
            CliError::from(Error::Engine {
                path: display_path(path),
                source,
            })
        })?;
        options = options.with_preset(preset);
    }

    if let Some(threads) = config.threads {
        options = options.with_threads(Threading::Exact(threads));
    }

    if let Some(block_size) = config.block_size {
        options = options.with_block_size(NonZeroU64::new(block_size));
    }

    Ok(options)
}

/// Builds engine decompression options from the CLI configuration.
fn build_decompression_options(config: &CliConfig) -> DecompressionOptions {
    let mut options = DecompressionOptions::default();
    if let Some(threads) = config.threads {
        options = options.with_threads(Threading::Exact(threads));
    }
    options
}

/// Emit verbose output for a completed compression operation.
fn emit_compress_summary(config: &CliConfig, path: &str, summary: &StreamSummary, started: Instant) {
    if !config.verbose || config.quiet > 0 {
        return;
    }
    let name = if path.is_empty() { "(stdin)" } else { path };
    eprintln!(
        "{name}: Compressed: {} -> {} bytes ({:.1}% saved, {:.2}s)",
        summary.bytes_read,
        summary.bytes_written,
        summary.space_saved_percent(),
        started.elapsed().as_secs_f64()
    );
}

/// Emit verbose output for a completed decompression operation.
fn emit_decompress_summary(
    config: &CliConfig,
    path: &str,
    summary: &StreamSummary,
    started: Instant,
) {
    if !config.verbose || config.quiet > 0 {
        return;
    }
    let name = if path.is_empty() { "(stdin)" } else { path };
    eprintln!(
        "{name}: Decompressed: {} -> {} bytes ({:.2}s)",
        summary.bytes_read,
        summary.bytes_written,
        started.elapsed().as_secs_f64()
    );
}

/// Compresses data from an input reader to an output writer.
///
/// Uses the `.lzma2` block container with settings taken from [`CliConfig`]:
/// preset level, worker threads, block size, and the trailing integrity
/// digest.
///
/// # Parameters
///
/// * `input` - Reader providing uncompressed data
/// * `output` - Writer receiving the compressed stream
/// * `path` - Display name of the input, used in errors and verbose output
/// * `config` - CLI configuration
///
/// # Returns
///
/// Returns `Ok(())` on successful compression.
///
/// # Errors
///
/// Returns an error in these cases:
///
/// - Invalid preset level (must be 1-10)
/// - Engine failure while coding blocks
/// - I/O errors during read or write operations
pub fn compress_file(
    mut input: impl io::Read,
    mut output: impl io::Write,
    path: &str,
    config: &CliConfig,
) -> Result<()> {
    let options = build_compression_options(path, config)?;
    let started = Instant::now();

    let summary = compress(&mut input, &mut output, &options).map_err(|source| {
        CliError::from(Error::Engine {
            path: display_path(path),
            source,
        })
    })?;

    emit_compress_summary(config, path, &summary, started);
    Ok(())
}

/// Decompresses `.lzma2` data from an input reader to an output writer.
///
/// All format parameters are read from the container header; the CLI
/// configuration only controls worker threads and verbosity.
///
/// # Parameters
///
/// * `input` - Reader providing compressed data
/// * `output` - Writer receiving reconstructed data
/// * `path` - Display name of the input, used in errors and verbose output
/// * `config` - CLI configuration
///
/// # Returns
///
/// Returns `Ok(())` on successful decompression.
///
/// # Errors
///
/// Returns an error in these cases:
///
/// - Corrupted or truncated input data
/// - Whole-stream digest mismatch
/// - I/O errors during read or write operations
pub fn decompress_file(
    mut input: impl io::Read,
    mut output: impl io::Write,
    path: &str,
    config: &CliConfig,
) -> Result<()> {
    let options = build_decompression_options(config);
    let started = Instant::now();

    let summary = decompress(&mut input, &mut output, &options).map_err(|source| {
        CliError::from(Error::Engine {
            path: display_path(path),
            source,
        })
    })?;

    emit_decompress_summary(config, path, &summary, started);
    Ok(())
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "(stdin)".to_string()
    } else {
        path.to_string()
    }
}

/// Parses a byte size argument with an optional `K`/`M`/`G` suffix.
///
/// Plain numbers are taken as bytes. Suffixes use binary multiples, so
/// `64K` is 65536 and `1M` is 1048576. Suffixes are case-insensitive.
///
/// # Errors
///
/// Returns a message suitable for clap's `value_parser` when the value is
/// empty, non-numeric, zero, or overflows `u64`.
pub fn parse_byte_size(value: &str) -> std::result::Result<u64, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("size must not be empty".to_string());
    }

    let (digits, multiplier) = match value.chars().last() {
        Some('k' | 'K') => (&value[..value.len() - 1], 1024u64),
        Some('m' | 'M') => (&value[..value.len() - 1], 1024 * 1024),
        Some('g' | 'G') => (&value[..value.len() - 1], 1024 * 1024 * 1024),
        _ => (value, 1),
    };

    let number: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size value: {value}"))?;

    let bytes = number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size value too large: {value}"))?;

    if bytes == 0 {
        return Err("size must be greater than zero".to_string());
    }

    Ok(bytes)
}
