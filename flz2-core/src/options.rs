//! High-level configuration builders for compression and decompression sessions.

use std::num::{NonZeroU64, NonZeroUsize};

use crate::container::MAX_BLOCK_SIZE;
use crate::error::Result;
use crate::preset::{Preset, PresetParams};
use crate::threading::{clamp_threads, Threading};

const DEFAULT_INPUT_BUFFER: usize = 64 * 1024;
const DEFAULT_OUTPUT_BUFFER: usize = 64 * 1024;

/// Minimum block size floor so match-finding quality is not crippled by
/// over-segmentation.
pub(crate) const MIN_BLOCK_SIZE: usize = 1024 * 1024;

/// Configuration builder for compression sessions.
#[derive(Debug, Clone)]
pub struct CompressionOptions {
    preset: Preset,
    threads: Threading,
    block_size: Option<NonZeroU64>,
    integrity: bool,
    input_buffer_size: NonZeroUsize,
    output_buffer_size: NonZeroUsize,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            threads: Threading::Auto,
            block_size: None,
            integrity: true,
            input_buffer_size: NonZeroUsize::new(DEFAULT_INPUT_BUFFER).unwrap(),
            output_buffer_size: NonZeroUsize::new(DEFAULT_OUTPUT_BUFFER).unwrap(),
        }
    }
}

impl CompressionOptions {
    /// Sets the compression preset level.
    ///
    /// Presets balance speed against ratio:
    ///
    /// - 1-3: fast compression, small dictionaries
    /// - 4-6: balanced (6 is the default)
    /// - 7-10: slower compression, large dictionaries, higher ratios
    #[must_use]
    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    /// Configures the threading strategy for compression.
    ///
    /// - `Threading::Auto`: automatically choose a safe thread count
    /// - `Threading::Exact(n)`: use exactly `n` workers (clamped to the
    ///   system's safe maximum)
    #[must_use]
    pub fn with_threads(mut self, threads: Threading) -> Self {
        self.threads = threads;
        self
    }

    /// Sets a custom block size for multi-threaded compression.
    ///
    /// Block size affects both compression ratio and parallelism:
    ///
    /// - Larger blocks: better compression ratio, less thread-level parallelism
    /// - Smaller blocks: more parallelism, potentially worse compression
    ///
    /// If `None` (default), the block size is the larger of the preset's
    /// dictionary size and a 1 MiB floor. Values above the 512 MiB hard cap
    /// are clamped.
    #[must_use]
    pub fn with_block_size(mut self, block_size: Option<NonZeroU64>) -> Self {
        self.block_size = block_size;
        self
    }

    /// Enables or disables the trailing whole-stream integrity digest.
    ///
    /// The digest is present by default. Disabling it removes corruption
    /// detection for damage the block decoder cannot notice on its own.
    #[must_use]
    pub fn with_integrity(mut self, integrity: bool) -> Self {
        self.integrity = integrity;
        self
    }

    /// Sets the staging buffer size for reading source data.
    ///
    /// Larger buffers can reduce the number of read calls at the cost of
    /// memory. The default (64 KiB) works well for most cases.
    #[must_use]
    pub fn with_input_buffer_size(mut self, size: NonZeroUsize) -> Self {
        self.input_buffer_size = size;
        self
    }

    /// Sets the staging buffer size for writing compressed data.
    #[must_use]
    pub fn with_output_buffer_size(mut self, size: NonZeroUsize) -> Self {
        self.output_buffer_size = size;
        self
    }

    /// Resolves the builder into concrete session parameters.
    pub(crate) fn resolve_session(&self) -> Result<SessionParams> {
        let params = self.preset.resolve();
        let threads = clamp_threads(self.threads);

        let block_size = match self.block_size {
            Some(size) => usize::try_from(size.get().min(MAX_BLOCK_SIZE)).unwrap_or(MIN_BLOCK_SIZE),
            None => (params.dict_size as usize).max(MIN_BLOCK_SIZE),
        };

        Ok(SessionParams {
            params,
            threads,
            block_size,
            integrity: self.integrity,
            input_capacity: self.input_buffer_size.get(),
            output_capacity: self.output_buffer_size.get(),
        })
    }
}

/// Configuration builder for decompression sessions.
///
/// All format parameters (dictionary size, literal context, digest presence)
/// come from the container header; only resource knobs are configurable.
#[derive(Debug, Clone)]
pub struct DecompressionOptions {
    threads: Threading,
    input_buffer_size: NonZeroUsize,
    output_buffer_size: NonZeroUsize,
}

impl Default for DecompressionOptions {
    fn default() -> Self {
        Self {
            threads: Threading::Auto,
            input_buffer_size: NonZeroUsize::new(DEFAULT_INPUT_BUFFER).unwrap(),
            output_buffer_size: NonZeroUsize::new(DEFAULT_OUTPUT_BUFFER).unwrap(),
        }
    }
}

impl DecompressionOptions {
    /// Configures the threading strategy for decompression.
    #[must_use]
    pub fn with_threads(mut self, threads: Threading) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the staging buffer size for reading compressed data.
    #[must_use]
    pub fn with_input_buffer_size(mut self, size: NonZeroUsize) -> Self {
        self.input_buffer_size = size;
        self
    }

    /// Sets the staging buffer size for writing reconstructed data.
    #[must_use]
    pub fn with_output_buffer_size(mut self, size: NonZeroUsize) -> Self {
        self.output_buffer_size = size;
        self
    }

    pub(crate) fn resolved_threads(&self) -> u32 {
        clamp_threads(self.threads)
    }

    pub(crate) fn input_capacity(&self) -> usize {
        self.input_buffer_size.get()
    }

    pub(crate) fn output_capacity(&self) -> usize {
        self.output_buffer_size.get()
    }
}

/// Concrete per-session parameters resolved from [`CompressionOptions`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionParams {
    pub params: PresetParams,
    pub threads: u32,
    pub block_size: usize,
    pub integrity: bool,
    pub input_capacity: usize,
    pub output_capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that default options resolve to the balanced preset.
    #[test]
    fn defaults_resolve() {
        let session = CompressionOptions::default().resolve_session().unwrap();
        assert_eq!(session.params.dict_size, 8 * 1024 * 1024);
        assert!(session.threads >= 1);
        assert!(session.integrity);
        assert_eq!(session.block_size, 8 * 1024 * 1024);
    }

    /// Test that small presets still get the 1 MiB block floor.
    #[test]
    fn block_size_floor_applies() {
        let options = CompressionOptions::default().with_preset(Preset::new(1).unwrap());
        let session = options.resolve_session().unwrap();
        assert_eq!(session.params.dict_size, 64 * 1024);
        assert_eq!(session.block_size, MIN_BLOCK_SIZE);
    }

    /// Test that explicit block size overrides the derived value.
    #[test]
    fn block_size_override() {
        let options = CompressionOptions::default()
            .with_block_size(Some(NonZeroU64::new(4096).unwrap()));
        let session = options.resolve_session().unwrap();
        assert_eq!(session.block_size, 4096);
    }

    /// Test that the block size cap is enforced.
    #[test]
    fn block_size_is_capped() {
        let options =
            CompressionOptions::default().with_block_size(Some(NonZeroU64::new(u64::MAX).unwrap()));
        let session = options.resolve_session().unwrap();
        assert_eq!(session.block_size as u64, MAX_BLOCK_SIZE);
    }

    /// Test that oversized thread requests are clamped, not rejected.
    #[test]
    fn oversized_thread_count_is_clamped() {
        let options = CompressionOptions::default().with_threads(Threading::Exact(10_000));
        let session = options.resolve_session().unwrap();
        assert!(session.threads >= 1);
        assert!(session.threads < 10_000);
    }
}
