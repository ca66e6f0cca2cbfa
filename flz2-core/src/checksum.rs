//! Whole-stream integrity digest over the uncompressed byte stream.

use xxhash_rust::xxh64::Xxh64;

/// Seed for the stream digest. Fixed so digests are comparable across runs.
const DIGEST_SEED: u64 = 0;

/// Incremental XXH64 digest over the logical (uncompressed) stream.
///
/// The compressor feeds source bytes in stream order before dispatching them
/// to workers; the decompressor feeds reconstructed bytes as they are emitted.
/// Both sides therefore hash the same byte sequence regardless of how the
/// stream was split into blocks.
pub(crate) struct StreamDigest {
    hasher: Xxh64,
}

impl StreamDigest {
    pub(crate) fn new() -> Self {
        Self {
            hasher: Xxh64::new(DIGEST_SEED),
        }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub(crate) fn finish(&self) -> u64 {
        self.hasher.digest()
    }
}
