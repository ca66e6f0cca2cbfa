//! # flz2-core
//!
//! Streaming, block-parallel compression and decompression engine for the
//! LZMA2-family `.lzma2` container.
//!
//! The engine splits a logical byte stream into independently compressible
//! blocks, codes each block with an adaptive range coder over a hash-chain
//! match finder, and reassembles per-block output into one ordered container
//! stream. Both synchronous and asynchronous pipelines are provided.

pub mod config;
pub mod container;
pub mod error;
pub mod options;
pub mod pipeline;
pub mod preset;
pub mod threading;

mod checksum;
mod lzma;

pub use config::StreamSummary;
pub use container::{FORMAT_VERSION, MAGIC, MAX_BLOCK_SIZE};
pub use error::{Error, Result};
pub use options::{CompressionOptions, DecompressionOptions};
pub use pipeline::{compress, decompress};
#[cfg(feature = "async")]
pub use pipeline::{compress_async, decompress_async};
pub use preset::Preset;
pub use threading::Threading;
