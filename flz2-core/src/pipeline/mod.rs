//! Block-parallel compression and decompression pipelines.
//!
//! All container I/O happens on the caller's thread; workers only ever see
//! in-memory block buffers. The synchronous pipelines use scoped OS threads,
//! the asynchronous ones offload block coding onto the runtime's blocking
//! pool.

#[cfg(feature = "async")]
mod r#async;
mod sync;

#[cfg(feature = "async")]
pub use r#async::{compress_async, decompress_async};
pub use sync::{compress, decompress};

use std::io::Read;

use crate::error::{Error, Result};

/// Outcome of coding one block: either the coded payload or the original
/// bytes when coding would not have shrunk them.
enum Encoded {
    Stored(Vec<u8>),
    Coded { raw_len: usize, payload: Vec<u8> },
}

/// Reads up to `block_size` bytes, tolerating short reads.
///
/// Returns an empty buffer at end of input.
fn read_block<R: Read>(reader: &mut R, block_size: usize) -> Result<Vec<u8>> {
    let mut block = Vec::new();
    block
        .try_reserve_exact(block_size)
        .map_err(|_| Error::AllocationFailed {
            capacity: block_size,
        })?;
    block.resize(block_size, 0);

    let mut filled = 0usize;
    while filled < block_size {
        let read = reader.read(&mut block[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    block.truncate(filled);
    Ok(block)
}

/// Slides `block` into the dictionary window, keeping the most recent
/// `dict_size` bytes of stream history.
fn push_window(window: &mut Vec<u8>, block: &[u8], dict_size: usize) {
    if block.len() >= dict_size {
        window.clear();
        window.extend_from_slice(&block[block.len() - dict_size..]);
        return;
    }

    let overflow = (window.len() + block.len()).saturating_sub(dict_size);
    if overflow > 0 {
        window.drain(..overflow);
    }
    window.extend_from_slice(block);
}
