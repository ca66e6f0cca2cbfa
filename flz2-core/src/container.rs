//! On-disk container format for `.lzma2` streams.
//!
//! A stream starts with a fixed header carrying the parameters a decoder
//! needs, followed by a sequence of length-prefixed block records, an end
//! marker, and an optional integrity trailer:
//!
//! ```text
//! +-------+---------+-----------+----+-------+
//! | magic | version | dict_size | lc | flags |   11-byte stream header
//! +-------+---------+-----------+----+-------+
//! | control | seq | raw_len | comp_len | payload |   block record (repeated)
//! +---------+-----+---------+----------+---------+
//! | 0x00 |                                           end marker
//! +------+
//! | digest |                                         XXH64, if flags bit 0
//! +--------+
//! ```
//!
//! All multi-byte integers are little-endian. Blocks carry their stream
//! sequence number explicitly so the decoder can verify ordering even though
//! records are written strictly in order.

use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Magic bytes identifying a stream in this container format.
pub const MAGIC: [u8; 4] = *b"FLZ2";

/// Current container format version.
pub const FORMAT_VERSION: u8 = 1;

/// Hard upper bound on the uncompressed size of a single block.
///
/// Guards the decoder against allocating absurd buffers for hostile input.
pub const MAX_BLOCK_SIZE: u64 = 512 * 1024 * 1024;

/// Largest dictionary the format can describe (the level-10 preset).
const MAX_DICT_SIZE: u32 = 128 * 1024 * 1024;

/// Wire sizes of the fixed records, used for byte accounting.
pub(crate) const STREAM_HEADER_LEN: u64 = 11;
pub(crate) const BLOCK_HEADER_LEN: u64 = 13;
pub(crate) const END_MARKER_LEN: u64 = 1;
pub(crate) const DIGEST_LEN: u64 = 8;

const FLAG_DIGEST: u8 = 0b0000_0001;

const CONTROL_END: u8 = 0x00;
const CONTROL_STORED: u8 = 0x01;
const CONTROL_CODED_RESET: u8 = 0x02;
const CONTROL_CODED_CHAINED: u8 = 0x03;

/// Decoded stream header parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StreamHeader {
    /// Sliding dictionary window size the encoder used.
    pub dict_size: u32,
    /// High bits of the previous byte used as literal coding context.
    pub literal_context_bits: u32,
    /// Whether an XXH64 trailer follows the end marker.
    pub integrity: bool,
}

impl StreamHeader {
    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut flags = 0u8;
        if self.integrity {
            flags |= FLAG_DIGEST;
        }

        writer.write_all(&MAGIC)?;
        writer.write_all(&[FORMAT_VERSION])?;
        writer.write_all(&self.dict_size.to_le_bytes())?;
        #[allow(clippy::cast_possible_truncation)]
        writer.write_all(&[self.literal_context_bits as u8])?;
        writer.write_all(&[flags])?;
        Ok(())
    }

    /// Reads and validates a stream header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptStream`] when the magic bytes, version, or any
    /// parameter field is outside the range this implementation supports.
    pub(crate) fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::CorruptStream("stream header magic mismatch"));
        }

        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != FORMAT_VERSION {
            return Err(Error::CorruptStream("unsupported container version"));
        }

        let mut dict = [0u8; 4];
        reader.read_exact(&mut dict)?;
        let dict_size = u32::from_le_bytes(dict);
        if dict_size == 0 || dict_size > MAX_DICT_SIZE {
            return Err(Error::CorruptStream("dictionary size out of range"));
        }

        let mut rest = [0u8; 2];
        reader.read_exact(&mut rest)?;
        let literal_context_bits = u32::from(rest[0]);
        if literal_context_bits > 8 {
            return Err(Error::CorruptStream("literal context bits out of range"));
        }
        let flags = rest[1];
        if flags & !FLAG_DIGEST != 0 {
            return Err(Error::CorruptStream("unknown header flags set"));
        }

        Ok(Self {
            dict_size,
            literal_context_bits,
            integrity: flags & FLAG_DIGEST != 0,
        })
    }
}

/// How a block's payload was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockKind {
    /// Payload is the raw source bytes; used when coding would expand.
    Stored,
    /// Range-coded with a fresh dictionary window.
    CodedReset,
    /// Range-coded against the window carried over from the previous block.
    CodedChained,
}

/// Decoded block record header (the fixed fields before the payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockHeader {
    pub seq: u32,
    pub kind: BlockKind,
    pub raw_len: u32,
    pub comp_len: u32,
}

/// True when `control` is the end-of-stream marker byte.
pub(crate) fn is_end_marker(control: u8) -> bool {
    control == CONTROL_END
}

pub(crate) fn write_block_header<W: Write>(
    writer: &mut W,
    seq: u32,
    kind: BlockKind,
    raw_len: u32,
    comp_len: u32,
) -> Result<()> {
    let control = match kind {
        BlockKind::Stored => CONTROL_STORED,
        BlockKind::CodedReset => CONTROL_CODED_RESET,
        BlockKind::CodedChained => CONTROL_CODED_CHAINED,
    };
    writer.write_all(&[control])?;
    writer.write_all(&seq.to_le_bytes())?;
    writer.write_all(&raw_len.to_le_bytes())?;
    writer.write_all(&comp_len.to_le_bytes())?;
    Ok(())
}

/// Reads the next block header, or `None` at the end marker.
///
/// # Errors
///
/// Returns [`Error::CorruptStream`] for unknown control bytes or length
/// fields that violate the format's invariants (empty blocks, oversized
/// blocks, stored blocks whose lengths disagree, coded blocks that did not
/// shrink).
pub(crate) fn read_block_header<R: Read>(reader: &mut R) -> Result<Option<BlockHeader>> {
    let mut control = [0u8; 1];
    reader.read_exact(&mut control)?;

    let kind = match control[0] {
        CONTROL_END => return Ok(None),
        CONTROL_STORED => BlockKind::Stored,
        CONTROL_CODED_RESET => BlockKind::CodedReset,
        CONTROL_CODED_CHAINED => BlockKind::CodedChained,
        _ => return Err(Error::CorruptStream("unknown block control byte")),
    };

    let mut fields = [0u8; 12];
    reader.read_exact(&mut fields)?;
    let seq = u32::from_le_bytes([fields[0], fields[1], fields[2], fields[3]]);
    let raw_len = u32::from_le_bytes([fields[4], fields[5], fields[6], fields[7]]);
    let comp_len = u32::from_le_bytes([fields[8], fields[9], fields[10], fields[11]]);

    if raw_len == 0 {
        return Err(Error::CorruptStream("empty block record"));
    }
    if u64::from(raw_len) > MAX_BLOCK_SIZE {
        return Err(Error::CorruptStream("block exceeds maximum size"));
    }
    match kind {
        BlockKind::Stored if comp_len != raw_len => {
            return Err(Error::CorruptStream("stored block length mismatch"));
        }
        BlockKind::CodedReset | BlockKind::CodedChained if comp_len >= raw_len => {
            return Err(Error::CorruptStream("coded block did not shrink"));
        }
        _ => {}
    }

    Ok(Some(BlockHeader {
        seq,
        kind,
        raw_len,
        comp_len,
    }))
}

pub(crate) fn write_end_marker<W: Write>(writer: &mut W, digest: Option<u64>) -> Result<()> {
    writer.write_all(&[CONTROL_END])?;
    if let Some(digest) = digest {
        writer.write_all(&digest.to_le_bytes())?;
    }
    Ok(())
}

pub(crate) fn read_trailer_digest<R: Read>(reader: &mut R) -> Result<u64> {
    let mut digest = [0u8; 8];
    reader.read_exact(&mut digest)?;
    Ok(u64::from_le_bytes(digest))
}

/// Reads a block payload into a freshly allocated buffer.
///
/// The length comes from attacker-controlled data, so allocation goes through
/// `try_reserve` and failures surface as [`Error::AllocationFailed`] instead
/// of aborting the process.
pub(crate) fn read_payload<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    payload
        .try_reserve_exact(len)
        .map_err(|_| Error::AllocationFailed { capacity: len })?;
    payload.resize(len, 0);
    reader.read_exact(&mut payload)?;
    Ok(payload)
}
