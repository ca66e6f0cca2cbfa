//! Block codec: greedy LZ parsing over a hash-chain match finder, coded with
//! an adaptive binary range coder.
//!
//! Each block is coded with fresh probability models. Only the byte window
//! may carry over between blocks (single-threaded compression chains it so
//! matches can reach back into the previous block); the models themselves
//! always start from scratch, which is what makes multi-threaded block
//! encoding deterministic and order-independent.

mod match_finder;
mod range;

pub(crate) use match_finder::{MAX_MATCH, MIN_MATCH};

use match_finder::MatchFinder;
use range::{new_prob, BitTree6, BitTree8, LiteralCoder, RangeDecoder, RangeEncoder};

use crate::error::{Error, Result};
use crate::preset::PresetParams;

/// Encodes one block against an optional carried-over window.
///
/// Returns the coded payload when it is strictly smaller than `data`, or
/// `None` when coding would not shrink the block and it should be stored
/// verbatim instead. `window` must already be trimmed to the dictionary size.
///
/// # Errors
///
/// Returns [`Error::AllocationFailed`] when the search structures cannot be
/// allocated.
pub(crate) fn encode_block(
    params: &PresetParams,
    window: &[u8],
    data: &[u8],
) -> Result<Option<Vec<u8>>> {
    debug_assert!(window.len() <= params.dict_size as usize);
    debug_assert!(!data.is_empty());

    let mut search = Vec::new();
    search
        .try_reserve_exact(window.len() + data.len())
        .map_err(|_| Error::AllocationFailed {
            capacity: window.len() + data.len(),
        })?;
    search.extend_from_slice(window);
    search.extend_from_slice(data);

    let mut finder = MatchFinder::new(
        &search,
        params.dict_size,
        params.match_depth,
        params.nice_len,
    )?;
    for pos in 0..window.len() {
        finder.insert(pos);
    }

    let mut encoder = RangeEncoder::new();
    let mut is_match = new_prob();
    let mut literals = LiteralCoder::new(params.literal_context_bits);
    let mut lengths = BitTree8::new();
    let mut slots = BitTree6::new();

    let mut pos = window.len();
    while pos < search.len() {
        // Abandon once the coded form can no longer beat a stored block.
        if encoder.pending_len() >= data.len() {
            return Ok(None);
        }

        match finder.best_match(pos) {
            Some((len, dist)) => {
                encoder.encode_bit(&mut is_match, 1);
                lengths.encode(&mut encoder, (len - MIN_MATCH) as u32);
                encode_distance(&mut encoder, &mut slots, dist as u32);
                for covered in pos..pos + len {
                    finder.insert(covered);
                }
                pos += len;
            }
            None => {
                encoder.encode_bit(&mut is_match, 0);
                let previous = if pos > 0 { search[pos - 1] } else { 0 };
                literals.encode(&mut encoder, previous, search[pos]);
                finder.insert(pos);
                pos += 1;
            }
        }
    }

    let payload = encoder.finish();
    if payload.len() < data.len() {
        Ok(Some(payload))
    } else {
        Ok(None)
    }
}

/// Decodes one block against an optional carried-over window.
///
/// Produces exactly `raw_len` bytes (the window prefix is not returned).
///
/// # Errors
///
/// Returns [`Error::CorruptStream`] when the payload is malformed: a match
/// distance reaching past the available history or the dictionary size, a
/// match overrunning the declared block length, or a payload that ends before
/// the block is complete. Returns [`Error::AllocationFailed`] when the output
/// buffer cannot be allocated.
pub(crate) fn decode_block(
    dict_size: u32,
    literal_context_bits: u32,
    window: &[u8],
    payload: &[u8],
    raw_len: usize,
) -> Result<Vec<u8>> {
    let total = window.len() + raw_len;
    let mut buf = Vec::new();
    buf.try_reserve_exact(total)
        .map_err(|_| Error::AllocationFailed { capacity: total })?;
    buf.extend_from_slice(window);

    let mut decoder = RangeDecoder::new(payload)?;
    let mut is_match = new_prob();
    let mut literals = LiteralCoder::new(literal_context_bits);
    let mut lengths = BitTree8::new();
    let mut slots = BitTree6::new();

    let max_dist = dict_size as usize;
    while buf.len() < total {
        if decoder.decode_bit(&mut is_match) == 1 {
            let len = lengths.decode(&mut decoder) as usize + MIN_MATCH;
            // Decoded in u64: a hostile payload can name distances past the
            // u32 range, which must surface as corruption, not wraparound.
            let dist = decode_distance(&mut decoder, &mut slots);
            if dist > buf.len() as u64 || dist > max_dist as u64 {
                return Err(Error::CorruptStream("match distance exceeds window"));
            }
            #[allow(clippy::cast_possible_truncation)]
            let dist = dist as usize;
            if buf.len() + len > total {
                return Err(Error::CorruptStream("match overruns block boundary"));
            }
            for _ in 0..len {
                let byte = buf[buf.len() - dist];
                buf.push(byte);
            }
        } else {
            let previous = buf.last().copied().unwrap_or(0);
            let byte = literals.decode(&mut decoder, previous);
            buf.push(byte);
        }
    }

    decoder.check_consumed()?;
    Ok(buf.split_off(window.len()))
}

/// Codes a match distance as a 6-bit slot plus direct footer bits.
///
/// Slots 0..4 are the distance itself; larger slots carry the two top bits
/// in the slot and the remainder as fixed-probability bits.
fn encode_distance(encoder: &mut RangeEncoder, slots: &mut BitTree6, dist: u32) {
    let val = dist - 1;
    if val < 4 {
        slots.encode(encoder, val);
        return;
    }

    let top = 31 - val.leading_zeros();
    let slot = (top << 1) | ((val >> (top - 1)) & 1);
    slots.encode(encoder, slot);

    let footer = (slot >> 1) - 1;
    encoder.encode_direct_bits(val & ((1 << footer) - 1), footer);
}

fn decode_distance(decoder: &mut RangeDecoder<'_>, slots: &mut BitTree6) -> u64 {
    let slot = slots.decode(decoder);
    if slot < 4 {
        return u64::from(slot) + 1;
    }

    let footer = (slot >> 1) - 1;
    let base = u64::from(2 | (slot & 1)) << footer;
    (base | u64::from(decoder.decode_direct_bits(footer))) + 1
}
