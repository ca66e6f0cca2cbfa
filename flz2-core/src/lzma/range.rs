//! Binary range coder with adaptive 11-bit probabilities.
//!
//! Probabilities live in `0..2048` and start at the midpoint. Each coded bit
//! nudges its probability by a 1/32 step toward the observed value, so the
//! model adapts to local statistics without any explicit training pass.

use crate::error::{Error, Result};

const TOP: u32 = 1 << 24;
const PROB_BITS: u32 = 11;
const PROB_INIT: u16 = (1 << PROB_BITS) / 2;
const MOVE_BITS: u32 = 5;

/// Carry-propagating range encoder writing to an in-memory buffer.
///
/// The first output byte is always zero; the decoder requires it, which gives
/// a cheap early corruption check on coded payloads.
pub(crate) struct RangeEncoder {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u64,
    out: Vec<u8>,
}

impl RangeEncoder {
    pub(crate) fn new() -> Self {
        Self {
            low: 0,
            range: u32::MAX,
            cache: 0,
            cache_size: 1,
            out: Vec::new(),
        }
    }

    /// Bytes emitted so far, counting pending carry bytes.
    ///
    /// Used by the encoder to abandon coding early once the payload can no
    /// longer beat a stored block.
    pub(crate) fn pending_len(&self) -> usize {
        self.out.len() + self.cache_size as usize
    }

    pub(crate) fn encode_bit(&mut self, prob: &mut u16, bit: u32) {
        let bound = (self.range >> PROB_BITS) * u32::from(*prob);
        if bit == 0 {
            self.range = bound;
            *prob += ((1 << PROB_BITS) - *prob) >> MOVE_BITS;
        } else {
            self.low += u64::from(bound);
            self.range -= bound;
            *prob -= *prob >> MOVE_BITS;
        }
        if self.range < TOP {
            self.range <<= 8;
            self.shift_low();
        }
    }

    /// Encodes `count` bits of `value` msb-first at fixed probability 1/2.
    pub(crate) fn encode_direct_bits(&mut self, value: u32, count: u32) {
        for shift in (0..count).rev() {
            self.range >>= 1;
            if (value >> shift) & 1 != 0 {
                self.low += u64::from(self.range);
            }
            if self.range < TOP {
                self.range <<= 8;
                self.shift_low();
            }
        }
    }

    /// Flushes pending state and returns the coded payload.
    pub(crate) fn finish(mut self) -> Vec<u8> {
        for _ in 0..5 {
            self.shift_low();
        }
        self.out
    }

    fn shift_low(&mut self) {
        if self.low < 0xFF00_0000 || self.low > 0xFFFF_FFFF {
            let carry = (self.low >> 32) as u8;
            let mut byte = self.cache;
            loop {
                self.out.push(byte.wrapping_add(carry));
                byte = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }
            self.cache = (self.low >> 24) as u8;
        }
        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
    }
}

/// Range decoder over a coded payload slice.
///
/// Running off the end of the payload is recorded in an overrun flag rather
/// than failing mid-symbol; [`RangeDecoder::check_consumed`] turns it into a
/// corruption error once the block is done. Hostile payloads therefore cannot
/// make the decoder read out of bounds, only produce garbage that the length
/// and distance checks (or the stream digest) reject.
pub(crate) struct RangeDecoder<'a> {
    range: u32,
    code: u32,
    input: &'a [u8],
    position: usize,
    overrun: bool,
}

impl<'a> RangeDecoder<'a> {
    /// # Errors
    ///
    /// Returns [`Error::CorruptStream`] when the payload is shorter than the
    /// five-byte preamble or its mandatory zero lead byte is nonzero.
    pub(crate) fn new(input: &'a [u8]) -> Result<Self> {
        if input.len() < 5 {
            return Err(Error::CorruptStream("coded payload shorter than preamble"));
        }
        if input[0] != 0 {
            return Err(Error::CorruptStream("nonzero range coder lead byte"));
        }
        let code = u32::from_be_bytes([input[1], input[2], input[3], input[4]]);
        Ok(Self {
            range: u32::MAX,
            code,
            input,
            position: 5,
            overrun: false,
        })
    }

    pub(crate) fn decode_bit(&mut self, prob: &mut u16) -> u32 {
        let bound = (self.range >> PROB_BITS) * u32::from(*prob);
        let bit = if self.code < bound {
            self.range = bound;
            *prob += ((1 << PROB_BITS) - *prob) >> MOVE_BITS;
            0
        } else {
            self.code -= bound;
            self.range -= bound;
            *prob -= *prob >> MOVE_BITS;
            1
        };
        if self.range < TOP {
            self.range <<= 8;
            self.code = (self.code << 8) | u32::from(self.next_byte());
        }
        bit
    }

    pub(crate) fn decode_direct_bits(&mut self, count: u32) -> u32 {
        let mut value = 0u32;
        for _ in 0..count {
            self.range >>= 1;
            let bit = if self.code >= self.range {
                self.code -= self.range;
                1
            } else {
                0
            };
            value = (value << 1) | bit;
            if self.range < TOP {
                self.range <<= 8;
                self.code = (self.code << 8) | u32::from(self.next_byte());
            }
        }
        value
    }

    /// # Errors
    ///
    /// Returns [`Error::CorruptStream`] when decoding consumed bytes past the
    /// end of the payload, or left payload bytes unconsumed. The decoder
    /// normalizes on the same schedule the encoder flushes, so a well-formed
    /// payload is consumed exactly; leftover bytes mean the payload was
    /// padded or mis-framed.
    pub(crate) fn check_consumed(&self) -> Result<()> {
        if self.overrun {
            return Err(Error::CorruptStream("coded payload truncated"));
        }
        if self.position != self.input.len() {
            return Err(Error::CorruptStream("trailing bytes after coded payload"));
        }
        Ok(())
    }

    fn next_byte(&mut self) -> u8 {
        match self.input.get(self.position) {
            Some(&byte) => {
                self.position += 1;
                byte
            }
            None => {
                self.overrun = true;
                0
            }
        }
    }
}

// Fixed-depth binary trees of adaptive probabilities, coded msb-first. The
// codec needs exactly two depths, so they are stamped out by macro instead of
// relying on const-generic array lengths.
macro_rules! bit_tree {
    ($name:ident, $bits:expr) => {
        /// Fixed-depth binary tree of adaptive probabilities.
        pub(crate) struct $name {
            probs: [u16; 1 << $bits],
        }

        impl $name {
            pub(crate) fn new() -> Self {
                Self {
                    probs: [PROB_INIT; 1 << $bits],
                }
            }

            pub(crate) fn encode(&mut self, encoder: &mut RangeEncoder, symbol: u32) {
                let mut index = 1usize;
                for shift in (0..$bits).rev() {
                    let bit = (symbol >> shift) & 1;
                    encoder.encode_bit(&mut self.probs[index], bit);
                    index = (index << 1) | bit as usize;
                }
            }

            pub(crate) fn decode(&mut self, decoder: &mut RangeDecoder<'_>) -> u32 {
                let mut index = 1usize;
                for _ in 0..$bits {
                    let bit = decoder.decode_bit(&mut self.probs[index]);
                    index = (index << 1) | bit as usize;
                }
                (index as u32) - (1 << $bits)
            }
        }
    };
}

bit_tree!(BitTree6, 6);
bit_tree!(BitTree8, 8);

/// Adaptive literal coder, one 8-bit tree per literal context.
pub(crate) struct LiteralCoder {
    context_shift: u32,
    probs: Vec<[u16; 0x100]>,
}

impl LiteralCoder {
    pub(crate) fn new(context_bits: u32) -> Self {
        Self {
            context_shift: 8 - context_bits,
            probs: vec![[PROB_INIT; 0x100]; 1 << context_bits],
        }
    }

    fn context(&self, previous: u8) -> usize {
        usize::from(previous >> self.context_shift)
    }

    pub(crate) fn encode(&mut self, encoder: &mut RangeEncoder, previous: u8, byte: u8) {
        let context = self.context(previous);
        let probs = &mut self.probs[context];
        let symbol = u32::from(byte);
        let mut index = 1usize;
        for shift in (0..8).rev() {
            let bit = (symbol >> shift) & 1;
            encoder.encode_bit(&mut probs[index], bit);
            index = (index << 1) | bit as usize;
        }
    }

    pub(crate) fn decode(&mut self, decoder: &mut RangeDecoder<'_>, previous: u8) -> u8 {
        let context = self.context(previous);
        let probs = &mut self.probs[context];
        let mut index = 1usize;
        for _ in 0..8 {
            let bit = decoder.decode_bit(&mut probs[index]);
            index = (index << 1) | bit as usize;
        }
        (index - 0x100) as u8
    }
}

/// Fresh adaptive probability for a standalone binary decision.
pub(crate) fn new_prob() -> u16 {
    PROB_INIT
}
