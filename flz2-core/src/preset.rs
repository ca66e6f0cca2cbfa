//! Mapping from a single preset level to concrete compression tunables.

use crate::error::{Error, Result};

const KIB: u32 = 1024;
const MIB: u32 = 1024 * 1024;

/// Compression effort preset on the 1..=10 scale.
///
/// Higher presets monotonically increase dictionary size and match-finder
/// depth, trading CPU time and memory for compression ratio. The mapping to
/// concrete tunables is deterministic for a given preset across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Preset(u8);

impl Preset {
    /// Lowest supported preset level.
    pub const MIN: u32 = 1;

    /// Highest supported preset level.
    pub const MAX: u32 = 10;

    /// Creates a preset from a raw level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPreset`] when `level` is outside 1..=10.
    /// This is reported before any I/O begins.
    pub fn new(level: u32) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&level) {
            #[allow(clippy::cast_possible_truncation)]
            Ok(Self(level as u8))
        } else {
            Err(Error::InvalidPreset { preset: level })
        }
    }

    /// Returns the raw preset level.
    pub fn level(self) -> u32 {
        u32::from(self.0)
    }

    /// Resolves this preset to concrete compression tunables.
    pub(crate) fn resolve(self) -> PresetParams {
        let index = usize::from(self.0 - 1);

        // Dictionary ladder follows the 7-Zip style doubling per level.
        const DICT_SIZES: [u32; 10] = [
            64 * KIB,
            256 * KIB,
            MIB,
            2 * MIB,
            4 * MIB,
            8 * MIB,
            16 * MIB,
            32 * MIB,
            64 * MIB,
            128 * MIB,
        ];
        const MATCH_DEPTHS: [u32; 10] = [8, 12, 16, 24, 32, 48, 64, 96, 128, 160];
        const NICE_LENS: [u32; 10] = [16, 24, 32, 48, 64, 96, 128, 192, 258, 258];

        PresetParams {
            dict_size: DICT_SIZES[index],
            match_depth: MATCH_DEPTHS[index],
            nice_len: NICE_LENS[index],
            literal_context_bits: 3,
        }
    }
}

impl Default for Preset {
    /// The balanced default preset (level 6), matching the original tool.
    fn default() -> Self {
        Self(6)
    }
}

/// Concrete tunables resolved from a [`Preset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PresetParams {
    /// Sliding dictionary window size in bytes.
    pub dict_size: u32,
    /// Maximum hash-chain walk length during match finding.
    pub match_depth: u32,
    /// Match length accepted immediately without further searching.
    pub nice_len: u32,
    /// High bits of the previous byte used as literal coding context.
    pub literal_context_bits: u32,
}
