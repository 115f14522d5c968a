//! Backing store, memory images and address-space policies.

/// Burst legality helpers shared by the controller and clients.
pub mod access;
/// Address-space configuration table and region decoder.
pub mod map;

pub use access::{
    validate_burst, validate_burst_length, validate_burst_range, validate_word_alignment,
    WORD_ACCESS_BYTES,
};
pub use map::{
    AddressMap, FrameBufferId, MemoryRegion, RegionDescriptor, ADDRESS_MASK,
    ADDRESS_SPACE_LIMIT, REQUIRED_REGIONS,
};

use crate::fault::ConfigError;

/// Word-addressed backing store of the burst memory device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingMemory {
    words: Box<[u16]>,
}

impl BackingMemory {
    /// Allocates a zeroed store covering `size_bytes` bytes (rounded up to a
    /// whole word).
    #[must_use]
    pub fn new(size_bytes: u32) -> Self {
        let words = (size_bytes as usize).div_ceil(usize::from(WORD_ACCESS_BYTES));
        Self {
            words: vec![0; words].into_boxed_slice(),
        }
    }

    /// Store size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u32 {
        u32::try_from(self.words.len() * usize::from(WORD_ACCESS_BYTES)).unwrap_or(u32::MAX)
    }

    /// Reads the word at an even byte address.
    #[must_use]
    pub fn word(&self, addr: u32) -> Option<u16> {
        if addr & 1 != 0 {
            return None;
        }
        self.words.get((addr >> 1) as usize).copied()
    }

    /// Writes the word at an even byte address. Returns `false` when the
    /// address is odd or unmapped.
    pub fn set_word(&mut self, addr: u32, value: u16) -> bool {
        if addr & 1 != 0 {
            return false;
        }
        if let Some(slot) = self.words.get_mut((addr >> 1) as usize) {
            *slot = value;
            true
        } else {
            false
        }
    }

    /// Copies `len` words starting at `addr`, clamped to the store end.
    #[must_use]
    pub fn words(&self, addr: u32, len: usize) -> &[u16] {
        let start = ((addr >> 1) as usize).min(self.words.len());
        let end = start.saturating_add(len).min(self.words.len());
        &self.words[start..end]
    }
}

/// One contiguous run of words in a [`MemoryImage`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ImageSegment {
    /// Even start byte address.
    pub address: u32,
    /// Words stored from `address` upward.
    pub words: Vec<u16>,
}

/// Initial backing-store contents applied before reset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryImage {
    segments: Vec<ImageSegment>,
}

impl MemoryImage {
    /// Creates an empty image.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Appends a segment. Later segments overwrite earlier ones where they
    /// overlap.
    #[must_use]
    pub fn with_segment(mut self, address: u32, words: Vec<u16>) -> Self {
        self.segments.push(ImageSegment { address, words });
        self
    }

    /// Segments in load order.
    #[must_use]
    pub fn segments(&self) -> &[ImageSegment] {
        &self.segments
    }

    /// Copies every segment into `memory`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ImageMisaligned`] for an odd segment address and
    /// [`ConfigError::ImageOutOfRange`] when a segment runs past the store.
    pub fn load_into(&self, memory: &mut BackingMemory) -> Result<(), ConfigError> {
        for segment in &self.segments {
            if segment.address & 1 != 0 {
                return Err(ConfigError::ImageMisaligned {
                    address: segment.address,
                });
            }
            let bytes = u64::try_from(segment.words.len()).unwrap_or(u64::MAX) * 2;
            if u64::from(segment.address) + bytes > u64::from(memory.size_bytes()) {
                return Err(ConfigError::ImageOutOfRange {
                    address: segment.address,
                });
            }
            let mut addr = segment.address;
            for &word in &segment.words {
                memory.set_word(addr, word);
                addr += u32::from(WORD_ACCESS_BYTES);
            }
        }
        Ok(())
    }
}
