//! Address-space configuration table and region decoding.
//!
//! The map is data supplied with the simulation configuration; nothing in
//! the model hard-codes region addresses.

use crate::fault::ConfigError;
use crate::timing::DisplayTiming;

/// Exclusive upper bound of the 24-bit byte address space.
pub const ADDRESS_SPACE_LIMIT: u32 = 1 << 24;
/// Mask applied to 24-bit addresses.
pub const ADDRESS_MASK: u32 = ADDRESS_SPACE_LIMIT - 1;

/// Identifier of one of the two alternating framebuffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FrameBufferId {
    /// Framebuffer 0; the front buffer after reset.
    #[default]
    Zero,
    /// Framebuffer 1.
    One,
}

impl FrameBufferId {
    /// Returns the other framebuffer.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }
}

/// Region classification for byte addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MemoryRegion {
    /// Diagnostic scratch region, also the target of the processor self-test.
    Diagnostic,
    /// Processor stack; grows upward from its base.
    Stack,
    /// One of the two framebuffers.
    FrameBuffer(FrameBufferId),
}

/// Regions every address map must contain.
pub const REQUIRED_REGIONS: [MemoryRegion; 4] = [
    MemoryRegion::Diagnostic,
    MemoryRegion::Stack,
    MemoryRegion::FrameBuffer(FrameBufferId::Zero),
    MemoryRegion::FrameBuffer(FrameBufferId::One),
];

/// One row of the address map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegionDescriptor {
    /// Region classification.
    pub region: MemoryRegion,
    /// Inclusive start byte address (even).
    pub start: u32,
    /// Inclusive end byte address (odd).
    pub end: u32,
}

impl RegionDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub const fn new(region: MemoryRegion, start: u32, end: u32) -> Self {
        Self { region, start, end }
    }

    /// Returns `true` when `addr` lies inside this region.
    #[must_use]
    pub const fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr <= self.end
    }

    /// Region size in bytes.
    #[must_use]
    pub const fn len_bytes(&self) -> u32 {
        self.end - self.start + 1
    }

    const fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Address-space configuration table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AddressMap {
    regions: Vec<RegionDescriptor>,
}

impl Default for AddressMap {
    /// Layout for the default 1024x768 display: a small diagnostic window,
    /// a 4 KiB stack and two 1.5 MiB framebuffers.
    fn default() -> Self {
        Self::new(vec![
            RegionDescriptor::new(MemoryRegion::Diagnostic, 0x00_0000, 0x00_00FF),
            RegionDescriptor::new(MemoryRegion::Stack, 0x00_1000, 0x00_1FFF),
            RegionDescriptor::new(
                MemoryRegion::FrameBuffer(FrameBufferId::Zero),
                0x10_0000,
                0x27_FFFF,
            ),
            RegionDescriptor::new(
                MemoryRegion::FrameBuffer(FrameBufferId::One),
                0x30_0000,
                0x47_FFFF,
            ),
        ])
    }
}

impl AddressMap {
    /// Builds a map from descriptor rows. Call [`AddressMap::validate`]
    /// before use.
    #[must_use]
    pub const fn new(regions: Vec<RegionDescriptor>) -> Self {
        Self { regions }
    }

    /// Rows of the table in declaration order.
    #[must_use]
    pub fn regions(&self) -> &[RegionDescriptor] {
        &self.regions
    }

    /// Looks up the descriptor of a region.
    #[must_use]
    pub fn region(&self, region: MemoryRegion) -> Option<RegionDescriptor> {
        self.regions.iter().copied().find(|row| row.region == region)
    }

    /// Decodes a byte address into its region, if mapped.
    #[must_use]
    pub fn decode(&self, addr: u32) -> Option<MemoryRegion> {
        self.regions
            .iter()
            .find(|row| row.contains(addr))
            .map(|row| row.region)
    }

    /// Size in bytes of a backing store that covers every region.
    #[must_use]
    pub fn extent_bytes(&self) -> u32 {
        self.regions
            .iter()
            .map(|row| row.end.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    /// Base byte address of a framebuffer row.
    #[must_use]
    pub fn frame_row_address(
        &self,
        frame: FrameBufferId,
        line: u16,
        display: &DisplayTiming,
    ) -> Option<u32> {
        self.region(MemoryRegion::FrameBuffer(frame))
            .map(|row| row.start + u32::from(line) * display.row_bytes())
    }

    /// Validates the table: every required region exactly once, aligned,
    /// inside 24 bits, non-overlapping and large enough for its use.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(
        &self,
        display: &DisplayTiming,
        min_diagnostic_bytes: u32,
    ) -> Result<(), ConfigError> {
        for required in REQUIRED_REGIONS {
            match self.regions.iter().filter(|row| row.region == required).count() {
                0 => return Err(ConfigError::MissingRegion(required)),
                1 => {}
                _ => return Err(ConfigError::DuplicateRegion(required)),
            }
        }

        for row in &self.regions {
            if row.start & 1 != 0 || row.end & 1 != 1 || row.end < row.start {
                return Err(ConfigError::MisalignedRegion(row.region));
            }
            if row.end >= ADDRESS_SPACE_LIMIT {
                return Err(ConfigError::RegionOutOfRange(row.region));
            }
            if row.region == MemoryRegion::Stack && row.end == ADDRESS_MASK {
                return Err(ConfigError::StackAtAddressLimit);
            }
        }

        for (index, first) in self.regions.iter().enumerate() {
            if let Some(second) = self.regions[index + 1..]
                .iter()
                .find(|other| first.overlaps(other))
            {
                return Err(ConfigError::OverlappingRegions(first.region, second.region));
            }
        }

        for frame in [FrameBufferId::Zero, FrameBufferId::One] {
            let region = MemoryRegion::FrameBuffer(frame);
            if let Some(row) = self.region(region) {
                if row.len_bytes() < display.frame_bytes() {
                    return Err(ConfigError::RegionTooSmall {
                        region,
                        required_bytes: display.frame_bytes(),
                    });
                }
            }
        }

        if let Some(row) = self.region(MemoryRegion::Diagnostic) {
            if row.len_bytes() < min_diagnostic_bytes {
                return Err(ConfigError::RegionTooSmall {
                    region: MemoryRegion::Diagnostic,
                    required_bytes: min_diagnostic_bytes,
                });
            }
        }

        Ok(())
    }
}
