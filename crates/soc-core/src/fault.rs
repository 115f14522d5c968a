use thiserror::Error;

use crate::bus::ClientId;
use crate::memory::MemoryRegion;
use crate::timing::ClockDomain;

/// Fault classes used for diagnostics aggregation and policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Burst handshake or addressing contract violation.
    Protocol,
    /// Stack pointer left the stack region.
    Stack,
    /// Instruction word rejected under strict decode.
    Decode,
    /// Clock-domain-crossing contract violation.
    Cdc,
}

/// Stable fault taxonomy. Every fault is fatal to the simulation: it marks a
/// condition that would corrupt state on real hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum FaultCode {
    /// Burst length exceeds the controller's page-derived ceiling.
    #[error("burst length exceeds controller ceiling")]
    BurstTooLong = 0x01,
    /// Burst length of zero words.
    #[error("burst length of zero words")]
    EmptyBurst = 0x02,
    /// Client asserted a new request before its previous one retired.
    #[error("request issued while a previous request is outstanding")]
    RequestWhileOutstanding = 0x03,
    /// Owner changed its request parameters during a burst.
    #[error("request parameters changed mid-burst")]
    RequestChangedMidBurst = 0x04,
    /// Owner deasserted its request before the finish pulse.
    #[error("request deasserted before finish")]
    RequestDroppedMidBurst = 0x05,
    /// Burst start address is not word aligned.
    #[error("burst address is not word aligned")]
    UnalignedAddress = 0x06,
    /// Burst touches memory outside the backing store.
    #[error("burst address outside backing store")]
    AddressOutOfRange = 0x07,
    /// Push would move the stack pointer past the end of the stack region.
    #[error("stack overflow")]
    StackOverflow = 0x08,
    /// Pop would move the stack pointer below the base of the stack region.
    #[error("stack underflow")]
    StackUnderflow = 0x09,
    /// Unrecognized instruction encoding while strict decode is enabled.
    #[error("unknown instruction encoding under strict decode")]
    UnknownInstruction = 0x0A,
    /// Producer republished while the previous toggle was unacknowledged.
    #[error("cdc payload changed before toggle was acknowledged")]
    CdcUnacknowledgedChange = 0x0B,
    /// Producer republished before the stable window elapsed.
    #[error("cdc payload changed inside its stable window")]
    CdcStableWindow = 0x0C,
    /// Controller granted while another client already owned it.
    #[error("grant issued while another client owns the controller")]
    GrantConflict = 0x0D,
}

impl FaultCode {
    /// Converts a fault code to its stable byte value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable byte value back into a fault code.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::BurstTooLong),
            0x02 => Some(Self::EmptyBurst),
            0x03 => Some(Self::RequestWhileOutstanding),
            0x04 => Some(Self::RequestChangedMidBurst),
            0x05 => Some(Self::RequestDroppedMidBurst),
            0x06 => Some(Self::UnalignedAddress),
            0x07 => Some(Self::AddressOutOfRange),
            0x08 => Some(Self::StackOverflow),
            0x09 => Some(Self::StackUnderflow),
            0x0A => Some(Self::UnknownInstruction),
            0x0B => Some(Self::CdcUnacknowledgedChange),
            0x0C => Some(Self::CdcStableWindow),
            0x0D => Some(Self::GrantConflict),
            _ => None,
        }
    }

    /// Returns the diagnostics fault class for this fault code.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::BurstTooLong
            | Self::EmptyBurst
            | Self::RequestWhileOutstanding
            | Self::RequestChangedMidBurst
            | Self::RequestDroppedMidBurst
            | Self::UnalignedAddress
            | Self::AddressOutOfRange
            | Self::GrantConflict => FaultClass::Protocol,
            Self::StackOverflow | Self::StackUnderflow => FaultClass::Stack,
            Self::UnknownInstruction => FaultClass::Decode,
            Self::CdcUnacknowledgedChange | Self::CdcStableWindow => FaultClass::Cdc,
        }
    }
}

/// A raised fault with the context needed to locate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("{code} (detail {detail:#08x})")]
pub struct Fault {
    /// Canonical fault code.
    pub code: FaultCode,
    /// Client involved, when the fault is tied to a burst client.
    pub client: Option<ClientId>,
    /// Code-specific detail: an address, a length or an instruction word.
    pub detail: u32,
}

impl Fault {
    /// Creates a fault with no client and zero detail.
    #[must_use]
    pub const fn new(code: FaultCode) -> Self {
        Self {
            code,
            client: None,
            detail: 0,
        }
    }

    /// Attaches the client involved in the fault.
    #[must_use]
    pub const fn with_client(mut self, client: ClientId) -> Self {
        self.client = Some(client);
        self
    }

    /// Attaches the code-specific detail word.
    #[must_use]
    pub const fn with_detail(mut self, detail: u32) -> Self {
        self.detail = detail;
        self
    }
}

/// Invalid simulation configuration, rejected before any cycle runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A clock period of zero picoseconds.
    #[error("clock period for the {0:?} domain must be non-zero")]
    ZeroClockPeriod(ClockDomain),
    /// Burst ceiling of zero words.
    #[error("burst ceiling must be at least one word")]
    ZeroBurstCeiling,
    /// Word cycle cost of zero.
    #[error("word cycle cost must be at least one cycle")]
    ZeroWordCycles,
    /// `fill_blocks * block_words` does not cover the line buffer.
    #[error("{fill_blocks} blocks of {block_words} words do not cover a {line_words}-word line")]
    BlockGeometry {
        /// Configured line buffer size in words.
        line_words: u16,
        /// Configured block count per line.
        fill_blocks: u16,
        /// Configured words per block.
        block_words: u16,
    },
    /// Fill block larger than the controller accepts in one burst.
    #[error("fill block of {block_words} words exceeds burst ceiling of {ceiling}")]
    BlockExceedsCeiling {
        /// Configured words per block.
        block_words: u16,
        /// Configured burst ceiling.
        ceiling: u16,
    },
    /// Active pixels per line differ from the line buffer size.
    #[error("h_active ({h_active}) must equal line_words ({line_words})")]
    LineWordsMismatch {
        /// Active pixels per line.
        h_active: u16,
        /// Line buffer size in words.
        line_words: u16,
    },
    /// Horizontal total leaves no blanking interval.
    #[error("h_total ({h_total}) must exceed h_active ({h_active})")]
    NoHorizontalBlanking {
        /// Active pixels per line.
        h_active: u16,
        /// Total pixel cycles per line.
        h_total: u16,
    },
    /// Vertical blanking shorter than the two-line fill lookahead.
    #[error("v_total ({v_total}) must be at least v_active ({v_active}) + 2")]
    VerticalBlankingTooShort {
        /// Visible lines per frame.
        v_active: u16,
        /// Total lines per frame.
        v_total: u16,
    },
    /// Stable window shorter than the synchronizer latency.
    #[error("cdc stable window of {window} steps is shorter than sync latency {latency}")]
    StableWindowBelowLatency {
        /// Configured window.
        window: u32,
        /// Synchronizer latency in consumer steps.
        latency: u32,
    },
    /// A required region is missing from the address map.
    #[error("address map has no {0:?} region")]
    MissingRegion(MemoryRegion),
    /// A region appears more than once.
    #[error("address map lists {0:?} more than once")]
    DuplicateRegion(MemoryRegion),
    /// Region bounds are not word aligned or are inverted.
    #[error("region {0:?} must start on an even address and end on an odd one")]
    MisalignedRegion(MemoryRegion),
    /// Region extends past the 24-bit address space.
    #[error("region {0:?} extends past the 24-bit address space")]
    RegionOutOfRange(MemoryRegion),
    /// The stack region ends at the last address, leaving no room for the
    /// pointer to step one word past a full stack.
    #[error("stack region must end below the top of the 24-bit address space")]
    StackAtAddressLimit,
    /// Two regions overlap.
    #[error("regions {0:?} and {1:?} overlap")]
    OverlappingRegions(MemoryRegion, MemoryRegion),
    /// Region too small for its use.
    #[error("region {region:?} needs at least {required_bytes} bytes")]
    RegionTooSmall {
        /// Offending region.
        region: MemoryRegion,
        /// Minimum size in bytes.
        required_bytes: u32,
    },
    /// Memory image segment outside the backing store.
    #[error("memory image segment at {address:#08x} does not fit the backing store")]
    ImageOutOfRange {
        /// Segment start address.
        address: u32,
    },
    /// Memory image segment at an odd address.
    #[error("memory image segment at {address:#08x} is not word aligned")]
    ImageMisaligned {
        /// Segment start address.
        address: u32,
    },
}

/// Error returned by the simulation scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// A component raised a fatal fault.
    #[error("{fault} in {domain:?} domain at cycle {cycle}")]
    Fault {
        /// The raised fault.
        fault: Fault,
        /// Domain whose step raised the fault.
        domain: ClockDomain,
        /// Cycle count of that domain when the fault was raised.
        cycle: u64,
    },
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The simulation already stopped on a fault and cannot advance.
    #[error("simulation is latched on an earlier fault")]
    Latched,
}

impl SimError {
    /// Returns the fault code when this error wraps a fault.
    #[must_use]
    pub const fn fault_code(&self) -> Option<FaultCode> {
        match self {
            Self::Fault { fault, .. } => Some(fault.code),
            Self::Config(_) | Self::Latched => None,
        }
    }
}
