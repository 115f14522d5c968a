//! Public host-facing API: configuration, host flags, run boundaries and
//! trace hooks.

use crate::bus::BurstRequest;
use crate::decoder::Instruction;
use crate::execute::SELF_TEST_BYTES;
use crate::fault::ConfigError;
use crate::memory::{AddressMap, FrameBufferId, MemoryRegion, RegionDescriptor};
use crate::scanout::{FillDelay, LineRequest};
use crate::timing::{validate_stable_window, ClockConfig, DisplayTiming, TimingConfig};

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Controller and synchronizer timing.
    pub timing: TimingConfig,
    /// Scanout geometry and line-fill split.
    pub display: DisplayTiming,
    /// Clock periods of both domains.
    pub clocks: ClockConfig,
    /// Region table.
    pub address_map: AddressMap,
    /// Treat unrecognized encodings as a fatal fault instead of a no-op.
    pub strict_decode: bool,
    /// Keep the emitted pixels of every scanned line.
    pub capture_lines: bool,
    /// Optional latency injected into one line's fill.
    pub fill_delay: Option<FillDelay>,
}

impl SimConfig {
    /// A 16x8 display with 4-word fill blocks and a matching small address
    /// map. One scan line is exactly 128 memory cycles.
    #[must_use]
    pub fn compact() -> Self {
        Self {
            timing: TimingConfig {
                refresh_interval_cycles: 200,
                refresh_cycles: 4,
                ..TimingConfig::default()
            },
            display: DisplayTiming {
                h_active: 16,
                h_total: 32,
                v_active: 8,
                v_total: 12,
                line_words: 16,
                fill_blocks: 4,
                block_words: 4,
            },
            clocks: ClockConfig {
                memory_period_ps: 10_000,
                pixel_period_ps: 40_000,
            },
            address_map: AddressMap::new(vec![
                RegionDescriptor::new(MemoryRegion::Diagnostic, 0x0000, 0x00FF),
                RegionDescriptor::new(MemoryRegion::Stack, 0x0100, 0x01FF),
                RegionDescriptor::new(
                    MemoryRegion::FrameBuffer(FrameBufferId::Zero),
                    0x0400,
                    0x04FF,
                ),
                RegionDescriptor::new(
                    MemoryRegion::FrameBuffer(FrameBufferId::One),
                    0x0500,
                    0x05FF,
                ),
            ]),
            strict_decode: false,
            capture_lines: false,
            fill_delay: None,
        }
    }

    /// Validates every part of the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clocks.validate()?;
        self.timing.validate()?;
        self.display.validate(&self.timing)?;
        self.address_map.validate(&self.display, SELF_TEST_BYTES)?;
        validate_stable_window(self.timing.stable_window(&self.display, &self.clocks))
    }
}

/// Host-written flags sampled by the model. The host is the only writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SimContext {
    processor_enable: bool,
    frame_ready: bool,
}

impl Default for SimContext {
    fn default() -> Self {
        Self {
            processor_enable: true,
            frame_ready: false,
        }
    }
}

impl SimContext {
    /// Returns `true` while the processor may fetch.
    #[must_use]
    pub const fn processor_enable(&self) -> bool {
        self.processor_enable
    }

    /// Gates processor fetch.
    pub const fn set_processor_enable(&mut self, enable: bool) {
        self.processor_enable = enable;
    }

    /// Returns `true` when the back framebuffer is complete.
    #[must_use]
    pub const fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    /// Requests a front/back swap at the next sync pulse while set.
    pub const fn set_frame_ready(&mut self, ready: bool) {
        self.frame_ready = ready;
    }
}

/// Instruction words held in the processor's instruction store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Program {
    words: Vec<u16>,
}

impl Program {
    /// Wraps raw instruction words.
    #[must_use]
    pub const fn new(words: Vec<u16>) -> Self {
        Self { words }
    }

    /// Encodes a sequence of instructions.
    #[must_use]
    pub fn from_instructions(instructions: &[Instruction]) -> Self {
        Self::new(instructions.iter().copied().map(Instruction::word).collect())
    }

    /// Instruction words in program order.
    #[must_use]
    pub fn words(&self) -> &[u16] {
        &self.words
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` for an empty program.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Consumes the program, returning its words.
    #[must_use]
    pub fn into_words(self) -> Vec<u16> {
        self.words
    }
}

impl From<Vec<u16>> for Program {
    fn from(words: Vec<u16>) -> Self {
        Self::new(words)
    }
}

/// Run loop boundary modes for host-facing batched execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunBoundary {
    /// Stop once the processor has halted or failed its self-test.
    ProcessorHalted,
    /// Stop after this many more visible lines have been scanned.
    LinesScanned(u64),
    /// Stop after this many more sync pulses.
    Frames(u64),
    /// Stop after this many more memory cycles.
    MemoryCycles(u64),
    /// Stop once the monitor has no queued or active command.
    MonitorIdle,
}

/// Why a run call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The requested boundary was reached.
    BoundaryReached,
    /// The caller's memory-cycle limit expired first.
    CycleLimit,
}

/// Aggregated outcome from running until a selected boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Why the run stopped.
    pub stop: StopReason,
    /// Memory-domain cycles stepped during this call.
    pub memory_cycles: u64,
    /// Pixel-domain cycles stepped during this call.
    pub pixel_cycles: u64,
}

/// Deterministic trace events, in the order the model produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// The controller granted a burst.
    BusGrant {
        /// Memory cycle of the grant pulse.
        cycle: u64,
        /// Granted request.
        request: BurstRequest,
    },
    /// The controller retired a burst.
    BusFinish {
        /// Memory cycle of the finish pulse.
        cycle: u64,
        /// Retired request.
        request: BurstRequest,
    },
    /// A refresh window started.
    Refresh {
        /// Memory cycle the window started.
        cycle: u64,
    },
    /// The processor retired an instruction.
    InstructionRetired {
        /// Program counter of the instruction.
        pc: usize,
        /// Raw instruction word.
        word: u16,
    },
    /// The reader published a line request.
    LinePublished(LineRequest),
    /// A filled line was written into its buffer.
    FillCommitted(LineRequest),
    /// A filled line arrived after its buffer became the scan source.
    FillDiscarded(LineRequest),
    /// A fill was abandoned for a newer publication.
    FillAbandoned(LineRequest),
    /// A visible line was scanned from a stale buffer.
    Underrun {
        /// Frame sequence number of the line.
        frame_seq: u32,
        /// Line that was not ready.
        line: u16,
    },
    /// Vertical sync pulse.
    SyncPulse {
        /// Sequence number of the frame that just finished its active area.
        frame_seq: u32,
        /// `true` when front and back were swapped.
        swapped: bool,
        /// Front framebuffer after the pulse.
        front: FrameBufferId,
    },
}

/// Sink trait for deterministic trace hooks.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}
