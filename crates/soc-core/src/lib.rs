//! Cycle-stepped model of a soft-core SoC: processor, burst memory
//! controller, priority arbiter and dual-buffered scanout.

/// Backing store, memory images and the address map.
pub mod memory;
pub use memory::{
    validate_burst, validate_burst_length, validate_burst_range, validate_word_alignment,
    AddressMap, BackingMemory, FrameBufferId, ImageSegment, MemoryImage, MemoryRegion,
    RegionDescriptor, ADDRESS_MASK, ADDRESS_SPACE_LIMIT, REQUIRED_REGIONS, WORD_ACCESS_BYTES,
};

/// Diagnostics counters snapshot.
pub mod diag;
pub use diag::Diagnostics;

/// Public host-facing configuration, flags, run boundaries and trace hooks.
pub mod api;
pub use api::{
    Program, RunBoundary, RunOutcome, SimConfig, SimContext, StopReason, TraceEvent, TraceSink,
};

/// Processor register file, stack pointer and control state.
pub mod state;
pub use state::{ProcessorState, Register, RegisterFile, SelfTestPhase, StackPointer, REGISTER_COUNT};

/// Opcode classification table.
pub mod encoding;
pub use encoding::{classify_opcode, encoding_fields, Family, OpcodeEncoding, OPCODE_ENCODING_TABLE};

/// Instruction word field extraction and decode.
pub mod decoder;
pub use decoder::{Instruction, Operation};

/// Program listing helpers.
pub mod disasm;
pub use disasm::{disassemble, disassemble_one, DisassemblyRow};

/// Fault taxonomy and error types.
pub mod fault;
pub use fault::{ConfigError, Fault, FaultClass, FaultCode, SimError};

/// Latency parameters, display geometry and clock periods.
pub mod timing;
pub use timing::{validate_stable_window, ClockConfig, ClockDomain, DisplayTiming, TimingConfig};

/// Burst request vocabulary and the client handshake trait.
pub mod bus;
pub use bus::{BurstClient, BurstRequest, BusEvent, ClientId, Direction, CLIENT_COUNT};

/// Toggle-edge clock-domain-crossing synchronizer.
pub mod cdc;
pub use cdc::{ToggleSynchronizer, SYNC_LATENCY_STEPS};

/// Paged burst memory controller.
pub mod controller;
pub use controller::{BurstController, ControllerState};

/// Fixed-priority memory arbiter.
pub mod arbiter;
pub use arbiter::{select, ArbiterStats, MemoryArbiter};

/// Processor fetch/execute state machine.
pub mod execute;
pub use execute::{
    register_writeback, ProcessorCore, RetiredInstruction, SELF_TEST_BYTES, SELF_TEST_PATTERN,
};

/// Host diagnostic monitor client.
pub mod monitor;
pub use monitor::{DiagnosticMonitor, MonitorCommand, MonitorTransfer};

/// Dual-buffered display scanout pipeline.
pub mod scanout;
pub use scanout::{
    BufferId, CommitOutcome, FillDelay, FillStats, FrameBufferSelector, LineBufferPair,
    LineFiller, LineRecord, LineRequest, LineTag, ScanoutPipeline, ScanoutReader,
};

/// Two-clock scheduler owning every component.
pub mod system;
pub use system::{DualClock, System};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
