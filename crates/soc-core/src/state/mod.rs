//! Processor register and control state.

/// Register file and stack pointer.
pub mod registers;
/// Processor control-state machine states.
pub mod run_state;

pub use registers::{Register, RegisterFile, StackPointer, REGISTER_COUNT};
pub use run_state::{ProcessorState, SelfTestPhase};
