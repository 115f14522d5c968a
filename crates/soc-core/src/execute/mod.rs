//! Processor fetch/execute state machine.
//!
//! One instruction is consumed per memory-domain step. Register-only
//! operations retire in the step that fetched them. `PUSH`/`POP` issue a
//! single-word burst and block fetch in `MemoryWait`; the stack pointer and
//! destination register are committed together on the finish pulse.

mod helpers;

pub use helpers::register_writeback;

use crate::api::SimContext;
use crate::bus::{BurstClient, BurstRequest, ClientId};
use crate::decoder::{Instruction, Operation};
use crate::fault::{ConfigError, Fault, FaultCode};
use crate::memory::{AddressMap, MemoryRegion, RegionDescriptor};
use crate::state::{
    ProcessorState, Register, RegisterFile, SelfTestPhase, StackPointer, REGISTER_COUNT,
};

/// Pattern written to and read back from the diagnostic region at reset.
pub const SELF_TEST_PATTERN: [u16; 4] = [0xA5A5, 0x5A5A, 0xFFFF, 0x0000];

/// Bytes of diagnostic region the self-test needs.
#[allow(clippy::cast_possible_truncation)]
pub const SELF_TEST_BYTES: u32 = (SELF_TEST_PATTERN.len() * 2) as u32;

/// An instruction that has fully retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RetiredInstruction {
    /// Program counter of the instruction.
    pub pc: usize,
    /// Raw word.
    pub instruction: Instruction,
    /// Decoded operation.
    pub operation: Operation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKind {
    SelfTestWrite,
    SelfTestRead,
    Push { value: u16 },
    Pop { rd: Register },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Outstanding {
    request: BurstRequest,
    kind: PendingKind,
    pc: usize,
    instruction: Instruction,
    granted: bool,
}

/// The processor core and its burst-client port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorCore {
    regs: RegisterFile,
    sp: StackPointer,
    pc: usize,
    program: Vec<u16>,
    state: ProcessorState,
    outstanding: Option<Outstanding>,
    readback: [u16; SELF_TEST_PATTERN.len()],
    loaded: u16,
    stack: RegionDescriptor,
    diag_base: u32,
    strict_decode: bool,
    retired: u64,
    unknown: u64,
    last_retired: Option<RetiredInstruction>,
}

impl ProcessorCore {
    /// Creates a core in reset. The stack pointer starts at the base of the
    /// stack region and the self-test targets the base of the diagnostic
    /// region.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRegion`] when `map` lacks either region.
    pub fn new(
        program: Vec<u16>,
        map: &AddressMap,
        strict_decode: bool,
    ) -> Result<Self, ConfigError> {
        let stack = map
            .region(MemoryRegion::Stack)
            .ok_or(ConfigError::MissingRegion(MemoryRegion::Stack))?;
        let diag = map
            .region(MemoryRegion::Diagnostic)
            .ok_or(ConfigError::MissingRegion(MemoryRegion::Diagnostic))?;
        Ok(Self {
            regs: RegisterFile::default(),
            sp: StackPointer::new(stack.start),
            pc: 0,
            program,
            state: ProcessorState::default(),
            outstanding: None,
            readback: [0; SELF_TEST_PATTERN.len()],
            loaded: 0,
            stack,
            diag_base: diag.start,
            strict_decode,
            retired: 0,
            unknown: 0,
            last_retired: None,
        })
    }

    /// Control state.
    #[must_use]
    pub const fn state(&self) -> ProcessorState {
        self.state
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Register values in index order.
    #[must_use]
    pub const fn register_values(&self) -> [u16; REGISTER_COUNT] {
        self.regs.values()
    }

    /// Stack pointer.
    #[must_use]
    pub const fn stack_pointer(&self) -> StackPointer {
        self.sp
    }

    /// Index of the next instruction to fetch.
    #[must_use]
    pub const fn pc(&self) -> usize {
        self.pc
    }

    /// Instructions retired so far, including unrecognized no-ops.
    #[must_use]
    pub const fn retired_count(&self) -> u64 {
        self.retired
    }

    /// Unrecognized encodings executed as no-ops.
    #[must_use]
    pub const fn unknown_count(&self) -> u64 {
        self.unknown
    }

    /// Self-test verdict: `None` while it is still running.
    #[must_use]
    pub const fn self_test_passed(&self) -> Option<bool> {
        match self.state {
            ProcessorState::Init(_) => None,
            ProcessorState::SelfTestFailed => Some(false),
            ProcessorState::Fetch | ProcessorState::MemoryWait | ProcessorState::Halted => {
                Some(true)
            }
        }
    }

    /// Takes the instruction retired since the last call, if any.
    pub fn take_retired(&mut self) -> Option<RetiredInstruction> {
        self.last_retired.take()
    }

    /// Advances the core by one memory-domain step.
    ///
    /// # Errors
    ///
    /// Returns a stack fault when a push or pop would leave the stack region
    /// and [`FaultCode::UnknownInstruction`] for an unrecognized encoding
    /// under strict decode. The core state is unchanged on error.
    pub fn step(&mut self, ctx: &SimContext) -> Result<(), Fault> {
        match self.state {
            ProcessorState::Init(phase) => {
                if self.outstanding.is_none() {
                    self.issue_self_test(phase);
                }
                Ok(())
            }
            ProcessorState::Fetch if ctx.processor_enable() => self.fetch(),
            ProcessorState::Fetch
            | ProcessorState::MemoryWait
            | ProcessorState::Halted
            | ProcessorState::SelfTestFailed => Ok(()),
        }
    }

    fn issue_self_test(&mut self, phase: SelfTestPhase) {
        #[allow(clippy::cast_possible_truncation)]
        let length = SELF_TEST_PATTERN.len() as u16;
        let (request, kind) = match phase {
            SelfTestPhase::WritePattern => (
                BurstRequest::write(ClientId::Processor, self.diag_base, length),
                PendingKind::SelfTestWrite,
            ),
            SelfTestPhase::ReadBack => (
                BurstRequest::read(ClientId::Processor, self.diag_base, length),
                PendingKind::SelfTestRead,
            ),
        };
        self.outstanding = Some(Outstanding {
            request,
            kind,
            pc: self.pc,
            instruction: Instruction::from_word(0),
            granted: false,
        });
    }

    fn fetch(&mut self) -> Result<(), Fault> {
        let Some(&word) = self.program.get(self.pc) else {
            log::debug!("processor halted at pc {}", self.pc);
            self.state = ProcessorState::Halted;
            return Ok(());
        };
        let instruction = Instruction::from_word(word);
        let operation = instruction.decode();

        let (request, kind) = match operation {
            Operation::Push { rs } => {
                let address = self.sp.push_address(&self.stack).map_err(|code| {
                    Fault::new(code)
                        .with_client(ClientId::Processor)
                        .with_detail(self.sp.value())
                })?;
                (
                    BurstRequest::write(ClientId::Processor, address, 1),
                    PendingKind::Push {
                        value: self.regs.get(rs),
                    },
                )
            }
            Operation::Pop { rd } => {
                let address = self.sp.pop_address(&self.stack).map_err(|code| {
                    Fault::new(code)
                        .with_client(ClientId::Processor)
                        .with_detail(self.sp.value())
                })?;
                (
                    BurstRequest::read(ClientId::Processor, address, 1),
                    PendingKind::Pop { rd },
                )
            }
            Operation::Unrecognized { .. } => {
                if self.strict_decode {
                    return Err(Fault::new(FaultCode::UnknownInstruction)
                        .with_client(ClientId::Processor)
                        .with_detail(u32::from(word)));
                }
                self.unknown += 1;
                self.retire(self.pc, instruction, operation);
                self.pc += 1;
                return Ok(());
            }
            Operation::Mov { .. }
            | Operation::Add { .. }
            | Operation::Xor { .. }
            | Operation::Addi { .. } => {
                if let Some((rd, value)) = register_writeback(operation, &self.regs) {
                    self.regs.set(rd, value);
                }
                self.retire(self.pc, instruction, operation);
                self.pc += 1;
                return Ok(());
            }
        };

        self.outstanding = Some(Outstanding {
            request,
            kind,
            pc: self.pc,
            instruction,
            granted: false,
        });
        self.state = ProcessorState::MemoryWait;
        self.pc += 1;
        Ok(())
    }

    fn retire(&mut self, pc: usize, instruction: Instruction, operation: Operation) {
        self.retired += 1;
        self.last_retired = Some(RetiredInstruction {
            pc,
            instruction,
            operation,
        });
    }
}

impl BurstClient for ProcessorCore {
    fn request(&self) -> Option<BurstRequest> {
        self.outstanding.map(|pending| pending.request)
    }

    fn on_grant(&mut self) {
        if let Some(pending) = self.outstanding.as_mut() {
            pending.granted = true;
        }
    }

    fn read_word(&mut self, index: u16, value: u16) {
        let Some(pending) = self.outstanding else {
            return;
        };
        match pending.kind {
            PendingKind::SelfTestRead => {
                if let Some(slot) = self.readback.get_mut(usize::from(index)) {
                    *slot = value;
                }
            }
            PendingKind::Pop { .. } => self.loaded = value,
            PendingKind::SelfTestWrite | PendingKind::Push { .. } => {}
        }
    }

    fn write_word(&mut self, index: u16) -> u16 {
        match self.outstanding.map(|pending| pending.kind) {
            Some(PendingKind::SelfTestWrite) => SELF_TEST_PATTERN
                .get(usize::from(index))
                .copied()
                .unwrap_or(0),
            Some(PendingKind::Push { value }) => value,
            Some(PendingKind::SelfTestRead | PendingKind::Pop { .. }) | None => 0,
        }
    }

    fn on_finish(&mut self) {
        let Some(pending) = self.outstanding.take() else {
            return;
        };
        match pending.kind {
            PendingKind::SelfTestWrite => {
                self.state = ProcessorState::Init(SelfTestPhase::ReadBack);
            }
            PendingKind::SelfTestRead => {
                if self.readback == SELF_TEST_PATTERN {
                    log::debug!("memory self-test passed");
                    self.state = ProcessorState::Fetch;
                } else {
                    log::error!(
                        "memory self-test failed: read back {:04x?}",
                        self.readback
                    );
                    self.state = ProcessorState::SelfTestFailed;
                }
            }
            PendingKind::Push { .. } => {
                self.sp = self.sp.pushed();
                self.state = ProcessorState::Fetch;
                self.retire(pending.pc, pending.instruction, pending.instruction.decode());
            }
            PendingKind::Pop { rd } => {
                self.regs.set(rd, self.loaded);
                self.sp = self.sp.popped();
                self.state = ProcessorState::Fetch;
                self.retire(pending.pc, pending.instruction, pending.instruction.decode());
            }
        }
    }

    fn holds_grant(&self) -> bool {
        self.outstanding.is_some_and(|pending| pending.granted)
    }
}

#[cfg(test)]
mod tests {
    use super::{ProcessorCore, SELF_TEST_PATTERN};
    use crate::api::SimContext;
    use crate::bus::{BurstClient, Direction};
    use crate::decoder::Instruction;
    use crate::fault::FaultCode;
    use crate::memory::AddressMap;
    use crate::state::{ProcessorState, Register, SelfTestPhase};

    fn complete_burst(core: &mut ProcessorCore, read_back: &[u16]) {
        let request = core.request().expect("request asserted");
        core.on_grant();
        assert!(core.holds_grant());
        for index in 0..request.length {
            match request.direction {
                Direction::Read => core.read_word(index, read_back[usize::from(index)]),
                Direction::Write => {
                    core.write_word(index);
                }
            }
        }
        core.on_finish();
        assert!(core.request().is_none());
    }

    fn booted(program: Vec<u16>, strict: bool) -> ProcessorCore {
        let ctx = SimContext::default();
        let mut core = ProcessorCore::new(program, &AddressMap::default(), strict).expect("map");
        core.step(&ctx).expect("self-test write");
        complete_burst(&mut core, &[]);
        core.step(&ctx).expect("self-test read");
        complete_burst(&mut core, &SELF_TEST_PATTERN);
        assert_eq!(core.state(), ProcessorState::Fetch);
        core
    }

    #[test]
    fn self_test_writes_pattern_then_reads_back() {
        let ctx = SimContext::default();
        let mut core = ProcessorCore::new(vec![], &AddressMap::default(), false).expect("map");
        core.step(&ctx).expect("step");
        let write = core.request().expect("pattern write");
        assert_eq!(write.direction, Direction::Write);
        assert_eq!(write.address, 0);
        assert_eq!(write.length, 4);
        core.on_grant();
        let words: Vec<u16> = (0..4).map(|index| core.write_word(index)).collect();
        assert_eq!(words, SELF_TEST_PATTERN);
        core.on_finish();
        assert_eq!(core.state(), ProcessorState::Init(SelfTestPhase::ReadBack));
        assert_eq!(core.self_test_passed(), None);
    }

    #[test]
    fn self_test_mismatch_is_terminal() {
        let ctx = SimContext::default();
        let mut core = ProcessorCore::new(vec![], &AddressMap::default(), false).expect("map");
        core.step(&ctx).expect("step");
        complete_burst(&mut core, &[]);
        core.step(&ctx).expect("step");
        complete_burst(&mut core, &[0xA5A5, 0x5A5A, 0xFFFF, 0x0001]);
        assert_eq!(core.state(), ProcessorState::SelfTestFailed);
        assert_eq!(core.self_test_passed(), Some(false));
        core.step(&ctx).expect("idle");
        assert!(core.request().is_none());
    }

    #[test]
    fn register_ops_retire_one_per_step() {
        let mut core = booted(
            vec![
                Instruction::addi(Register::R1, 5).word(),
                Instruction::mov(Register::R2, Register::R1).word(),
                Instruction::add(Register::R2, Register::R1).word(),
            ],
            false,
        );
        let ctx = SimContext::default();
        for _ in 0..3 {
            core.step(&ctx).expect("step");
        }
        assert_eq!(core.registers().get(Register::R2), 10);
        assert_eq!(core.retired_count(), 3);
        core.step(&ctx).expect("step");
        assert_eq!(core.state(), ProcessorState::Halted);
    }

    #[test]
    fn push_commits_stack_pointer_on_finish() {
        let mut core = booted(vec![Instruction::push(Register::R0).word()], false);
        let sp = core.stack_pointer();
        core.step(&SimContext::default()).expect("step");
        assert_eq!(core.state(), ProcessorState::MemoryWait);
        assert_eq!(core.stack_pointer(), sp);
        complete_burst(&mut core, &[]);
        assert_eq!(core.stack_pointer(), sp.pushed());
        assert_eq!(core.state(), ProcessorState::Fetch);
    }

    #[test]
    fn pop_on_empty_stack_underflows() {
        let mut core = booted(vec![Instruction::pop(Register::R3).word()], false);
        let fault = core.step(&SimContext::default()).expect_err("underflow");
        assert_eq!(fault.code, FaultCode::StackUnderflow);
        assert_eq!(core.pc(), 0);
    }

    #[test]
    fn unknown_encoding_is_noop_unless_strict() {
        let ctx = SimContext::default();
        let mut lenient = booted(vec![0xC123], false);
        lenient.step(&ctx).expect("no-op");
        assert_eq!(lenient.unknown_count(), 1);
        assert_eq!(lenient.register_values(), [0; 16]);

        let mut strict = booted(vec![0xC123], true);
        let fault = strict.step(&ctx).expect_err("strict decode");
        assert_eq!(fault.code, FaultCode::UnknownInstruction);
        assert_eq!(fault.detail, 0xC123);
    }

    #[test]
    fn disabled_processor_does_not_fetch() {
        let mut core = booted(vec![Instruction::addi(Register::R1, 1).word()], false);
        let mut ctx = SimContext::default();
        ctx.set_processor_enable(false);
        core.step(&ctx).expect("idle");
        assert_eq!(core.pc(), 0);
        ctx.set_processor_enable(true);
        core.step(&ctx).expect("fetch");
        assert_eq!(core.registers().get(Register::R1), 1);
    }
}
