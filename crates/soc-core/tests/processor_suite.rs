//! Processor suite: instruction semantics, stack behavior and decode modes
//! driven through the full system.

#![allow(clippy::pedantic, clippy::nursery, clippy::cast_possible_truncation)]

use log as _;
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use soc_core::{
    register_writeback, AddressMap, ClockDomain, ConfigError, FaultCode, FrameBufferId,
    Instruction, MemoryImage, MemoryRegion, Operation, ProcessorState, Program, Register,
    RegionDescriptor, RegisterFile, RunBoundary, SimConfig, SimError, StopReason, System,
    ADDRESS_MASK,
};
use thiserror as _;

const CYCLE_LIMIT: u64 = 100_000;

fn run_program(config: SimConfig, program: &[Instruction]) -> Result<System, SimError> {
    let mut system = System::new(
        config,
        Program::from_instructions(program),
        &MemoryImage::new(),
    )?;
    let outcome = system.run(RunBoundary::ProcessorHalted, CYCLE_LIMIT)?;
    assert_eq!(outcome.stop, StopReason::BoundaryReached);
    Ok(system)
}

fn run_compact(program: &[Instruction]) -> System {
    run_program(SimConfig::compact(), program).expect("program runs without faults")
}

#[rstest]
#[case::mov(Operation::Mov { rd: Register::R2, rs: Register::R1 }, 0x1234, 0x0001, 0x1234)]
#[case::add(Operation::Add { rd: Register::R2, rs: Register::R1 }, 9, 3, 12)]
#[case::add_wraps(Operation::Add { rd: Register::R2, rs: Register::R1 }, 0xFFFF, 0x0002, 0x0001)]
#[case::xor(Operation::Xor { rd: Register::R2, rs: Register::R1 }, 0b1100, 0b1010, 0b0110)]
#[case::xor_self_clears(Operation::Xor { rd: Register::R1, rs: Register::R1 }, 0xBEEF, 0xBEEF, 0)]
#[case::addi(Operation::Addi { rd: Register::R2, imm: 15 }, 0, 0xFFF5, 0x0004)]
fn register_operation_semantics(
    #[case] operation: Operation,
    #[case] r1: u16,
    #[case] r2: u16,
    #[case] expected: u16,
) {
    let mut regs = RegisterFile::default();
    regs.set(Register::R1, r1);
    regs.set(Register::R2, r2);
    let (rd, value) = register_writeback(operation, &regs).expect("register operation");
    assert_eq!(value, expected);
    assert!(rd == Register::R1 || rd == Register::R2);
}

#[rstest]
#[case::mov(
    vec![Instruction::addi(Register::R1, 7), Instruction::mov(Register::R2, Register::R1)],
    Register::R2,
    7
)]
#[case::add(
    vec![
        Instruction::addi(Register::R1, 9),
        Instruction::addi(Register::R2, 3),
        Instruction::add(Register::R2, Register::R1),
    ],
    Register::R2,
    12
)]
#[case::xor(
    vec![
        Instruction::addi(Register::R1, 12),
        Instruction::addi(Register::R2, 10),
        Instruction::xor(Register::R2, Register::R1),
    ],
    Register::R2,
    6
)]
#[case::addi_accumulates(
    vec![Instruction::addi(Register::R4, 15), Instruction::addi(Register::R4, 15)],
    Register::R4,
    30
)]
fn programs_retire_expected_register_values(
    #[case] program: Vec<Instruction>,
    #[case] register: Register,
    #[case] expected: u16,
) {
    let system = run_compact(&program);
    assert_eq!(system.registers().get(register), expected);
    assert_eq!(
        system.diagnostics().instructions_retired,
        program.len() as u64
    );
}

#[test]
fn push_xor_pop_restores_value_through_memory() {
    let system = run_compact(&[
        Instruction::xor(Register::R0, Register::R0),
        Instruction::addi(Register::R0, 5),
        Instruction::push(Register::R0),
        Instruction::xor(Register::R0, Register::R0),
        Instruction::pop(Register::R0),
        Instruction::mov(Register::R3, Register::R0),
    ]);
    assert_eq!(system.registers().get(Register::R3), 5);
    assert_eq!(system.processor().state(), ProcessorState::Halted);

    let stack = system
        .config()
        .address_map
        .region(MemoryRegion::Stack)
        .expect("stack region");
    assert_eq!(system.processor().stack_pointer().value(), stack.start);
    assert_eq!(system.memory().word(stack.start), Some(5));
}

#[test]
fn two_pushes_pop_in_reverse_order() {
    let system = run_compact(&[
        Instruction::addi(Register::R1, 9),
        Instruction::push(Register::R1),
        Instruction::addi(Register::R2, 3),
        Instruction::push(Register::R2),
        Instruction::pop(Register::R3),
        Instruction::pop(Register::R4),
        Instruction::add(Register::R4, Register::R3),
    ]);
    assert_eq!(system.registers().get(Register::R3), 3);
    assert_eq!(system.registers().get(Register::R4), 12);
}

fn compact_with_stack(start: u32, end: u32) -> SimConfig {
    let mut config = SimConfig::compact();
    config.address_map = AddressMap::new(vec![
        RegionDescriptor::new(MemoryRegion::Diagnostic, 0x0000, 0x00FF),
        RegionDescriptor::new(MemoryRegion::Stack, start, end),
        RegionDescriptor::new(MemoryRegion::FrameBuffer(FrameBufferId::Zero), 0x0400, 0x04FF),
        RegionDescriptor::new(MemoryRegion::FrameBuffer(FrameBufferId::One), 0x0500, 0x05FF),
    ]);
    config
}

#[test]
fn full_stack_near_top_of_address_space_pops_in_order() {
    let program = [
        Instruction::addi(Register::R1, 9),
        Instruction::push(Register::R1),
        Instruction::addi(Register::R1, 1),
        Instruction::push(Register::R1),
        Instruction::pop(Register::R2),
        Instruction::pop(Register::R3),
    ];
    let system = run_program(compact_with_stack(0xFF_FFF8, 0xFF_FFFB), &program)
        .expect("two-word stack holds two pushes");
    assert_eq!(system.registers().get(Register::R2), 10);
    assert_eq!(system.registers().get(Register::R3), 9);
    assert_eq!(system.processor().stack_pointer().value(), 0xFF_FFF8);
}

#[test]
fn stack_ending_at_last_address_is_rejected_at_reset() {
    let error = run_program(
        compact_with_stack(0xFF_FFFC, ADDRESS_MASK),
        &[Instruction::push(Register::R1)],
    )
    .expect_err("config rejected");
    assert_eq!(error, SimError::Config(ConfigError::StackAtAddressLimit));
}

#[test]
fn stack_ops_cost_a_burst_each_register_ops_do_not() {
    let system = run_compact(&[
        Instruction::addi(Register::R1, 1),
        Instruction::push(Register::R1),
        Instruction::pop(Register::R2),
        Instruction::mov(Register::R3, Register::R2),
    ]);
    let diagnostics = system.diagnostics();
    // self-test write and read-back, then one burst per stack op
    assert_eq!(
        diagnostics.arbiter.grants_for(soc_core::ClientId::Processor),
        4
    );
    assert_eq!(diagnostics.instructions_retired, 4);
}

#[test]
fn pop_on_empty_stack_is_a_fatal_stack_fault() {
    let error = run_program(SimConfig::compact(), &[Instruction::pop(Register::R1)])
        .expect_err("underflow");
    assert_eq!(error.fault_code(), Some(FaultCode::StackUnderflow));
    assert!(matches!(
        error,
        SimError::Fault {
            domain: ClockDomain::Memory,
            ..
        }
    ));
}

#[test]
fn pushing_past_stack_region_overflows() {
    // 256-byte stack holds 128 words
    let program = vec![Instruction::push(Register::R0); 129];
    let error = run_program(SimConfig::compact(), &program).expect_err("overflow");
    assert_eq!(error.fault_code(), Some(FaultCode::StackOverflow));
}

#[test]
fn unknown_encoding_is_counted_noop_by_default() {
    let program = Program::new(vec![
        Instruction::addi(Register::R1, 2).word(),
        0xC123,
        0x8F00,
        Instruction::addi(Register::R1, 3).word(),
    ]);
    let mut system =
        System::new(SimConfig::compact(), program, &MemoryImage::new()).expect("valid config");
    system
        .run(RunBoundary::ProcessorHalted, CYCLE_LIMIT)
        .expect("lenient decode");
    assert_eq!(system.registers().get(Register::R1), 5);
    let diagnostics = system.diagnostics();
    assert_eq!(diagnostics.unknown_instructions, 2);
    assert_eq!(diagnostics.instructions_retired, 4);
}

#[test]
fn strict_decode_faults_and_latches() {
    let config = SimConfig {
        strict_decode: true,
        ..SimConfig::compact()
    };
    let mut system = System::new(config, Program::new(vec![0xC123]), &MemoryImage::new())
        .expect("valid config");
    let error = system
        .run(RunBoundary::ProcessorHalted, CYCLE_LIMIT)
        .expect_err("strict decode");
    assert_eq!(error.fault_code(), Some(FaultCode::UnknownInstruction));
    assert_eq!(system.latched_error(), Some(&error));
    assert_eq!(system.step(), Err(SimError::Latched));
}

#[test]
fn disabled_processor_idles_until_enabled() {
    let mut system = System::new(
        SimConfig::compact(),
        Program::from_instructions(&[Instruction::addi(Register::R1, 1)]),
        &MemoryImage::new(),
    )
    .expect("valid config");
    system.context_mut().set_processor_enable(false);
    system
        .run(RunBoundary::MemoryCycles(500), CYCLE_LIMIT)
        .expect("idle");
    assert_eq!(system.registers().get(Register::R1), 0);
    assert_eq!(system.processor().state(), ProcessorState::Fetch);

    system.context_mut().set_processor_enable(true);
    system
        .run(RunBoundary::ProcessorHalted, CYCLE_LIMIT)
        .expect("runs");
    assert_eq!(system.registers().get(Register::R1), 1);
}

fn stack_program(values: &[u8]) -> Vec<Instruction> {
    let mut program = Vec::new();
    for &value in values {
        program.push(Instruction::xor(Register::R1, Register::R1));
        program.push(Instruction::addi(Register::R1, value));
        program.push(Instruction::push(Register::R1));
    }
    for index in 0..values.len() {
        program.push(Instruction::pop(Register::from_u4(8 + index as u8)));
    }
    program
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn property_stack_is_lifo(values in prop::collection::vec(0u8..16, 1..=8)) {
        let system = run_compact(&stack_program(&values));
        for (index, expected) in values.iter().rev().enumerate() {
            let register = Register::from_u4(8 + index as u8);
            prop_assert_eq!(system.registers().get(register), u16::from(*expected));
        }
    }

    #[test]
    fn property_stack_pointer_stays_even_and_in_region(
        values in prop::collection::vec(0u8..16, 1..=8)
    ) {
        let config = SimConfig::compact();
        let stack = config
            .address_map
            .region(MemoryRegion::Stack)
            .expect("stack region");
        let mut system = System::new(
            config,
            Program::from_instructions(&stack_program(&values)),
            &MemoryImage::new(),
        )
        .expect("valid config");
        while !system.processor().state().is_terminal() {
            system.step().expect("no fault");
            let sp = system.processor().stack_pointer().value();
            prop_assert_eq!(sp % 2, 0);
            prop_assert!(sp >= stack.start && sp <= stack.end + 1);
        }
        prop_assert_eq!(system.processor().stack_pointer().value(), stack.start);
    }
}
