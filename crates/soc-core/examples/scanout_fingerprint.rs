//! Deterministic scanout fingerprint: runs a stack program against a
//! patterned framebuffer on the compact display and hashes every scanned
//! line plus the final counters.

use std::cell::Cell;
use std::rc::Rc;

use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use soc_core::{
    FrameBufferId, Instruction, MemoryImage, MemoryRegion, Program, Register, RunBoundary,
    SimConfig, System, TraceEvent, TraceSink,
};
use thiserror as _;

#[derive(Clone)]
struct EventHash(Rc<Cell<u64>>);

impl TraceSink for EventHash {
    fn on_event(&mut self, event: TraceEvent) {
        let tag: u8 = match event {
            TraceEvent::BusGrant { .. } => 1,
            TraceEvent::BusFinish { .. } => 2,
            TraceEvent::Refresh { .. } => 3,
            TraceEvent::InstructionRetired { .. } => 4,
            TraceEvent::LinePublished(_) => 5,
            TraceEvent::FillCommitted(_) => 6,
            TraceEvent::FillDiscarded(_) => 7,
            TraceEvent::FillAbandoned(_) => 8,
            TraceEvent::Underrun { .. } => 9,
            TraceEvent::SyncPulse { .. } => 10,
        };
        let mut hash = self.0.get();
        hash_bytes(&mut hash, &[tag]);
        self.0.set(hash);
    }
}

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn framebuffer(config: &SimConfig) -> MemoryImage {
    let display = config.display;
    let mut image = MemoryImage::new();
    for (region, tag) in [
        (MemoryRegion::FrameBuffer(FrameBufferId::Zero), 0x0000),
        (MemoryRegion::FrameBuffer(FrameBufferId::One), 0x8000),
    ] {
        let Some(base) = config.address_map.region(region).map(|row| row.start) else {
            continue;
        };
        for line in 0..display.v_active {
            let row: Vec<u16> = (0..display.line_words)
                .map(|x| tag | (line << 8) | x)
                .collect();
            image = image.with_segment(base + u32::from(line) * display.row_bytes(), row);
        }
    }
    image
}

fn program() -> Program {
    let mut instructions = vec![Instruction::addi(Register::R1, 9)];
    for _ in 0..16 {
        instructions.push(Instruction::push(Register::R1));
        instructions.push(Instruction::add(Register::R2, Register::R1));
        instructions.push(Instruction::pop(Register::R3));
    }
    Program::from_instructions(&instructions)
}

fn fingerprint() -> String {
    let mut config = SimConfig::compact();
    config.capture_lines = true;
    let image = framebuffer(&config);
    let mut system = System::new(config, program(), &image).expect("compact config is valid");
    system.context_mut().set_frame_ready(true);
    let events = EventHash(Rc::new(Cell::new(0xcbf2_9ce4_8422_2325)));
    system.set_trace_sink(Box::new(events.clone()));

    system
        .run(RunBoundary::Frames(3), 1_000_000)
        .expect("run should not fault");

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for record in system.line_records() {
        hash_bytes(&mut hash, &record.frame_seq.to_le_bytes());
        hash_bytes(&mut hash, &record.line.to_le_bytes());
        hash_bytes(&mut hash, &[u8::from(record.stale)]);
        for pixel in &record.pixels {
            hash_bytes(&mut hash, &pixel.to_le_bytes());
        }
    }

    let diagnostics = system.diagnostics();
    for counter in [
        diagnostics.memory_cycles,
        diagnostics.pixel_cycles,
        diagnostics.instructions_retired,
        diagnostics.refreshes,
        diagnostics.underruns,
        diagnostics.frame_swaps,
    ] {
        hash_bytes(&mut hash, &counter.to_le_bytes());
    }
    for value in system.registers().values() {
        hash_bytes(&mut hash, &value.to_le_bytes());
    }

    format!(
        "{hash:016x} events={:016x} lines={} underruns={} grants={}",
        events.0.get(),
        diagnostics.lines_scanned,
        diagnostics.underruns,
        diagnostics.arbiter.grants.iter().sum::<u64>()
    )
}

fn main() {
    println!("{}", fingerprint());
}
