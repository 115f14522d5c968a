//! Register-only operation semantics.

use crate::decoder::Operation;
use crate::state::{Register, RegisterFile};

/// Destination write produced by a register-only operation, or `None` for
/// stack operations and unrecognized encodings.
#[must_use]
pub const fn register_writeback(op: Operation, regs: &RegisterFile) -> Option<(Register, u16)> {
    match op {
        Operation::Mov { rd, rs } => Some((rd, regs.get(rs))),
        Operation::Add { rd, rs } => Some((rd, regs.get(rd).wrapping_add(regs.get(rs)))),
        Operation::Xor { rd, rs } => Some((rd, regs.get(rd) ^ regs.get(rs))),
        Operation::Addi { rd, imm } => Some((rd, regs.get(rd).wrapping_add(imm))),
        Operation::Push { .. } | Operation::Pop { .. } | Operation::Unrecognized { .. } => None,
    }
}
