//! Program listing helpers.

use crate::decoder::{Instruction, Operation};
use crate::encoding::OpcodeEncoding;
use crate::state::Register;

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DisassemblyRow {
    /// Program counter (instruction index).
    pub pc: u16,
    /// Raw instruction word.
    pub word: u16,
    /// Mnemonic, e.g. `ADD`; `.word` for unrecognized encodings.
    pub mnemonic: String,
    /// Formatted operands, e.g. `R0, R1`.
    pub operands: String,
    /// Whether this word decodes as a no-op.
    pub is_unrecognized: bool,
}

/// Disassembles a whole program in order.
#[must_use]
pub fn disassemble(program: &[u16]) -> Vec<DisassemblyRow> {
    (0_u16..)
        .zip(program.iter().copied())
        .map(|(pc, word)| disassemble_one(pc, word))
        .collect()
}

/// Disassembles one word.
#[must_use]
pub fn disassemble_one(pc: u16, word: u16) -> DisassemblyRow {
    let op = Instruction::from_word(word).decode();
    let operands = match op {
        Operation::Mov { rd, rs } | Operation::Add { rd, rs } | Operation::Xor { rd, rs } => {
            format!("{}, {}", format_register(rd), format_register(rs))
        }
        Operation::Addi { rd, imm } => format!("{}, #{imm}", format_register(rd)),
        Operation::Push { rs: reg } | Operation::Pop { rd: reg } => format_register(reg),
        Operation::Unrecognized { .. } => format!("{word:#06x}"),
    };
    DisassemblyRow {
        pc,
        word,
        mnemonic: op
            .encoding()
            .map_or(".word", OpcodeEncoding::mnemonic)
            .to_string(),
        operands,
        is_unrecognized: op.encoding().is_none(),
    }
}

impl DisassemblyRow {
    /// Renders the row as `mnemonic operands`.
    #[must_use]
    pub fn text(&self) -> String {
        format!("{} {}", self.mnemonic, self.operands)
    }
}

fn format_register(reg: Register) -> String {
    format!("R{}", reg.index())
}
