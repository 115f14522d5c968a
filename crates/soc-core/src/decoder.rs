//! Instruction word layout and decode.
//!
//! Layout is `[family:2][modifier:6][src:4][dst:4]`. Decode never fails:
//! unassigned encodings map to [`Operation::Unrecognized`], which the core
//! treats as a no-op (or a fault under strict decode).

use crate::encoding::{classify_opcode, encoding_fields, Family, OpcodeEncoding};
use crate::state::Register;

/// Raw 16-bit instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Instruction(u16);

impl Instruction {
    /// Wraps a raw word.
    #[must_use]
    pub const fn from_word(word: u16) -> Self {
        Self(word)
    }

    /// Builds a word from its four fields; each field is masked to width.
    #[must_use]
    pub const fn from_fields(family: Family, modifier: u8, src: u8, dst: u8) -> Self {
        Self(
            ((family as u16) << 14)
                | (((modifier & 0x3F) as u16) << 8)
                | (((src & 0x0F) as u16) << 4)
                | (dst & 0x0F) as u16,
        )
    }

    /// Raw word.
    #[must_use]
    pub const fn word(self) -> u16 {
        self.0
    }

    /// `family` field, bits 15..14.
    #[must_use]
    pub const fn family(self) -> Family {
        Family::from_u2((self.0 >> 14) as u8)
    }

    /// `modifier` field, bits 13..8.
    #[must_use]
    pub const fn modifier(self) -> u8 {
        ((self.0 >> 8) & 0x3F) as u8
    }

    /// `src` field, bits 7..4.
    #[must_use]
    pub const fn src(self) -> u8 {
        ((self.0 >> 4) & 0x0F) as u8
    }

    /// `dst` field, bits 3..0.
    #[must_use]
    pub const fn dst(self) -> u8 {
        (self.0 & 0x0F) as u8
    }

    fn assemble(encoding: OpcodeEncoding, src: u8, dst: u8) -> Self {
        let (family, modifier) = encoding_fields(encoding);
        Self::from_fields(family, modifier, src, dst)
    }

    /// `MOV rd, rs`.
    #[must_use]
    pub fn mov(rd: Register, rs: Register) -> Self {
        Self::assemble(OpcodeEncoding::Mov, rs as u8, rd as u8)
    }

    /// `ADD rd, rs`.
    #[must_use]
    pub fn add(rd: Register, rs: Register) -> Self {
        Self::assemble(OpcodeEncoding::Add, rs as u8, rd as u8)
    }

    /// `XOR rd, rs`.
    #[must_use]
    pub fn xor(rd: Register, rs: Register) -> Self {
        Self::assemble(OpcodeEncoding::Xor, rs as u8, rd as u8)
    }

    /// `ADDI rd, #imm` with a 4-bit immediate.
    #[must_use]
    pub fn addi(rd: Register, imm: u8) -> Self {
        Self::assemble(OpcodeEncoding::Addi, imm, rd as u8)
    }

    /// `PUSH rs`.
    #[must_use]
    pub fn push(rs: Register) -> Self {
        Self::assemble(OpcodeEncoding::Push, 0, rs as u8)
    }

    /// `POP rd`.
    #[must_use]
    pub fn pop(rd: Register) -> Self {
        Self::assemble(OpcodeEncoding::Pop, 0, rd as u8)
    }

    /// Decodes the word into an operation.
    #[must_use]
    pub fn decode(self) -> Operation {
        let rd = Register::from_u4(self.dst());
        let rs = Register::from_u4(self.src());
        match classify_opcode(self.family(), self.modifier()) {
            Some(OpcodeEncoding::Mov) => Operation::Mov { rd, rs },
            Some(OpcodeEncoding::Add) => Operation::Add { rd, rs },
            Some(OpcodeEncoding::Xor) => Operation::Xor { rd, rs },
            Some(OpcodeEncoding::Addi) => Operation::Addi {
                rd,
                imm: u16::from(self.src()),
            },
            Some(OpcodeEncoding::Push) => Operation::Push { rs: rd },
            Some(OpcodeEncoding::Pop) => Operation::Pop { rd },
            None => Operation::Unrecognized {
                family: self.family(),
                modifier: self.modifier(),
            },
        }
    }
}

/// Decoded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operation {
    /// `rd <- rs`.
    Mov {
        /// Destination.
        rd: Register,
        /// Source.
        rs: Register,
    },
    /// `rd <- rd + rs` modulo 2^16.
    Add {
        /// Destination and left operand.
        rd: Register,
        /// Right operand.
        rs: Register,
    },
    /// `rd <- rd ^ rs`.
    Xor {
        /// Destination and left operand.
        rd: Register,
        /// Right operand.
        rs: Register,
    },
    /// `rd <- rd + imm` modulo 2^16.
    Addi {
        /// Destination and left operand.
        rd: Register,
        /// Zero-extended 4-bit immediate.
        imm: u16,
    },
    /// `mem[SP] <- rs; SP += 2`.
    Push {
        /// Register pushed.
        rs: Register,
    },
    /// `SP -= 2; rd <- mem[SP]`.
    Pop {
        /// Register loaded.
        rd: Register,
    },
    /// Unassigned encoding.
    Unrecognized {
        /// Family field.
        family: Family,
        /// Modifier field.
        modifier: u8,
    },
}

impl Operation {
    /// Returns `true` for operations that issue a memory burst.
    #[must_use]
    pub const fn is_memory(self) -> bool {
        matches!(self, Self::Push { .. } | Self::Pop { .. })
    }

    /// Assigned encoding, or `None` for [`Operation::Unrecognized`].
    #[must_use]
    pub const fn encoding(self) -> Option<OpcodeEncoding> {
        match self {
            Self::Mov { .. } => Some(OpcodeEncoding::Mov),
            Self::Add { .. } => Some(OpcodeEncoding::Add),
            Self::Xor { .. } => Some(OpcodeEncoding::Xor),
            Self::Addi { .. } => Some(OpcodeEncoding::Addi),
            Self::Push { .. } => Some(OpcodeEncoding::Push),
            Self::Pop { .. } => Some(OpcodeEncoding::Pop),
            Self::Unrecognized { .. } => None,
        }
    }
}
