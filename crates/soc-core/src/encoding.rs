/// Instruction families (`family` field, bits 15..14).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Family {
    /// Register-to-register and register-immediate operations.
    Register = 0b00,
    /// Stack operations.
    Stack = 0b01,
    /// Unassigned family `10`.
    Reserved10 = 0b10,
    /// Unassigned family `11`.
    Reserved11 = 0b11,
}

impl Family {
    /// Converts the 2-bit family field. Upper bits are ignored.
    #[must_use]
    pub const fn from_u2(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Register,
            0b01 => Self::Stack,
            0b10 => Self::Reserved10,
            _ => Self::Reserved11,
        }
    }

    /// Returns `true` for families with no assigned encodings.
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        matches!(self, Self::Reserved10 | Self::Reserved11)
    }
}

/// Assigned `(family, modifier)` encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum OpcodeEncoding {
    Mov,
    Add,
    Xor,
    Addi,
    Push,
    Pop,
}

impl OpcodeEncoding {
    /// Assembly mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Mov => "MOV",
            Self::Add => "ADD",
            Self::Xor => "XOR",
            Self::Addi => "ADDI",
            Self::Push => "PUSH",
            Self::Pop => "POP",
        }
    }
}

/// Single source-of-truth encoding table.
///
/// Any `(family, modifier)` pair not present here decodes as a no-op.
pub const OPCODE_ENCODING_TABLE: &[(Family, u8, OpcodeEncoding)] = &[
    (Family::Register, 0b00_0000, OpcodeEncoding::Mov),
    (Family::Register, 0b00_0001, OpcodeEncoding::Add),
    (Family::Register, 0b00_0101, OpcodeEncoding::Xor),
    (Family::Register, 0b01_0000, OpcodeEncoding::Addi),
    (Family::Stack, 0b00_0010, OpcodeEncoding::Push),
    (Family::Stack, 0b00_0011, OpcodeEncoding::Pop),
];

/// Returns the assigned encoding for a family/modifier pair.
///
/// `None` means the pair is unassigned.
#[must_use]
pub fn classify_opcode(family: Family, modifier: u8) -> Option<OpcodeEncoding> {
    if modifier > 0x3F {
        return None;
    }

    OPCODE_ENCODING_TABLE
        .iter()
        .find_map(|(entry_family, entry_modifier, encoding)| {
            ((*entry_family == family) && (*entry_modifier == modifier)).then_some(*encoding)
        })
}

/// Returns the `(family, modifier)` pair assigned to an encoding.
#[must_use]
pub fn encoding_fields(encoding: OpcodeEncoding) -> (Family, u8) {
    OPCODE_ENCODING_TABLE
        .iter()
        .find_map(|(family, modifier, entry)| (*entry == encoding).then_some((*family, *modifier)))
        .unwrap_or((Family::Reserved11, 0x3F))
}
