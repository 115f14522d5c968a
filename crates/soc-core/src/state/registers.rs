//! Register file and stack pointer.

use crate::fault::FaultCode;
use crate::memory::{RegionDescriptor, ADDRESS_MASK};

/// Number of general-purpose registers (`R0..R15`).
pub const REGISTER_COUNT: usize = 16;

/// General-purpose register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Register {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Register {
    /// Ordered list of all registers.
    pub const ALL: [Self; REGISTER_COUNT] = [
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
        Self::R8,
        Self::R9,
        Self::R10,
        Self::R11,
        Self::R12,
        Self::R13,
        Self::R14,
        Self::R15,
    ];

    /// Returns the array index for this register (`0..=15`).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decodes a 4-bit register field. Upper bits are ignored.
    #[must_use]
    pub const fn from_u4(bits: u8) -> Self {
        Self::ALL[(bits & 0x0F) as usize]
    }
}

/// Sixteen 16-bit registers, reset to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    regs: [u16; REGISTER_COUNT],
}

impl RegisterFile {
    /// Reads a register.
    #[must_use]
    pub const fn get(&self, reg: Register) -> u16 {
        self.regs[reg.index()]
    }

    /// Writes a register.
    pub const fn set(&mut self, reg: Register, value: u16) {
        self.regs[reg.index()] = value;
    }

    /// All register values in index order.
    #[must_use]
    pub const fn values(&self) -> [u16; REGISTER_COUNT] {
        self.regs
    }
}

/// 24-bit, always-even stack pointer. The stack grows upward: push writes at
/// the pointer and then advances it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StackPointer(u32);

impl StackPointer {
    /// Creates a pointer, masking to 24 bits and clearing bit 0.
    #[must_use]
    pub const fn new(addr: u32) -> Self {
        Self(addr & ADDRESS_MASK & !1)
    }

    /// Current byte address.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Address written by a push, if the stack region has room.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::StackOverflow`] when the word would land past the
    /// end of `stack`.
    pub const fn push_address(self, stack: &RegionDescriptor) -> Result<u32, FaultCode> {
        if self.0 < stack.start || self.0 + 1 > stack.end {
            return Err(FaultCode::StackOverflow);
        }
        Ok(self.0)
    }

    /// Address read by a pop, if the stack holds at least one word.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::StackUnderflow`] when the pointer is at (or
    /// below) the base of `stack`.
    pub const fn pop_address(self, stack: &RegionDescriptor) -> Result<u32, FaultCode> {
        if self.0 < stack.start + 2 || self.0 > stack.end + 1 {
            return Err(FaultCode::StackUnderflow);
        }
        Ok(self.0 - 2)
    }

    /// Pointer after a completed push.
    #[must_use]
    pub const fn pushed(self) -> Self {
        Self::new(self.0 + 2)
    }

    /// Pointer after a completed pop.
    #[must_use]
    pub const fn popped(self) -> Self {
        Self::new(self.0.wrapping_sub(2))
    }
}

#[cfg(test)]
mod tests {
    use super::{Register, RegisterFile, StackPointer, REGISTER_COUNT};
    use crate::fault::FaultCode;
    use crate::memory::{MemoryRegion, RegionDescriptor};

    const STACK: RegionDescriptor = RegionDescriptor::new(MemoryRegion::Stack, 0x0100, 0x0107);

    #[test]
    fn register_decode_covers_all_sixteen() {
        for bits in 0_u8..16 {
            assert_eq!(Register::from_u4(bits).index(), usize::from(bits));
        }
        assert_eq!(Register::from_u4(0x1F), Register::R15);
        assert_eq!(Register::ALL.len(), REGISTER_COUNT);
    }

    #[test]
    fn register_file_tracks_each_register_independently() {
        let mut file = RegisterFile::default();
        for (offset, reg) in (0_u16..).zip(Register::ALL) {
            file.set(reg, 0x1000 + offset);
        }
        for (offset, reg) in (0_u16..).zip(Register::ALL) {
            assert_eq!(file.get(reg), 0x1000 + offset);
        }
    }

    #[test]
    fn stack_pointer_is_even_and_24_bit() {
        assert_eq!(StackPointer::new(0x0123_4567).value(), 0x23_4566);
    }

    #[test]
    fn push_fills_region_then_overflows() {
        let mut sp = StackPointer::new(STACK.start);
        for expected in [0x0100, 0x0102, 0x0104, 0x0106] {
            assert_eq!(sp.push_address(&STACK), Ok(expected));
            sp = sp.pushed();
        }
        assert_eq!(sp.push_address(&STACK), Err(FaultCode::StackOverflow));
    }

    #[test]
    fn pop_at_base_underflows() {
        let sp = StackPointer::new(STACK.start);
        assert_eq!(sp.pop_address(&STACK), Err(FaultCode::StackUnderflow));
        let sp = sp.pushed();
        assert_eq!(sp.pop_address(&STACK), Ok(0x0100));
        assert_eq!(sp.popped(), StackPointer::new(STACK.start));
    }
}
