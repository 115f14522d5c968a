/// Phases of the reset-time memory self-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SelfTestPhase {
    /// Writing the pattern burst to the diagnostic region.
    WritePattern,
    /// Reading the pattern back for comparison.
    ReadBack,
}

/// Processor control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ProcessorState {
    /// Reset self-test in progress.
    Init(SelfTestPhase),
    /// Ready to fetch the next instruction.
    Fetch,
    /// A stack burst is outstanding; fetch is blocked until it finishes.
    MemoryWait,
    /// Program counter ran past the last instruction.
    Halted,
    /// Self-test read-back did not match the written pattern.
    SelfTestFailed,
}

impl Default for ProcessorState {
    fn default() -> Self {
        Self::Init(SelfTestPhase::WritePattern)
    }
}

impl ProcessorState {
    /// Returns `true` for states the core never leaves.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Halted | Self::SelfTestFailed)
    }
}
