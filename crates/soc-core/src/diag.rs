//! Diagnostics counters collected from every component.

use crate::arbiter::ArbiterStats;
use crate::bus::ClientId;

/// Point-in-time snapshot of the model's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Diagnostics {
    /// Memory-domain cycles simulated.
    pub memory_cycles: u64,
    /// Pixel-domain cycles simulated.
    pub pixel_cycles: u64,
    /// Instructions retired, including unrecognized no-ops.
    pub instructions_retired: u64,
    /// Unrecognized encodings executed as no-ops.
    pub unknown_instructions: u64,
    /// Self-test verdict; `None` while it is still running.
    pub self_test_passed: Option<bool>,
    /// Arbitration counters.
    pub arbiter: ArbiterStats,
    /// Refresh windows started.
    pub refreshes: u64,
    /// Visible lines scanned.
    pub lines_scanned: u64,
    /// Visible lines scanned from a stale buffer.
    pub underruns: u64,
    /// Fills written into their buffer.
    pub fills_committed: u64,
    /// Complete fills that arrived after their buffer began scanning.
    pub fills_discarded: u64,
    /// Fills abandoned for a newer publication.
    pub fills_abandoned: u64,
    /// Vertical sync pulses.
    pub sync_pulses: u64,
    /// Front/back framebuffer swaps.
    pub frame_swaps: u64,
}

impl Diagnostics {
    /// Grants issued to the scanout filler.
    #[must_use]
    pub const fn filler_grants(&self) -> u64 {
        self.arbiter.grants_for(ClientId::Filler)
    }

    /// Fraction of scanned lines that were stale, in parts per million.
    #[must_use]
    pub const fn underrun_ppm(&self) -> u64 {
        if self.lines_scanned == 0 {
            return 0;
        }
        self.underruns * 1_000_000 / self.lines_scanned
    }
}
