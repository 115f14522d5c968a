//! Latency parameters, display geometry and clock periods.
//!
//! All values are data: the defaults describe one specific memory device and
//! an XGA-class display mode, and every field may be overridden.

use crate::cdc::SYNC_LATENCY_STEPS;
use crate::fault::ConfigError;

/// The two independently clocked domains of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ClockDomain {
    /// Processor, arbiter, controller and filler.
    Memory,
    /// Scanout reader and frame sync.
    Pixel,
}

/// Default burst ceiling in words (one device page).
pub const DEFAULT_BURST_CEILING_WORDS: u16 = 256;
/// Default row activation delay between grant and first word.
pub const DEFAULT_ACTIVATION_CYCLES: u16 = 3;
/// Default idle cycles required between back-to-back bursts.
pub const DEFAULT_SETTLE_CYCLES: u16 = 2;
/// Default refresh interval in memory cycles.
pub const DEFAULT_REFRESH_INTERVAL_CYCLES: u32 = 780;
/// Default refresh window length in memory cycles.
pub const DEFAULT_REFRESH_CYCLES: u16 = 8;

/// Burst controller and CDC timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimingConfig {
    /// Maximum burst length in words.
    pub burst_ceiling_words: u16,
    /// Idle cycles between the grant pulse and the first data cycle.
    pub activation_cycles: u16,
    /// Cycles spent per transferred word.
    pub word_cycles: u16,
    /// Idle cycles the controller requires after each finish pulse.
    pub settle_cycles: u16,
    /// Memory cycles between refresh requests; zero disables refresh.
    pub refresh_interval_cycles: u32,
    /// Length of one refresh window in memory cycles.
    pub refresh_cycles: u16,
    /// CDC stable window in memory-domain steps. `None` uses one scan-line
    /// period.
    pub cdc_stable_window: Option<u32>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            burst_ceiling_words: DEFAULT_BURST_CEILING_WORDS,
            activation_cycles: DEFAULT_ACTIVATION_CYCLES,
            word_cycles: 1,
            settle_cycles: DEFAULT_SETTLE_CYCLES,
            refresh_interval_cycles: DEFAULT_REFRESH_INTERVAL_CYCLES,
            refresh_cycles: DEFAULT_REFRESH_CYCLES,
            cdc_stable_window: None,
        }
    }
}

impl TimingConfig {
    /// Cycles from grant pulse to finish pulse inclusive for a burst of
    /// `length` words.
    #[must_use]
    pub const fn burst_cycles(&self, length: u16) -> u32 {
        self.activation_cycles as u32 + length as u32 * self.word_cycles as u32 + 2
    }

    /// Effective CDC stable window for the given display and clocks.
    #[must_use]
    pub fn stable_window(&self, display: &DisplayTiming, clocks: &ClockConfig) -> u32 {
        self.cdc_stable_window
            .unwrap_or_else(|| display.line_period_memory_cycles(clocks))
    }

    /// Validates controller parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero ceiling or zero word cost.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.burst_ceiling_words == 0 {
            return Err(ConfigError::ZeroBurstCeiling);
        }
        if self.word_cycles == 0 {
            return Err(ConfigError::ZeroWordCycles);
        }
        Ok(())
    }
}

/// Scanout geometry and line-fill block split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DisplayTiming {
    /// Visible pixels per line.
    pub h_active: u16,
    /// Pixel cycles per line including blanking.
    pub h_total: u16,
    /// Visible lines per frame.
    pub v_active: u16,
    /// Lines per frame including vertical blanking.
    pub v_total: u16,
    /// Words per line buffer.
    pub line_words: u16,
    /// Bursts per line fill.
    pub fill_blocks: u16,
    /// Words per fill burst.
    pub block_words: u16,
}

impl Default for DisplayTiming {
    fn default() -> Self {
        Self {
            h_active: 1024,
            h_total: 1344,
            v_active: 768,
            v_total: 806,
            line_words: 1024,
            fill_blocks: 4,
            block_words: 256,
        }
    }
}

impl DisplayTiming {
    /// One scan line expressed in whole memory-domain cycles (rounded down).
    #[must_use]
    pub fn line_period_memory_cycles(&self, clocks: &ClockConfig) -> u32 {
        let line_ps = u64::from(self.h_total) * u64::from(clocks.pixel_period_ps);
        let cycles = line_ps / u64::from(clocks.memory_period_ps.max(1));
        u32::try_from(cycles).unwrap_or(u32::MAX)
    }

    /// Bytes occupied by one framebuffer row.
    #[must_use]
    pub const fn row_bytes(&self) -> u32 {
        self.line_words as u32 * 2
    }

    /// Bytes occupied by one full framebuffer.
    #[must_use]
    pub const fn frame_bytes(&self) -> u32 {
        self.row_bytes() * self.v_active as u32
    }

    /// Validates geometry against the controller ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when blocks do not tile the line, a block
    /// exceeds the ceiling, or blanking intervals are too short.
    pub const fn validate(&self, timing: &TimingConfig) -> Result<(), ConfigError> {
        if self.h_active != self.line_words {
            return Err(ConfigError::LineWordsMismatch {
                h_active: self.h_active,
                line_words: self.line_words,
            });
        }
        if self.h_total <= self.h_active {
            return Err(ConfigError::NoHorizontalBlanking {
                h_active: self.h_active,
                h_total: self.h_total,
            });
        }
        if (self.v_total as u32) < self.v_active as u32 + 2 {
            return Err(ConfigError::VerticalBlankingTooShort {
                v_active: self.v_active,
                v_total: self.v_total,
            });
        }
        if self.fill_blocks as u32 * self.block_words as u32 != self.line_words as u32
            || self.block_words == 0
        {
            return Err(ConfigError::BlockGeometry {
                line_words: self.line_words,
                fill_blocks: self.fill_blocks,
                block_words: self.block_words,
            });
        }
        if self.block_words > timing.burst_ceiling_words {
            return Err(ConfigError::BlockExceedsCeiling {
                block_words: self.block_words,
                ceiling: timing.burst_ceiling_words,
            });
        }
        Ok(())
    }
}

/// Clock periods of the two domains in picoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClockConfig {
    /// Memory-domain clock period.
    pub memory_period_ps: u32,
    /// Pixel-domain clock period.
    pub pixel_period_ps: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        // 100 MHz memory clock, 65 MHz pixel clock.
        Self {
            memory_period_ps: 10_000,
            pixel_period_ps: 15_385,
        }
    }
}

impl ClockConfig {
    /// Validates that both periods are non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroClockPeriod`] naming the offending domain.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_period_ps == 0 {
            return Err(ConfigError::ZeroClockPeriod(ClockDomain::Memory));
        }
        if self.pixel_period_ps == 0 {
            return Err(ConfigError::ZeroClockPeriod(ClockDomain::Pixel));
        }
        Ok(())
    }
}

/// Validates the CDC window against the synchronizer latency.
///
/// # Errors
///
/// Returns [`ConfigError::StableWindowBelowLatency`] when the window cannot
/// cover one synchronized transition.
pub const fn validate_stable_window(window: u32) -> Result<(), ConfigError> {
    if window < SYNC_LATENCY_STEPS {
        return Err(ConfigError::StableWindowBelowLatency {
            window,
            latency: SYNC_LATENCY_STEPS,
        });
    }
    Ok(())
}
