//! Dual-buffered display scanout pipeline.
//!
//! The [`ScanoutReader`] runs on the pixel clock and the [`LineFiller`] on
//! the memory clock. Their only shared state is the [`LineBufferPair`]; line
//! identifiers cross from reader to filler through a
//! [`ToggleSynchronizer`].

pub mod buffers;
pub mod filler;
pub mod reader;

pub use buffers::{BufferId, CommitOutcome, LineBufferPair, LineTag};
pub use filler::{FillDelay, LineFiller};
pub use reader::{FrameBufferSelector, LineRecord, LineRequest, ScanoutReader};

use crate::api::{SimConfig, SimContext, TraceEvent};
use crate::cdc::ToggleSynchronizer;
use crate::fault::{ConfigError, Fault};

/// Fill outcome counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FillStats {
    /// Lines written into the fill target.
    pub committed: u64,
    /// Complete lines dropped because their buffer was already scanning.
    pub discarded: u64,
}

/// Reader, filler, line buffers and the synchronizer between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanoutPipeline {
    buffers: LineBufferPair,
    reader: ScanoutReader,
    filler: LineFiller,
    cdc: ToggleSynchronizer<LineRequest>,
    stats: FillStats,
}

impl ScanoutPipeline {
    /// Builds the pipeline for a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRegion`] when a framebuffer region is
    /// absent from the address map.
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        let display = config.display;
        Ok(Self {
            buffers: LineBufferPair::new(display.line_words),
            reader: ScanoutReader::new(display, config.capture_lines),
            filler: LineFiller::new(display, &config.address_map, config.fill_delay)?,
            cdc: ToggleSynchronizer::new(config.timing.stable_window(&display, &config.clocks)),
            stats: FillStats::default(),
        })
    }

    /// Line buffers.
    #[must_use]
    pub const fn buffers(&self) -> &LineBufferPair {
        &self.buffers
    }

    /// Pixel-domain reader.
    #[must_use]
    pub const fn reader(&self) -> &ScanoutReader {
        &self.reader
    }

    /// Mutable reader, for draining line records.
    pub const fn reader_mut(&mut self) -> &mut ScanoutReader {
        &mut self.reader
    }

    /// Memory-domain filler.
    #[must_use]
    pub const fn filler(&self) -> &LineFiller {
        &self.filler
    }

    /// Filler as an arbiter client.
    pub const fn filler_mut(&mut self) -> &mut LineFiller {
        &mut self.filler
    }

    /// Fill outcome counters.
    #[must_use]
    pub const fn fill_stats(&self) -> FillStats {
        self.stats
    }

    /// Memory-domain half: commits a staged line, samples the synchronizer
    /// and advances the filler. Runs before the arbiter in each memory step.
    pub fn memory_step(&mut self, events: &mut Vec<TraceEvent>) {
        if let Some(job) = self.filler.take_staged() {
            let outcome = self
                .buffers
                .commit(job.buffer, job.tag(), self.filler.scratch());
            match outcome {
                CommitOutcome::Committed => {
                    self.stats.committed += 1;
                    events.push(TraceEvent::FillCommitted(job));
                }
                CommitOutcome::Discarded => {
                    self.stats.discarded += 1;
                    log::debug!(
                        "late fill of line {} discarded: {:?} is scanning",
                        job.line,
                        job.buffer
                    );
                    events.push(TraceEvent::FillDiscarded(job));
                }
            }
        }
        events.extend(
            self.filler
                .take_abandoned()
                .into_iter()
                .map(TraceEvent::FillAbandoned),
        );

        if let Some(request) = self.cdc.tick_consumer() {
            self.filler.accept(request);
        }
        self.filler.step();
    }

    /// Pixel-domain half: advances the reader one pixel and publishes its
    /// line request, if any.
    ///
    /// # Errors
    ///
    /// Returns a CDC fault when the publication violates the synchronizer
    /// contract.
    pub fn pixel_step(
        &mut self,
        ctx: &SimContext,
        events: &mut Vec<TraceEvent>,
    ) -> Result<(), Fault> {
        if let Some(request) = self.reader.step(ctx, &mut self.buffers, events) {
            self.cdc.publish(request)?;
        }
        Ok(())
    }
}
