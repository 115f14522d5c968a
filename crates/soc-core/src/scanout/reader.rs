//! Pixel-domain scanout reader and frame selector.

use crate::api::{SimContext, TraceEvent};
use crate::memory::FrameBufferId;
use crate::scanout::buffers::{BufferId, LineBufferPair, LineTag};
use crate::timing::DisplayTiming;

/// Line identifier the reader publishes to the filler at each line end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LineRequest {
    /// Buffer that just became the fill target.
    pub buffer: BufferId,
    /// Line to fetch, two lines ahead of the one just finished.
    pub line: u16,
    /// Framebuffer holding the line.
    pub frame: FrameBufferId,
    /// Frame sequence number the line belongs to.
    pub frame_seq: u32,
}

impl LineRequest {
    /// Tag a committed copy of this line carries.
    #[must_use]
    pub const fn tag(&self) -> LineTag {
        LineTag {
            frame_seq: self.frame_seq,
            line: self.line,
        }
    }
}

/// One scanned visible line.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LineRecord {
    /// Frame sequence number.
    pub frame_seq: u32,
    /// Visible line index.
    pub line: u16,
    /// Buffer the line was scanned from.
    pub buffer: BufferId,
    /// Emitted pixels; empty unless line capture is enabled.
    pub pixels: Vec<u16>,
    /// `true` when the buffer did not hold this line.
    pub stale: bool,
}

/// Front/back framebuffer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FrameBufferSelector {
    front: FrameBufferId,
    swaps: u64,
}

impl FrameBufferSelector {
    /// Framebuffer being scanned.
    #[must_use]
    pub const fn front(&self) -> FrameBufferId {
        self.front
    }

    /// Framebuffer available to software.
    #[must_use]
    pub const fn back(&self) -> FrameBufferId {
        self.front.other()
    }

    /// Swaps completed so far.
    #[must_use]
    pub const fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Handles one vertical sync pulse; swaps iff `frame_ready` is set.
    pub const fn on_sync_pulse(&mut self, frame_ready: bool) -> bool {
        if frame_ready {
            self.front = self.front.other();
            self.swaps += 1;
        }
        frame_ready
    }
}

/// Horizontal/vertical counters driving the scan source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanoutReader {
    display: DisplayTiming,
    h: u16,
    v: u16,
    frame_seq: u32,
    frames: FrameBufferSelector,
    capture: bool,
    line_pixels: Vec<u16>,
    current_stale: bool,
    records: Vec<LineRecord>,
    lines_scanned: u64,
    underruns: u64,
    sync_pulses: u64,
}

impl ScanoutReader {
    /// Creates a reader two lines before the end of vertical blanking, so
    /// the first two publications prime lines 0 and 1.
    #[must_use]
    pub fn new(display: DisplayTiming, capture: bool) -> Self {
        Self {
            display,
            h: 0,
            v: display.v_total.saturating_sub(2),
            frame_seq: u32::MAX,
            frames: FrameBufferSelector::default(),
            capture,
            line_pixels: Vec::with_capacity(if capture {
                usize::from(display.h_active)
            } else {
                0
            }),
            current_stale: false,
            records: Vec::new(),
            lines_scanned: 0,
            underruns: 0,
            sync_pulses: 0,
        }
    }

    /// Current `(h, v)` counter position.
    #[must_use]
    pub const fn position(&self) -> (u16, u16) {
        (self.h, self.v)
    }

    /// Sequence number of the frame being scanned. Wraps; the first visible
    /// frame is 0.
    #[must_use]
    pub const fn frame_seq(&self) -> u32 {
        self.frame_seq
    }

    /// Front/back framebuffer selection.
    #[must_use]
    pub const fn frames(&self) -> &FrameBufferSelector {
        &self.frames
    }

    /// Scanned lines in order.
    #[must_use]
    pub fn records(&self) -> &[LineRecord] {
        &self.records
    }

    /// Drains the scanned line records.
    pub fn take_records(&mut self) -> Vec<LineRecord> {
        std::mem::take(&mut self.records)
    }

    /// Visible lines completed.
    #[must_use]
    pub const fn lines_scanned(&self) -> u64 {
        self.lines_scanned
    }

    /// Visible lines scanned from a stale buffer.
    #[must_use]
    pub const fn underruns(&self) -> u64 {
        self.underruns
    }

    /// Vertical sync pulses seen.
    #[must_use]
    pub const fn sync_pulses(&self) -> u64 {
        self.sync_pulses
    }

    /// Advances one pixel clock. Returns the line request to publish when
    /// this step is the first blanking cycle of a line.
    pub fn step(
        &mut self,
        ctx: &SimContext,
        buffers: &mut LineBufferPair,
        events: &mut Vec<TraceEvent>,
    ) -> Option<LineRequest> {
        let display = self.display;
        if self.v == display.v_active && self.h == 0 {
            self.sync_pulses += 1;
            let swapped = self.frames.on_sync_pulse(ctx.frame_ready());
            if swapped {
                log::debug!("frame swap: front is now {:?}", self.frames.front());
            }
            events.push(TraceEvent::SyncPulse {
                frame_seq: self.frame_seq,
                swapped,
                front: self.frames.front(),
            });
        }

        let visible = self.v < display.v_active;
        if visible && self.h < display.h_active && self.capture {
            self.line_pixels.push(buffers.scan_pixel(self.h));
        }

        let mut published = None;
        if self.h == display.h_active {
            if visible {
                self.finish_line(buffers.scan_source());
            }
            published = Some(self.swap_line_buffers(buffers, events));
        }

        self.h += 1;
        if self.h == display.h_total {
            self.h = 0;
            self.v += 1;
            if self.v == display.v_total {
                self.v = 0;
                self.frame_seq = self.frame_seq.wrapping_add(1);
            }
        }
        published
    }

    fn finish_line(&mut self, buffer: BufferId) {
        self.records.push(LineRecord {
            frame_seq: self.frame_seq,
            line: self.v,
            buffer,
            pixels: std::mem::take(&mut self.line_pixels),
            stale: self.current_stale,
        });
        self.lines_scanned += 1;
    }

    fn swap_line_buffers(
        &mut self,
        buffers: &mut LineBufferPair,
        events: &mut Vec<TraceEvent>,
    ) -> LineRequest {
        let display = self.display;
        let fill = buffers.scan_source();
        let source = fill.other();
        buffers.set_scan_source(source);

        let (next_line, next_seq) = self.line_ahead(1);
        self.current_stale = false;
        if next_line < display.v_active {
            let expected = LineTag {
                frame_seq: next_seq,
                line: next_line,
            };
            if buffers.tag(source) != Some(expected) {
                self.current_stale = true;
                self.underruns += 1;
                log::warn!(
                    "underrun: line {next_line} of frame {next_seq} not ready in buffer {source:?}"
                );
                events.push(TraceEvent::Underrun {
                    frame_seq: next_seq,
                    line: next_line,
                });
            }
        }

        let (line, frame_seq) = self.line_ahead(2);
        let request = LineRequest {
            buffer: fill,
            line,
            frame: self.frames.front(),
            frame_seq,
        };
        events.push(TraceEvent::LinePublished(request));
        request
    }

    fn line_ahead(&self, lines: u16) -> (u16, u32) {
        let target = u32::from(self.v) + u32::from(lines);
        let total = u32::from(self.display.v_total);
        let (line, frame_seq) = if target >= total {
            (target - total, self.frame_seq.wrapping_add(1))
        } else {
            (target, self.frame_seq)
        };
        // line < v_total, so it always fits
        (u16::try_from(line).unwrap_or_default(), frame_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameBufferSelector, ScanoutReader};
    use crate::api::{SimContext, TraceEvent};
    use crate::memory::FrameBufferId;
    use crate::scanout::buffers::{BufferId, LineBufferPair, LineTag};
    use crate::timing::DisplayTiming;

    fn tiny() -> DisplayTiming {
        DisplayTiming {
            h_active: 4,
            h_total: 6,
            v_active: 3,
            v_total: 5,
            line_words: 4,
            fill_blocks: 1,
            block_words: 4,
        }
    }

    #[test]
    fn first_publications_prime_lines_zero_and_one() {
        let mut reader = ScanoutReader::new(tiny(), false);
        let mut buffers = LineBufferPair::new(4);
        let mut events = Vec::new();
        let ctx = SimContext::default();
        let mut published = Vec::new();
        for _ in 0..12 {
            if let Some(request) = reader.step(&ctx, &mut buffers, &mut events) {
                published.push(request);
            }
        }
        assert_eq!(published.len(), 2);
        assert_eq!((published[0].line, published[0].frame_seq), (0, 0));
        assert_eq!(published[0].buffer, BufferId::A);
        assert_eq!((published[1].line, published[1].frame_seq), (1, 0));
        assert_eq!(published[1].buffer, BufferId::B);
        assert_eq!(reader.position(), (0, 0));
        assert_eq!(reader.frame_seq(), 0);
    }

    #[test]
    fn publication_targets_wrap_on_the_tallest_display() {
        let display = DisplayTiming {
            v_total: u16::MAX,
            ..tiny()
        };
        let mut reader = ScanoutReader::new(display, false);
        let mut buffers = LineBufferPair::new(4);
        let mut events = Vec::new();
        let ctx = SimContext::default();
        let mut published = Vec::new();
        for _ in 0..12 {
            if let Some(request) = reader.step(&ctx, &mut buffers, &mut events) {
                published.push(request);
            }
        }
        let targets: Vec<(u16, u32)> = published
            .iter()
            .map(|request| (request.line, request.frame_seq))
            .collect();
        assert_eq!(targets, vec![(0, 0), (1, 0)]);
        assert_eq!(reader.position(), (0, 0));
    }

    #[test]
    fn missing_line_is_flagged_stale_and_counted() {
        let mut reader = ScanoutReader::new(tiny(), true);
        let mut buffers = LineBufferPair::new(4);
        let mut events = Vec::new();
        let ctx = SimContext::default();
        for _ in 0..6 {
            reader.step(&ctx, &mut buffers, &mut events);
        }
        // Line 0 arrives in A in time; lines 1 and 2 never do.
        buffers.commit(
            BufferId::A,
            LineTag {
                frame_seq: 0,
                line: 0,
            },
            &[1, 2, 3, 4],
        );
        for _ in 0..18 {
            reader.step(&ctx, &mut buffers, &mut events);
        }
        let records = reader.records();
        assert_eq!(records.len(), 2);
        assert!(!records[0].stale);
        assert_eq!(records[0].pixels, vec![1, 2, 3, 4]);
        assert!(records[1].stale);
        assert_eq!(reader.underruns(), 2);
        assert!(events
            .iter()
            .any(|event| matches!(event, TraceEvent::Underrun { line: 1, .. })));
    }

    #[test]
    fn sync_pulse_swaps_only_when_frame_ready() {
        let mut selector = FrameBufferSelector::default();
        assert!(!selector.on_sync_pulse(false));
        assert_eq!(selector.front(), FrameBufferId::Zero);
        assert!(selector.on_sync_pulse(true));
        assert_eq!(selector.front(), FrameBufferId::One);
        assert_eq!(selector.back(), FrameBufferId::Zero);
        assert_eq!(selector.swaps(), 1);
    }

    #[test]
    fn sync_pulse_fires_once_per_frame() {
        let display = tiny();
        let mut reader = ScanoutReader::new(display, false);
        let mut buffers = LineBufferPair::new(4);
        let mut events = Vec::new();
        let mut ctx = SimContext::default();
        ctx.set_frame_ready(true);
        let frame = u32::from(display.h_total) * u32::from(display.v_total);
        for _ in 0..frame * 3 {
            reader.step(&ctx, &mut buffers, &mut events);
        }
        assert_eq!(reader.sync_pulses(), 3);
        assert_eq!(reader.frames().swaps(), 3);
    }
}
