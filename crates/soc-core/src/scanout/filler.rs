//! Memory-domain line filler.
//!
//! Each accepted [`LineRequest`] is fetched as `fill_blocks` read bursts of
//! `block_words` from the framebuffer row into a private scratch line. The
//! complete line is staged after the final finish pulse and committed to the
//! line buffer by the pipeline on the following memory step.

use crate::bus::{BurstClient, BurstRequest, ClientId};
use crate::fault::ConfigError;
use crate::memory::{AddressMap, FrameBufferId, MemoryRegion};
use crate::scanout::reader::LineRequest;
use crate::timing::DisplayTiming;

/// Extra latency injected before the first block of one line's fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FillDelay {
    /// Visible line whose fill is delayed, in every frame.
    pub target_line: u16,
    /// Memory cycles to wait after the publication is sampled.
    pub cycles: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillState {
    Idle,
    Delay { remaining: u32 },
    Requesting,
    InFlight,
}

/// Burst client that copies framebuffer rows into line buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFiller {
    display: DisplayTiming,
    frame_bases: [u32; 2],
    delay: Option<FillDelay>,
    state: FillState,
    job: Option<LineRequest>,
    next_job: Option<LineRequest>,
    block: u16,
    scratch: Vec<u16>,
    staged: Option<LineRequest>,
    abandoned: Vec<LineRequest>,
    accepted: u64,
    ignored: u64,
    abandoned_total: u64,
}

impl LineFiller {
    /// Creates an idle filler reading from the framebuffers of `map`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRegion`] when either framebuffer is
    /// absent.
    pub fn new(
        display: DisplayTiming,
        map: &AddressMap,
        delay: Option<FillDelay>,
    ) -> Result<Self, ConfigError> {
        let base = |frame| {
            let region = MemoryRegion::FrameBuffer(frame);
            map.region(region)
                .map(|row| row.start)
                .ok_or(ConfigError::MissingRegion(region))
        };
        Ok(Self {
            display,
            frame_bases: [base(FrameBufferId::Zero)?, base(FrameBufferId::One)?],
            delay,
            state: FillState::Idle,
            job: None,
            next_job: None,
            block: 0,
            scratch: vec![0; usize::from(display.line_words)],
            staged: None,
            abandoned: Vec::new(),
            accepted: 0,
            ignored: 0,
            abandoned_total: 0,
        })
    }

    /// Line currently being fetched, if any.
    #[must_use]
    pub const fn current_job(&self) -> Option<LineRequest> {
        self.job
    }

    /// Returns `true` when no fill is in progress or staged.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, FillState::Idle) && self.staged.is_none()
    }

    /// Publications accepted for visible lines.
    #[must_use]
    pub const fn accepted_count(&self) -> u64 {
        self.accepted
    }

    /// Publications for blanking lines, ignored.
    #[must_use]
    pub const fn ignored_count(&self) -> u64 {
        self.ignored
    }

    /// Fills abandoned for a newer publication.
    #[must_use]
    pub const fn abandoned_count(&self) -> u64 {
        self.abandoned_total
    }

    /// Scratch line the staged fill was assembled in.
    #[must_use]
    pub fn scratch(&self) -> &[u16] {
        &self.scratch
    }

    /// Takes the completed line awaiting commit.
    pub fn take_staged(&mut self) -> Option<LineRequest> {
        self.staged.take()
    }

    /// Drains the fills abandoned since the last call.
    pub fn take_abandoned(&mut self) -> Vec<LineRequest> {
        std::mem::take(&mut self.abandoned)
    }

    /// Handles a publication sampled from the synchronizer.
    ///
    /// A publication that arrives while a request is asserted waits for the
    /// in-flight burst; one arriving during an injected delay replaces the
    /// delayed fill at once.
    pub fn accept(&mut self, request: LineRequest) {
        if request.line >= self.display.v_active {
            self.ignored += 1;
            return;
        }
        self.accepted += 1;
        match self.state {
            FillState::Idle => self.start(request),
            FillState::Delay { .. } => {
                self.abandon();
                self.start(request);
            }
            FillState::Requesting | FillState::InFlight => {
                if let Some(superseded) = self.next_job.replace(request) {
                    self.abandoned.push(superseded);
                    self.abandoned_total += 1;
                }
            }
        }
    }

    /// Advances one memory-domain step.
    pub const fn step(&mut self) {
        if let FillState::Delay { remaining } = self.state {
            self.state = if remaining <= 1 {
                FillState::Requesting
            } else {
                FillState::Delay {
                    remaining: remaining - 1,
                }
            };
        }
    }

    fn start(&mut self, request: LineRequest) {
        log::trace!(
            "fill line {} of frame {} into {:?}",
            request.line,
            request.frame_seq,
            request.buffer
        );
        self.job = Some(request);
        self.block = 0;
        self.state = match self.delay {
            Some(delay) if delay.target_line == request.line && delay.cycles > 0 => {
                FillState::Delay {
                    remaining: delay.cycles,
                }
            }
            _ => FillState::Requesting,
        };
    }

    fn abandon(&mut self) {
        if let Some(job) = self.job.take() {
            log::debug!(
                "fill of line {} abandoned after {} of {} blocks",
                job.line,
                self.block,
                self.display.fill_blocks
            );
            self.abandoned.push(job);
            self.abandoned_total += 1;
        }
        self.state = FillState::Idle;
    }

    fn block_request(&self, job: &LineRequest) -> BurstRequest {
        let base = match job.frame {
            FrameBufferId::Zero => self.frame_bases[0],
            FrameBufferId::One => self.frame_bases[1],
        };
        let address = base
            + u32::from(job.line) * self.display.row_bytes()
            + u32::from(self.block) * u32::from(self.display.block_words) * 2;
        BurstRequest::read(ClientId::Filler, address, self.display.block_words)
    }
}

impl BurstClient for LineFiller {
    fn request(&self) -> Option<BurstRequest> {
        match self.state {
            FillState::Requesting | FillState::InFlight => {
                self.job.as_ref().map(|job| self.block_request(job))
            }
            FillState::Idle | FillState::Delay { .. } => None,
        }
    }

    fn on_grant(&mut self) {
        if self.state == FillState::Requesting {
            self.state = FillState::InFlight;
        }
    }

    fn read_word(&mut self, index: u16, value: u16) {
        let offset =
            usize::from(self.block) * usize::from(self.display.block_words) + usize::from(index);
        if let Some(slot) = self.scratch.get_mut(offset) {
            *slot = value;
        }
    }

    fn write_word(&mut self, _index: u16) -> u16 {
        0
    }

    fn on_finish(&mut self) {
        self.block += 1;
        if self.block == self.display.fill_blocks {
            self.staged = self.job.take();
            self.state = FillState::Idle;
        } else if self.next_job.is_some() {
            self.abandon();
        } else {
            self.state = FillState::Requesting;
        }
        if let Some(next) = self.next_job.take() {
            self.start(next);
        }
    }

    fn holds_grant(&self) -> bool {
        self.state == FillState::InFlight
    }
}
