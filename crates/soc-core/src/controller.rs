//! Paged burst memory controller.
//!
//! Timing of one burst of `len` words, counted from the grant pulse at
//! cycle `g`:
//!
//! | cycle                          | activity                      |
//! |--------------------------------|-------------------------------|
//! | `g`                            | grant pulse                   |
//! | `g+1 ..= g+act`                | row activation (idle)         |
//! | `g+act+(i+1)*wc`               | word `i` (data-valid/request) |
//! | `g+act+len*wc+1`               | finish pulse                  |
//! | next `settle` cycles           | grants refused                |
//!
//! Refresh becomes due every `refresh_interval_cycles` and occupies the
//! device for `refresh_cycles` at the next idle moment. It only delays
//! pending requests.

use crate::bus::{BurstClient, BurstRequest, BusEvent, Direction};
use crate::fault::{Fault, FaultCode};
use crate::memory::{validate_burst, BackingMemory};
use crate::timing::TimingConfig;

/// Controller state between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ControllerState {
    /// Ready to grant or refresh.
    Idle,
    /// A burst is in progress.
    Busy {
        /// The granted request.
        request: BurstRequest,
        /// Cycles since the grant pulse.
        elapsed: u32,
    },
    /// Post-finish hold-off; grants are refused.
    Settle {
        /// Remaining hold-off cycles.
        remaining: u16,
    },
    /// Refresh window in progress.
    Refreshing {
        /// Remaining refresh cycles.
        remaining: u16,
    },
}

/// Burst memory controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstController {
    timing: TimingConfig,
    state: ControllerState,
    refresh_timer: u32,
    refresh_due: bool,
    refreshes: u64,
    cycle: u64,
}

impl BurstController {
    /// Creates an idle controller.
    #[must_use]
    pub const fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            state: ControllerState::Idle,
            refresh_timer: 0,
            refresh_due: false,
            refreshes: 0,
            cycle: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    /// Request currently being served, if any.
    #[must_use]
    pub const fn active_request(&self) -> Option<BurstRequest> {
        match self.state {
            ControllerState::Busy { request, .. } => Some(request),
            ControllerState::Idle
            | ControllerState::Settle { .. }
            | ControllerState::Refreshing { .. } => None,
        }
    }

    /// Refresh windows started so far.
    #[must_use]
    pub const fn refresh_count(&self) -> u64 {
        self.refreshes
    }

    /// Memory-domain cycles stepped so far.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Returns `true` while a refresh is due but not yet started.
    #[must_use]
    pub const fn refresh_pending(&self) -> bool {
        self.refresh_due
    }

    /// Advances one memory-domain cycle.
    ///
    /// `forwarded` is the single request selected by the arbiter; `clients`
    /// is indexed by [`crate::bus::ClientId::index`] and receives the
    /// handshake pulses for the request's owner.
    ///
    /// # Errors
    ///
    /// Returns a protocol fault when a newly granted request is illegal, or
    /// when the owner drops or changes its request before finish.
    pub fn step(
        &mut self,
        forwarded: Option<BurstRequest>,
        memory: &mut BackingMemory,
        clients: &mut [&mut dyn BurstClient],
    ) -> Result<Option<BusEvent>, Fault> {
        self.cycle += 1;
        self.tick_refresh_timer();

        match self.state {
            ControllerState::Idle => self.step_idle(forwarded, memory, clients),
            ControllerState::Busy { request, elapsed } => {
                self.step_busy(request, elapsed + 1, forwarded, memory, clients)
            }
            ControllerState::Settle { remaining } => {
                self.state = if remaining <= 1 {
                    ControllerState::Idle
                } else {
                    ControllerState::Settle {
                        remaining: remaining - 1,
                    }
                };
                Ok(None)
            }
            ControllerState::Refreshing { remaining } => {
                self.state = if remaining <= 1 {
                    ControllerState::Idle
                } else {
                    ControllerState::Refreshing {
                        remaining: remaining - 1,
                    }
                };
                Ok(None)
            }
        }
    }

    fn tick_refresh_timer(&mut self) {
        if self.timing.refresh_interval_cycles == 0 {
            return;
        }
        self.refresh_timer += 1;
        if self.refresh_timer >= self.timing.refresh_interval_cycles {
            self.refresh_timer = 0;
            self.refresh_due = true;
        }
    }

    fn step_idle(
        &mut self,
        forwarded: Option<BurstRequest>,
        memory: &BackingMemory,
        clients: &mut [&mut dyn BurstClient],
    ) -> Result<Option<BusEvent>, Fault> {
        if self.refresh_due {
            self.refresh_due = false;
            self.refreshes += 1;
            if self.timing.refresh_cycles > 1 {
                self.state = ControllerState::Refreshing {
                    remaining: self.timing.refresh_cycles - 1,
                };
            }
            log::trace!("refresh started at cycle {}", self.cycle);
            return Ok(Some(BusEvent::Refresh));
        }

        let Some(request) = forwarded else {
            return Ok(None);
        };
        validate_burst(&request, self.timing.burst_ceiling_words, memory.size_bytes())?;

        if let Some(client) = clients.get_mut(request.client.index()) {
            client.on_grant();
        }
        log::debug!(
            "grant {:?} {:?} {:#08x} x{} at cycle {}",
            request.client,
            request.direction,
            request.address,
            request.length,
            self.cycle
        );
        self.state = ControllerState::Busy {
            request,
            elapsed: 0,
        };
        Ok(Some(BusEvent::Grant(request)))
    }

    fn step_busy(
        &mut self,
        request: BurstRequest,
        elapsed: u32,
        forwarded: Option<BurstRequest>,
        memory: &mut BackingMemory,
        clients: &mut [&mut dyn BurstClient],
    ) -> Result<Option<BusEvent>, Fault> {
        match forwarded {
            Some(current) if current == request => {}
            Some(current) => {
                return Err(Fault::new(FaultCode::RequestChangedMidBurst)
                    .with_client(request.client)
                    .with_detail(current.address));
            }
            None => {
                return Err(Fault::new(FaultCode::RequestDroppedMidBurst)
                    .with_client(request.client)
                    .with_detail(elapsed));
            }
        }

        self.state = ControllerState::Busy { request, elapsed };
        let activation = u32::from(self.timing.activation_cycles);
        let word_cycles = u32::from(self.timing.word_cycles);
        let data_end = activation + u32::from(request.length) * word_cycles;

        if elapsed == data_end + 1 {
            if let Some(client) = clients.get_mut(request.client.index()) {
                client.on_finish();
            }
            self.state = if self.timing.settle_cycles == 0 {
                ControllerState::Idle
            } else {
                ControllerState::Settle {
                    remaining: self.timing.settle_cycles,
                }
            };
            log::trace!("finish {:?} at cycle {}", request.client, self.cycle);
            return Ok(Some(BusEvent::Finish(request)));
        }

        if elapsed <= activation || (elapsed - activation) % word_cycles != 0 {
            return Ok(None);
        }
        let Ok(index) = u16::try_from((elapsed - activation) / word_cycles - 1) else {
            return Ok(None);
        };
        let addr = request.word_address(index);
        let Some(client) = clients.get_mut(request.client.index()) else {
            return Ok(None);
        };
        let value = match request.direction {
            Direction::Read => {
                let value = memory.word(addr).unwrap_or(0);
                client.read_word(index, value);
                value
            }
            Direction::Write => {
                let value = client.write_word(index);
                memory.set_word(addr, value);
                value
            }
        };
        Ok(Some(BusEvent::Word {
            client: request.client,
            index,
            value,
        }))
    }
}
