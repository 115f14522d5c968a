//! Host diagnostic monitor: the highest-priority burst client.
//!
//! The host queues read and write commands; the monitor issues them one at a
//! time and records each completed transfer.

use std::collections::VecDeque;

use crate::bus::{BurstClient, BurstRequest, ClientId};

/// One host command.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MonitorCommand {
    /// Read `length` words starting at `address`.
    Read {
        /// Even start byte address.
        address: u32,
        /// Words to read.
        length: u16,
    },
    /// Write `words` starting at `address`.
    Write {
        /// Even start byte address.
        address: u32,
        /// Words to write; the burst length is `words.len()`.
        words: Vec<u16>,
    },
}

impl MonitorCommand {
    fn request(&self) -> BurstRequest {
        match self {
            Self::Read { address, length } => {
                BurstRequest::read(ClientId::Monitor, *address, *length)
            }
            Self::Write { address, words } => BurstRequest::write(
                ClientId::Monitor,
                *address,
                u16::try_from(words.len()).unwrap_or(u16::MAX),
            ),
        }
    }
}

/// A completed monitor command.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MonitorTransfer {
    /// The command as issued.
    pub command: MonitorCommand,
    /// Words read (empty for writes).
    pub data: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveCommand {
    command: MonitorCommand,
    request: BurstRequest,
    data: Vec<u16>,
    granted: bool,
}

/// Diagnostic monitor client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiagnosticMonitor {
    queue: VecDeque<MonitorCommand>,
    active: Option<ActiveCommand>,
    completed: Vec<MonitorTransfer>,
}

impl DiagnosticMonitor {
    /// Creates an idle monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a command behind any already pending.
    pub fn enqueue(&mut self, command: MonitorCommand) {
        self.queue.push_back(command);
    }

    /// Returns `true` when no command is queued or in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.active.is_none()
    }

    /// Completed transfers in issue order.
    #[must_use]
    pub fn completed(&self) -> &[MonitorTransfer] {
        &self.completed
    }

    /// Drains the completed transfers.
    pub fn take_completed(&mut self) -> Vec<MonitorTransfer> {
        std::mem::take(&mut self.completed)
    }

    /// Advances one memory-domain step: asserts the next queued command once
    /// the previous one has retired.
    pub fn step(&mut self) {
        if self.active.is_some() {
            return;
        }
        if let Some(command) = self.queue.pop_front() {
            let request = command.request();
            log::debug!(
                "monitor issues {:?} {:#08x} x{}",
                request.direction,
                request.address,
                request.length
            );
            self.active = Some(ActiveCommand {
                command,
                request,
                data: Vec::new(),
                granted: false,
            });
        }
    }
}

impl BurstClient for DiagnosticMonitor {
    fn request(&self) -> Option<BurstRequest> {
        self.active.as_ref().map(|active| active.request)
    }

    fn on_grant(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.granted = true;
        }
    }

    fn read_word(&mut self, _index: u16, value: u16) {
        if let Some(active) = self.active.as_mut() {
            active.data.push(value);
        }
    }

    fn write_word(&mut self, index: u16) -> u16 {
        match self.active.as_ref().map(|active| &active.command) {
            Some(MonitorCommand::Write { words, .. }) => {
                words.get(usize::from(index)).copied().unwrap_or(0)
            }
            Some(MonitorCommand::Read { .. }) | None => 0,
        }
    }

    fn on_finish(&mut self) {
        if let Some(active) = self.active.take() {
            self.completed.push(MonitorTransfer {
                command: active.command,
                data: active.data,
            });
        }
    }

    fn holds_grant(&self) -> bool {
        self.active.as_ref().is_some_and(|active| active.granted)
    }
}
