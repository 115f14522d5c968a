//! Toggle-edge clock-domain-crossing synchronizer for wide payloads.
//!
//! The producer writes the payload and flips a toggle bit in the same step.
//! The consumer passes the toggle through two synchronizer flops and an edge
//! register, then samples the payload on the detected edge. The payload is
//! only safe to sample if the producer keeps it stable for the whole
//! crossing, so the producer side enforces a stable window and refuses to
//! republish before the previous transition was seen.

use crate::fault::{Fault, FaultCode};

/// Consumer steps between a publish and the edge that samples it.
pub const SYNC_LATENCY_STEPS: u32 = 3;

/// Two-flop toggle synchronizer with an edge register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleSynchronizer<T> {
    payload: Option<T>,
    toggle: bool,
    stages: [bool; 3],
    acknowledged: bool,
    steps_since_publish: u32,
    window: u32,
}

impl<T: Copy> ToggleSynchronizer<T> {
    /// Creates a synchronizer whose producer must hold each payload for at
    /// least `window` consumer steps.
    #[must_use]
    pub const fn new(window: u32) -> Self {
        Self {
            payload: None,
            toggle: false,
            stages: [false; 3],
            acknowledged: true,
            steps_since_publish: u32::MAX,
            window,
        }
    }

    /// Configured stable window in consumer steps.
    #[must_use]
    pub const fn window(&self) -> u32 {
        self.window
    }

    /// Returns `true` once the consumer has sampled the latest payload.
    #[must_use]
    pub const fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// Producer side: writes `payload` and flips the toggle.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::CdcUnacknowledgedChange`] when the consumer has
    /// not yet seen the previous transition and [`FaultCode::CdcStableWindow`]
    /// when fewer than `window` consumer steps have elapsed since it. The
    /// payload is left untouched on error.
    pub fn publish(&mut self, payload: T) -> Result<(), Fault> {
        if !self.acknowledged {
            return Err(Fault::new(FaultCode::CdcUnacknowledgedChange)
                .with_detail(self.steps_since_publish));
        }
        if self.steps_since_publish < self.window {
            return Err(Fault::new(FaultCode::CdcStableWindow).with_detail(self.steps_since_publish));
        }
        self.payload = Some(payload);
        self.toggle = !self.toggle;
        self.acknowledged = false;
        self.steps_since_publish = 0;
        Ok(())
    }

    /// Consumer side: advances the synchronizer by one consumer clock and
    /// returns the payload on the step its edge is detected.
    pub fn tick_consumer(&mut self) -> Option<T> {
        self.steps_since_publish = self.steps_since_publish.saturating_add(1);
        let previous = self.stages[2];
        self.stages = [self.toggle, self.stages[0], self.stages[1]];
        if self.stages[2] == previous {
            return None;
        }
        self.acknowledged = true;
        self.payload
    }
}
