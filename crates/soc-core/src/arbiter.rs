//! Fixed-priority memory arbiter.
//!
//! Monitor beats processor beats filler. A lower-priority request that loses
//! arbitration stays asserted and is served later. Once granted, a client
//! owns the controller until its finish pulse and only its request is
//! forwarded.

use crate::bus::{BurstClient, BurstRequest, BusEvent, ClientId, CLIENT_COUNT};
use crate::controller::BurstController;
use crate::fault::{Fault, FaultCode};
use crate::memory::BackingMemory;

/// Per-client arbitration counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ArbiterStats {
    /// Grants issued, indexed by [`ClientId::index`].
    pub grants: [u64; CLIENT_COUNT],
    /// Words transferred.
    pub words: [u64; CLIENT_COUNT],
    /// Longest wait in memory cycles between first assertion and grant.
    pub max_wait_cycles: [u64; CLIENT_COUNT],
}

impl ArbiterStats {
    /// Grants issued to `client`.
    #[must_use]
    pub const fn grants_for(&self, client: ClientId) -> u64 {
        self.grants[client.index()]
    }

    /// Longest grant wait observed for `client`.
    #[must_use]
    pub const fn max_wait_for(&self, client: ClientId) -> u64 {
        self.max_wait_cycles[client.index()]
    }
}

/// Selects the request to forward: the owner's while a burst is in flight,
/// otherwise the highest-priority asserted request.
#[must_use]
pub fn select(
    requests: &[Option<BurstRequest>; CLIENT_COUNT],
    owner: Option<ClientId>,
) -> Option<BurstRequest> {
    match owner {
        Some(owner) => requests[owner.index()],
        None => requests.iter().flatten().copied().next(),
    }
}

/// Priority arbiter in front of the burst controller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryArbiter {
    owner: Option<ClientId>,
    pending: [Option<BurstRequest>; CLIENT_COUNT],
    waiting: [u64; CLIENT_COUNT],
    stats: ArbiterStats,
}

impl MemoryArbiter {
    /// Creates an arbiter with no owner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Client currently holding the grant.
    #[must_use]
    pub const fn owner(&self) -> Option<ClientId> {
        self.owner
    }

    /// Arbitration counters.
    #[must_use]
    pub const fn stats(&self) -> &ArbiterStats {
        &self.stats
    }

    /// Samples every client, forwards one request and advances the
    /// controller by one cycle.
    ///
    /// `clients` is indexed by [`ClientId::index`].
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::RequestWhileOutstanding`] when a waiting client
    /// replaces its request, [`FaultCode::RequestDroppedMidBurst`] when it
    /// withdraws it before the grant, [`FaultCode::GrantConflict`] when more
    /// than one client claims the grant, and any controller fault.
    pub fn step(
        &mut self,
        controller: &mut BurstController,
        memory: &mut BackingMemory,
        clients: &mut [&mut dyn BurstClient; CLIENT_COUNT],
    ) -> Result<Option<BusEvent>, Fault> {
        let requests: [Option<BurstRequest>; CLIENT_COUNT] =
            std::array::from_fn(|index| clients[index].request());

        for client in ClientId::ALL {
            if self.owner == Some(client) {
                continue;
            }
            let index = client.index();
            if let Some(pending) = self.pending[index] {
                match requests[index] {
                    Some(current) if current == pending => {}
                    Some(current) => {
                        return Err(Fault::new(FaultCode::RequestWhileOutstanding)
                            .with_client(client)
                            .with_detail(current.address));
                    }
                    None => {
                        return Err(Fault::new(FaultCode::RequestDroppedMidBurst)
                            .with_client(client)
                            .with_detail(pending.address));
                    }
                }
            }
            self.pending[index] = requests[index];
        }

        let forwarded = select(&requests, self.owner);
        let event = controller.step(forwarded, memory, clients)?;

        match event {
            Some(BusEvent::Grant(request)) => {
                let index = request.client.index();
                self.owner = Some(request.client);
                self.pending[index] = None;
                self.stats.grants[index] += 1;
                self.stats.max_wait_cycles[index] =
                    self.stats.max_wait_cycles[index].max(self.waiting[index]);
                self.waiting[index] = 0;
            }
            Some(BusEvent::Word { client, .. }) => {
                self.stats.words[client.index()] += 1;
            }
            Some(BusEvent::Finish(_)) => self.owner = None,
            Some(BusEvent::Refresh) | None => {}
        }

        for (waiting, pending) in self.waiting.iter_mut().zip(&self.pending) {
            if pending.is_some() {
                *waiting += 1;
            }
        }

        let holders = clients.iter().filter(|client| client.holds_grant()).count();
        let owner_holds = self
            .owner
            .is_none_or(|owner| clients[owner.index()].holds_grant());
        if holders > 1 || !owner_holds || (holders == 1 && self.owner.is_none()) {
            return Err(Fault::new(FaultCode::GrantConflict)
                .with_detail(u32::try_from(holders).unwrap_or(u32::MAX)));
        }

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::{select, MemoryArbiter};
    use crate::bus::{BurstClient, BurstRequest, BusEvent, ClientId, CLIENT_COUNT};
    use crate::controller::BurstController;
    use crate::fault::FaultCode;
    use crate::memory::BackingMemory;
    use crate::timing::TimingConfig;

    #[derive(Default)]
    struct Looping {
        template: Option<BurstRequest>,
        asserted: Option<BurstRequest>,
        granted: bool,
        bursts_left: u32,
    }

    impl Looping {
        fn new(request: BurstRequest, bursts: u32) -> Self {
            Self {
                template: Some(request),
                asserted: None,
                granted: false,
                bursts_left: bursts,
            }
        }

        fn tick(&mut self) {
            if self.asserted.is_none() && self.bursts_left > 0 {
                self.asserted = self.template;
            }
        }
    }

    impl BurstClient for Looping {
        fn request(&self) -> Option<BurstRequest> {
            self.asserted
        }
        fn on_grant(&mut self) {
            self.granted = true;
        }
        fn read_word(&mut self, _index: u16, _value: u16) {}
        fn write_word(&mut self, _index: u16) -> u16 {
            0
        }
        fn on_finish(&mut self) {
            self.granted = false;
            self.asserted = None;
            self.bursts_left -= 1;
        }
        fn holds_grant(&self) -> bool {
            self.granted
        }
    }

    fn no_refresh() -> TimingConfig {
        TimingConfig {
            refresh_interval_cycles: 0,
            ..TimingConfig::default()
        }
    }

    #[test]
    fn select_prefers_owner_then_priority() {
        let monitor = BurstRequest::read(ClientId::Monitor, 0, 1);
        let filler = BurstRequest::read(ClientId::Filler, 8, 4);
        let requests = [Some(monitor), None, Some(filler)];
        assert_eq!(select(&requests, None), Some(monitor));
        assert_eq!(select(&requests, Some(ClientId::Filler)), Some(filler));
        assert_eq!(select(&[None; CLIENT_COUNT], None), None);
    }

    #[test]
    fn lower_priority_request_is_served_after_higher() {
        let mut arbiter = MemoryArbiter::new();
        let mut controller = BurstController::new(no_refresh());
        let mut memory = BackingMemory::new(256);
        let mut monitor = Looping::new(BurstRequest::read(ClientId::Monitor, 0, 2), 2);
        let mut cpu = Looping::default();
        let mut filler = Looping::new(BurstRequest::read(ClientId::Filler, 64, 4), 1);

        let mut grants = Vec::new();
        for _ in 0..200 {
            monitor.tick();
            filler.tick();
            let mut clients: [&mut dyn BurstClient; CLIENT_COUNT] =
                [&mut monitor, &mut cpu, &mut filler];
            if let Some(BusEvent::Grant(request)) = arbiter
                .step(&mut controller, &mut memory, &mut clients)
                .expect("legal traffic")
            {
                grants.push(request.client);
            }
        }
        assert_eq!(
            grants,
            vec![ClientId::Monitor, ClientId::Monitor, ClientId::Filler]
        );
        let stats = arbiter.stats();
        assert_eq!(stats.grants_for(ClientId::Monitor), 2);
        assert_eq!(stats.grants_for(ClientId::Filler), 1);
        assert_eq!(stats.words[ClientId::Filler.index()], 4);
        assert!(stats.max_wait_for(ClientId::Filler) > stats.max_wait_for(ClientId::Monitor));
    }

    #[test]
    fn replacing_a_waiting_request_is_fatal() {
        let mut arbiter = MemoryArbiter::new();
        let mut controller = BurstController::new(no_refresh());
        let mut memory = BackingMemory::new(256);
        let mut monitor = Looping::new(BurstRequest::read(ClientId::Monitor, 0, 8), 1);
        let mut cpu = Looping::default();
        let mut filler = Looping::new(BurstRequest::read(ClientId::Filler, 64, 4), 1);
        monitor.tick();
        filler.tick();
        {
            let mut clients: [&mut dyn BurstClient; CLIENT_COUNT] =
                [&mut monitor, &mut cpu, &mut filler];
            arbiter
                .step(&mut controller, &mut memory, &mut clients)
                .expect("monitor granted");
        }
        filler.asserted = Some(BurstRequest::read(ClientId::Filler, 128, 4));
        let mut clients: [&mut dyn BurstClient; CLIENT_COUNT] =
            [&mut monitor, &mut cpu, &mut filler];
        let fault = arbiter
            .step(&mut controller, &mut memory, &mut clients)
            .expect_err("filler replaced a waiting request");
        assert_eq!(fault.code, FaultCode::RequestWhileOutstanding);
        assert_eq!(fault.client, Some(ClientId::Filler));
    }
}
