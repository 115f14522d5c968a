//! Burst request vocabulary shared by clients, arbiter and controller.

/// Number of arbiter clients.
pub const CLIENT_COUNT: usize = 3;

/// Arbiter clients, declared in descending priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ClientId {
    /// Host diagnostic monitor (highest priority).
    Monitor,
    /// Processor core.
    Processor,
    /// Scanout line filler (lowest priority).
    Filler,
}

impl ClientId {
    /// All clients in priority order.
    pub const ALL: [Self; CLIENT_COUNT] = [Self::Monitor, Self::Processor, Self::Filler];

    /// Array index of this client; lower is higher priority.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Transfer direction of a burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Direction {
    /// Memory to client; words arrive with data-valid.
    Read,
    /// Client to memory; words are requested with data-request.
    Write,
}

/// A single burst request as asserted on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BurstRequest {
    /// 24-bit start byte address.
    pub address: u32,
    /// Burst length in words.
    pub length: u16,
    /// Transfer direction.
    pub direction: Direction,
    /// Requesting client.
    pub client: ClientId,
}

impl BurstRequest {
    /// Builds a read request.
    #[must_use]
    pub const fn read(client: ClientId, address: u32, length: u16) -> Self {
        Self {
            address,
            length,
            direction: Direction::Read,
            client,
        }
    }

    /// Builds a write request.
    #[must_use]
    pub const fn write(client: ClientId, address: u32, length: u16) -> Self {
        Self {
            address,
            length,
            direction: Direction::Write,
            client,
        }
    }

    /// Byte address of word `index` of this burst.
    #[must_use]
    pub const fn word_address(&self, index: u16) -> u32 {
        self.address + 2 * index as u32
    }
}

/// Bus activity produced by one controller cycle. At most one happens per
/// memory-domain step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BusEvent {
    /// Grant pulse to the owner of `request`.
    Grant(BurstRequest),
    /// One word transferred.
    Word {
        /// Owning client.
        client: ClientId,
        /// Word index within the burst.
        index: u16,
        /// Value read or written.
        value: u16,
    },
    /// Finish pulse; the request retires.
    Finish(BurstRequest),
    /// A refresh window started.
    Refresh,
}

/// Client side of the burst handshake.
///
/// The controller calls these hooks on the memory-domain step in which the
/// corresponding pulse fires. A client keeps returning the same request from
/// [`BurstClient::request`] from the first assertion until `on_finish`.
pub trait BurstClient {
    /// Currently asserted request, if any.
    fn request(&self) -> Option<BurstRequest>;

    /// Grant pulse.
    fn on_grant(&mut self);

    /// Data-valid pulse for word `index` of a read burst.
    fn read_word(&mut self, index: u16, value: u16);

    /// Data-request pulse for word `index` of a write burst; the returned
    /// word is written in the same step.
    fn write_word(&mut self, index: u16) -> u16;

    /// Finish pulse; the client must deassert its request afterwards.
    fn on_finish(&mut self);

    /// Returns `true` between this client's grant and finish pulses.
    fn holds_grant(&self) -> bool;
}
