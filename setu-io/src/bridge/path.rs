//! Routing modes of the two data channels
//!
//! The raw mode byte is what the control channel writes and reads back. The
//! enums decode it into the set of steps a data unit goes through.
//!
//! | TCP  | buffer | push | pull | forward | tick         |
//! |------|--------|------|------|---------|--------------|
//! | 0x01 |        |      |      |         |              |
//! | 0x02 |        |      |      |         | synthetic    |
//! | 0x03 | x      |      |      | x       |              |
//! | 0x11 | x      | x    |      |         |              |
//! | 0x12 |        |      |      |         | pull + send  |
//! | 0x13 | x      | x    | x    | x       |              |

/// TCP data channel mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpPath {
    /// Count received bytes and drop them
    ReceiveOnly,
    /// Tick emits the seeded first block with a sequence number
    SyntheticSend,
    /// Merge into blocks and echo them back
    Loopback,
    /// Merge into blocks and push each to the device
    Push,
    /// Tick pulls a block from the device and sends it
    PullSend,
    /// Push, have the fabric copy it back, pull and send
    RoundTrip,
    /// Any other value; nothing is bridged
    Inert(u8),
}

/// What the periodic tick produces in a given TCP mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSource {
    Synthetic,
    Device,
}

impl TcpPath {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x01 => TcpPath::ReceiveOnly,
            0x02 => TcpPath::SyntheticSend,
            0x03 => TcpPath::Loopback,
            0x11 => TcpPath::Push,
            0x12 => TcpPath::PullSend,
            0x13 => TcpPath::RoundTrip,
            other => TcpPath::Inert(other),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            TcpPath::ReceiveOnly => 0x01,
            TcpPath::SyntheticSend => 0x02,
            TcpPath::Loopback => 0x03,
            TcpPath::Push => 0x11,
            TcpPath::PullSend => 0x12,
            TcpPath::RoundTrip => 0x13,
            TcpPath::Inert(raw) => raw,
        }
    }

    /// Inbound segments are merged into the circular buffer
    pub fn buffers(self) -> bool {
        matches!(self, TcpPath::Loopback | TcpPath::Push | TcpPath::RoundTrip)
    }

    /// Each merged block is transferred out
    pub fn pushes(self) -> bool {
        matches!(self, TcpPath::Push | TcpPath::RoundTrip)
    }

    /// Each pushed block is copied back by the fabric and transferred in
    pub fn pulls(self) -> bool {
        matches!(self, TcpPath::RoundTrip)
    }

    /// Each merged block is sent back to the client
    pub fn forwards(self) -> bool {
        matches!(self, TcpPath::Loopback | TcpPath::RoundTrip)
    }

    pub fn tick_source(self) -> Option<TickSource> {
        match self {
            TcpPath::SyntheticSend => Some(TickSource::Synthetic),
            TcpPath::PullSend => Some(TickSource::Device),
            _ => None,
        }
    }
}

/// UDP data channel mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdpPath {
    /// Reassembled block is re-fragmented and echoed
    Loopback,
    /// Reassembled block goes through the device before the echo
    RoundTrip,
    /// Reassemble only
    Inert(u8),
}

impl UdpPath {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x03 => UdpPath::Loopback,
            0x13 => UdpPath::RoundTrip,
            other => UdpPath::Inert(other),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            UdpPath::Loopback => 0x03,
            UdpPath::RoundTrip => 0x13,
            UdpPath::Inert(raw) => raw,
        }
    }

    pub fn emits(self) -> bool {
        !matches!(self, UdpPath::Inert(_))
    }

    pub fn round_trips(self) -> bool {
        matches!(self, UdpPath::RoundTrip)
    }
}
