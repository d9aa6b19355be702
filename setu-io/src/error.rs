//! Error types for SetuIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// SetuIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file missing, unreadable or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Segment does not fit into the circular buffer
    #[error("Ring overflow: {len} byte segment, {free} bytes free")]
    Overflow {
        /// Segment length
        len: usize,
        /// Free bytes at the time of the write
        free: usize,
    },

    /// Outbound queue has less room than the payload needs
    #[error("Outbound queue full: need {needed} bytes, {room} available")]
    QueueFull {
        /// Payload length
        needed: usize,
        /// Room left in the queue
        room: usize,
    },

    /// Peer went away while queueing
    #[error("Connection closed")]
    ConnectionClosed,

    /// Device type in config is not known
    #[error("Unknown device type: {0}")]
    UnknownDevice(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
