//! SetuIO - network to block-transfer bridge
//!
//! Exposes a fixed-size block device (a DMA engine feeding programmable
//! logic) over the network:
//!
//! - a TCP control channel carrying 10-byte register read/write frames
//! - a TCP data channel merging the byte stream into 4 KiB blocks
//! - a UDP data channel reassembling four 1 KiB datagrams into a block
//!
//! Routing between the network and the device is selected per channel with
//! the path mode registers.

pub mod app;
pub mod bridge;
pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod protocol;
pub mod streaming;

// Re-export commonly used types
pub use app::SetuApp;
pub use config::Config;
pub use error::{Error, Result};
