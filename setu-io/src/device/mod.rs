//! Block transfer device abstraction
//!
//! The bridge sees the device through two seams:
//!
//! - [`BlockTransfer`]: move one block out to the fabric or in from it,
//!   blocking until the transfer completes or fails
//! - [`PeripheralBus`]: 32-bit register access into the fabric's small
//!   control window (0x0000..0x0400)
//!
//! Anything that implements both is a [`BridgeDevice`]. The daemon builds one
//! with [`create_device`] from the `[device]` config section.

pub mod dma;
pub mod loopback;

use crate::config::DeviceConfig;
use crate::core::types::Block;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

pub use dma::{Completion, DmaController, DmaEngine};
pub use loopback::{Fault, FaultHandle, LoopbackFabric};

/// Fabric register selecting the transmit-to-receive copy
pub const COPY_CONTROL: u16 = 0x0018;

/// `COPY_CONTROL` value that copies the last pushed block into receive memory
pub const COPY_TX_TO_RX: u32 = 3;

/// Fabric register that starts a fabric-to-host transfer
pub const TX_TRIGGER: u16 = 0x001C;

/// Size of the fabric register window in bytes
pub const REGISTER_WINDOW: u16 = 0x0400;

/// Transfer direction, named from the host's side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToDevice,
    FromDevice,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ToDevice => write!(f, "to-device"),
            Direction::FromDevice => write!(f, "from-device"),
        }
    }
}

/// Why a block transfer did not complete
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// Controller refused to start the transfer
    #[error("{direction} transfer rejected: {reason}")]
    Rejected { direction: Direction, reason: String },

    /// Controller signalled an error on completion
    #[error("{0} transfer failed in the device")]
    Device(Direction),

    /// No completion within the configured wait
    #[error("{direction} transfer timed out after {timeout_ms} ms")]
    Timeout { direction: Direction, timeout_ms: u64 },

    /// Completion source is gone
    #[error("completion channel disconnected")]
    Disconnected,
}

/// Synchronous fixed-size block mover
pub trait BlockTransfer: Send {
    /// Push one block to the device
    fn transfer_out(&mut self, block: &Block) -> std::result::Result<(), TransferError>;

    /// Pull one block from the device into `block`
    fn transfer_in(&mut self, block: &mut Block) -> std::result::Result<(), TransferError>;
}

/// Register access into the fabric control window
pub trait PeripheralBus: Send {
    fn read_register(&self, offset: u16) -> u32;
    fn write_register(&mut self, offset: u16, value: u32);
}

/// A device usable by the bridge
pub trait BridgeDevice: BlockTransfer + PeripheralBus {}

impl<T: BlockTransfer + PeripheralBus + ?Sized> BridgeDevice for T {}

/// Device handle shared by the data paths and the command decoder
pub type SharedDevice = Arc<Mutex<Box<dyn BridgeDevice>>>;

/// Wrap a device for sharing between threads
pub fn share(device: Box<dyn BridgeDevice>) -> SharedDevice {
    Arc::new(Mutex::new(device))
}

/// Push `block`, have the fabric copy it back, and pull the copy into `block`
pub fn round_trip(
    device: &mut dyn BridgeDevice,
    block: &mut Block,
) -> std::result::Result<(), TransferError> {
    device.transfer_out(block)?;
    device.write_register(COPY_CONTROL, COPY_TX_TO_RX);
    device.transfer_in(block)
}

/// Create a device based on configuration
pub fn create_device(config: &DeviceConfig) -> Result<Box<dyn BridgeDevice>> {
    match config.device_type.as_str() {
        "loopback" => {
            log::info!(
                "Using loopback fabric (transfer timeout {} ms)",
                config.transfer_timeout_ms
            );
            Ok(Box::new(DmaEngine::loopback(config.transfer_timeout())))
        }
        other => Err(Error::UnknownDevice(other.to_string())),
    }
}
