//! Data plane: path modes, circular buffer, TCP and UDP bridges

pub mod path;
pub mod ring_buffer;
pub mod tcp_data;
pub mod udp_data;

use crate::core::state::SessionState;
use crate::device::SharedDevice;
use parking_lot::Mutex;
use ring_buffer::CircularDataBuffer;
use std::sync::Arc;

pub use path::{TcpPath, TickSource, UdpPath};
pub use tcp_data::TcpDataBridge;
pub use udp_data::{DatagramSink, UdpReassembler};

/// Shared handles every bridge component works on
///
/// Lock order is `ring` before `device`.
#[derive(Clone)]
pub struct BridgeContext {
    pub state: Arc<SessionState>,
    pub ring: Arc<Mutex<CircularDataBuffer>>,
    pub device: SharedDevice,
}

impl BridgeContext {
    pub fn new(state: SessionState, ring_blocks: usize, device: SharedDevice) -> Self {
        Self {
            state: Arc::new(state),
            ring: Arc::new(Mutex::new(CircularDataBuffer::new(ring_blocks))),
            device,
        }
    }
}
