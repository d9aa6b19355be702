//! TCP data path: segments in, whole blocks through the device and back out
//!
//! Inbound segments are merged into the circular buffer; every whole block is
//! then routed according to the current [`TcpPath`]:
//!
//! ```text
//! segment ─► ring ─► [transfer out] ─► [copy + transfer in] ─► [forward]
//!             0x03          .                   .                  x
//!             0x11          x                   .                  .
//!             0x13          x                   x                  x
//! ```
//!
//! The send-only modes (0x02, 0x12) are driven by [`TcpDataBridge::tick`]
//! instead.

use super::path::{TcpPath, TickSource};
use super::BridgeContext;
use crate::core::types::{Block, BLOCK_SIZE, LARGE_SEGMENT_THRESHOLD};
use crate::device;
use crate::streaming::tx_queue::TxQueue;
use std::net::SocketAddr;

/// Per-connection router for the TCP data channel
pub struct TcpDataBridge {
    ctx: BridgeContext,
    /// Block id stamped by the synthetic send tick
    sequence: u16,
}

impl TcpDataBridge {
    pub fn new(ctx: BridgeContext) -> Self {
        Self { ctx, sequence: 0 }
    }

    /// Start of a data connection: fresh counters, empty reseeded ring
    pub fn on_connect(&mut self, peer: SocketAddr) {
        self.ctx.state.tcp.reset();
        self.ctx.ring.lock().reset();
        self.sequence = 0;
        log::info!(
            "Data TCP client {} connected (path mode 0x{:02X})",
            peer,
            self.ctx.state.tcp_path_raw()
        );
    }

    pub fn on_disconnect(&mut self) {
        log::info!(
            "Data TCP client closed, rx_bytes={}, tx_bytes={}",
            self.ctx.state.tcp.rx(),
            self.ctx.state.tcp.tx()
        );
        self.sequence = 0;
    }

    /// Route one inbound segment. Returns the number of blocks forwarded.
    pub fn on_segment(&mut self, segment: &[u8], out: &TxQueue) -> usize {
        let state = &self.ctx.state;
        state.tcp.add_rx(segment.len());
        if segment.len() > LARGE_SEGMENT_THRESHOLD {
            log::warn!("Large data segment: {} bytes", segment.len());
        }

        let mode = state.tcp_path();
        if !mode.buffers() {
            log::trace!("Discarding {} bytes in mode {:?}", segment.len(), mode);
            return 0;
        }

        let mut ring = self.ctx.ring.lock();
        if let Err(e) = ring.push(segment) {
            log::warn!("Dropping data segment: {}", e);
            return 0;
        }

        let mut forwarded = 0;
        while let Some(block) = ring.front_block_mut() {
            if self.route_block(mode, block, out) {
                forwarded += 1;
            }
            ring.consume_block();
        }
        forwarded
    }

    /// Device steps then forward. A failed transfer drops the block.
    fn route_block(&self, mode: TcpPath, block: &mut Block, out: &TxQueue) -> bool {
        if mode.pushes() {
            let mut dev = self.ctx.device.lock();
            let result = if mode.pulls() {
                device::round_trip(&mut **dev, block)
            } else {
                dev.transfer_out(block)
            };
            if let Err(e) = result {
                log::error!("Block dropped on TCP data path: {}", e);
                return false;
            }
        }
        mode.forwards() && self.forward(block, out)
    }

    fn forward(&self, block: &Block, out: &TxQueue) -> bool {
        if !out.has_room(BLOCK_SIZE) {
            log::warn!("Outbound queue full, dropping a block");
            return false;
        }
        match out.push(block.to_vec()) {
            Ok(()) => {
                self.ctx.state.tcp.add_tx(BLOCK_SIZE);
                true
            }
            Err(e) => {
                log::warn!("Block not sent: {}", e);
                false
            }
        }
    }

    /// Periodic transmit hook for the send-only modes. Returns whether a
    /// block was queued.
    pub fn tick(&mut self, out: &TxQueue) -> bool {
        let Some(source) = self.ctx.state.tcp_path().tick_source() else {
            return false;
        };
        // Runs every tick; a full queue is the normal steady state here
        if !out.has_room(BLOCK_SIZE) {
            return false;
        }

        let mut ring = self.ctx.ring.lock();
        let block = ring.first_block_mut();
        match source {
            TickSource::Synthetic => {
                block[2..4].copy_from_slice(&self.sequence.to_be_bytes());
                self.sequence = self.sequence.wrapping_add(1);
            }
            TickSource::Device => {
                if let Err(e) = self.ctx.device.lock().transfer_in(block) {
                    log::error!("Tick transfer in failed: {}", e);
                    return false;
                }
            }
        }
        self.forward(block, out)
    }
}
