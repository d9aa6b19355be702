//! UDP data path: four 1 KiB datagrams make one block
//!
//! Datagrams are stored in arrival order into four sub-block slots. When the
//! fourth slot is filled the block is optionally sent through the device and
//! then re-fragmented into four datagrams back to the sender.
//!
//! A datagram starting with [`RESYNC_MARKER`] always lands in slot 0, which
//! lets a sender realign after a lost datagram. A datagram from a new source
//! port starts a new session.

use crate::core::state::SessionState;
use crate::core::types::{Block, BLOCK_SIZE, SUB_BLOCKS_PER_BLOCK, SUB_BLOCK_SIZE};
use crate::device::{self, SharedDevice};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

/// First two bytes of a datagram that must start a block
pub const RESYNC_MARKER: [u8; 2] = [0xEB, 0x91];

/// Where re-fragmented datagrams go
pub trait DatagramSink {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;
}

impl DatagramSink for UdpSocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, addr)
    }
}

/// Reassembly context, owned by the UDP receive thread
pub struct UdpReassembler {
    state: Arc<SessionState>,
    device: SharedDevice,
    last_port: Option<u16>,
    segment_index: usize,
    block: Box<Block>,
}

impl UdpReassembler {
    pub fn new(state: Arc<SessionState>, device: SharedDevice) -> Self {
        Self {
            state,
            device,
            last_port: None,
            segment_index: 0,
            block: Box::new([0; BLOCK_SIZE]),
        }
    }

    /// Slot the next datagram goes into
    pub fn segment_index(&self) -> usize {
        self.segment_index
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Take one datagram. Returns the number of datagrams sent back.
    pub fn on_datagram<S: DatagramSink>(
        &mut self,
        from: SocketAddr,
        payload: &[u8],
        sink: &S,
    ) -> usize {
        if self.last_port != Some(from.port()) {
            log::info!("New UDP session from {}", from);
            self.last_port = Some(from.port());
            self.segment_index = 0;
            self.state.udp.reset();
        }

        self.state.udp.add_rx(payload.len());
        if payload.len() != SUB_BLOCK_SIZE {
            log::warn!(
                "UDP datagram of {} bytes from {}, expected {}",
                payload.len(),
                from,
                SUB_BLOCK_SIZE
            );
        }

        if payload.starts_with(&RESYNC_MARKER) {
            if self.segment_index != 0 {
                log::warn!(
                    "UDP resync marker at slot {}, restarting block",
                    self.segment_index
                );
            }
            self.segment_index = 0;
        }

        let slot = self.segment_index;
        let len = payload.len().min(SUB_BLOCK_SIZE);
        let start = slot * SUB_BLOCK_SIZE;
        let dest = &mut self.block[start..start + SUB_BLOCK_SIZE];
        dest[..len].copy_from_slice(&payload[..len]);
        dest[len..].fill(0);

        self.segment_index = (slot + 1) % SUB_BLOCKS_PER_BLOCK;
        if slot + 1 < SUB_BLOCKS_PER_BLOCK {
            return 0;
        }
        self.complete_block(from, sink)
    }

    fn complete_block<S: DatagramSink>(&mut self, to: SocketAddr, sink: &S) -> usize {
        let mode = self.state.udp_path();
        if mode.round_trips() {
            let mut dev = self.device.lock();
            if let Err(e) = device::round_trip(&mut **dev, &mut self.block) {
                log::error!("UDP block dropped: {}", e);
                return 0;
            }
        }
        if !mode.emits() {
            log::trace!("UDP block complete, mode {:?} does not emit", mode);
            return 0;
        }
        self.emit(to, sink)
    }

    fn emit<S: DatagramSink>(&self, to: SocketAddr, sink: &S) -> usize {
        let mut sent = 0;
        for sub_block in self.block.chunks_exact(SUB_BLOCK_SIZE) {
            match sink.send_to(sub_block, to) {
                Ok(_) => {
                    self.state.udp.add_tx(sub_block.len());
                    sent += 1;
                }
                Err(e) => log::warn!("UDP send to {} failed: {}", to, e),
            }
        }
        sent
    }
}
