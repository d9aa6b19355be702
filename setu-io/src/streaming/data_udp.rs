//! UDP data channel server

use super::{is_timeout, READ_TIMEOUT};
use crate::bridge::UdpReassembler;
use crate::error::{Error, Result};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Large enough for any datagram, so oversize ones are counted at full length
const DATAGRAM_BUFFER: usize = 64 * 1024;

pub struct DataUdpServer {
    socket: UdpSocket,
    reassembler: UdpReassembler,
}

impl DataUdpServer {
    pub fn bind(addr: &str, reassembler: UdpReassembler) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .map_err(|e| Error::Other(format!("Failed to bind UDP data channel {}: {}", addr, e)))?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        Ok(Self {
            socket,
            reassembler,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive datagrams until `running` clears
    pub fn run(mut self, running: Arc<AtomicBool>) -> Result<()> {
        log::info!("UDP data channel listening on {}", self.local_addr()?);
        let mut buf = vec![0u8; DATAGRAM_BUFFER];

        while running.load(Ordering::Relaxed) {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    self.reassembler.on_datagram(from, &buf[..n], &self.socket);
                }
                Err(ref e) if is_timeout(e) => {}
                Err(e) => log::warn!("UDP receive error: {}", e),
            }
        }

        log::info!("UDP data channel stopped");
        Ok(())
    }
}
