//! Control channel server
//!
//! Every client gets its own receive thread and writer thread. Inbound bytes
//! are decoded as 10-byte register frames, one reply per frame.
//!
//! ```text
//! client ──► read_chunks ──► CommandDecoder ──► TxQueue ──► writer ──► client
//! ```

use super::{accept_or_wait, read_chunks, spawn_writer, tx_queue};
use crate::bridge::BridgeContext;
use crate::error::{Error, Result};
use crate::protocol::CommandDecoder;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Largest read handed to the decoder at once
const READ_BUFFER: usize = 1024;

pub struct ControlServer {
    listener: TcpListener,
    ctx: BridgeContext,
    queue_bytes: usize,
}

impl ControlServer {
    pub fn bind(addr: &str, ctx: BridgeContext, queue_bytes: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| Error::Other(format!("Failed to bind control channel {}: {}", addr, e)))?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            ctx,
            queue_bytes,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until `running` clears
    pub fn run(self, running: Arc<AtomicBool>) -> Result<()> {
        log::info!("Control channel listening on {}", self.local_addr()?);
        let mut connection = 0u64;

        while running.load(Ordering::Relaxed) {
            let Some((stream, addr)) = accept_or_wait(&self.listener, "Control") else {
                continue;
            };
            log::info!("Control client #{} connected from {}", connection, addr);
            connection += 1;
            let ctx = self.ctx.clone();
            let queue_bytes = self.queue_bytes;
            let running = Arc::clone(&running);
            let spawned = thread::Builder::new()
                .name("control-client".to_string())
                .spawn(move || {
                    if let Err(e) = serve_client(stream, ctx, queue_bytes, running) {
                        log::error!("Control client {} error: {}", addr, e);
                    }
                    log::info!("Control client {} disconnected", addr);
                });
            if let Err(e) = spawned {
                log::error!("Failed to spawn control client thread: {}", e);
            }
        }

        log::info!("Control channel stopped");
        Ok(())
    }
}

fn serve_client(
    mut stream: TcpStream,
    ctx: BridgeContext,
    queue_bytes: usize,
    running: Arc<AtomicBool>,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    if let Err(e) = stream.set_nodelay(true) {
        log::warn!("Failed to disable Nagle on control stream: {}", e);
    }

    let decoder = CommandDecoder::new(ctx);
    let (queue, drain) = tx_queue::bounded(queue_bytes);
    let writer = spawn_writer("control-writer", &stream, drain, Arc::clone(&running))?;

    let mut buf = [0u8; READ_BUFFER];
    let result = read_chunks(&mut stream, &mut buf, &running, |message| {
        log::trace!("Control message of {} bytes", message.len());
        decoder.handle_message(message, &queue);
    });

    // Writer drains what is left and exits once the queue is dropped
    drop(queue);
    if writer.join().is_err() {
        log::error!("Control writer thread panicked");
    }
    let _ = stream.shutdown(Shutdown::Both);
    result.map_err(Error::from)
}
