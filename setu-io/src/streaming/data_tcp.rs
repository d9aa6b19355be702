//! TCP data channel server
//!
//! Serves one client at a time; a second connection is closed immediately.
//! The session (bridge plus outbound queue) lives in a shared slot so the
//! periodic tick thread can drive the send-only modes while the receive
//! thread handles inbound segments.

use super::{accept_or_wait, read_chunks, spawn_writer, tx_queue, TxQueue};
use crate::bridge::{BridgeContext, TcpDataBridge};
use crate::core::types::LARGE_SEGMENT_THRESHOLD;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct ActiveSession {
    bridge: TcpDataBridge,
    out: TxQueue,
}

type SessionSlot = Arc<Mutex<Option<ActiveSession>>>;

pub struct DataTcpServer {
    listener: TcpListener,
    ctx: BridgeContext,
    queue_bytes: usize,
    tick_interval: Duration,
    session: SessionSlot,
}

impl DataTcpServer {
    pub fn bind(
        addr: &str,
        ctx: BridgeContext,
        queue_bytes: usize,
        tick_interval: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| Error::Other(format!("Failed to bind TCP data channel {}: {}", addr, e)))?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            ctx,
            queue_bytes,
            tick_interval,
            session: Arc::new(Mutex::new(None)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients and run the tick until `running` clears
    pub fn run(self, running: Arc<AtomicBool>) -> Result<()> {
        log::info!("TCP data channel listening on {}", self.local_addr()?);

        let tick = {
            let session = Arc::clone(&self.session);
            let running = Arc::clone(&running);
            let interval = self.tick_interval;
            thread::Builder::new()
                .name("data-tick".to_string())
                .spawn(move || tick_loop(session, interval, running))?
        };

        while running.load(Ordering::Relaxed) {
            if let Some((stream, addr)) = accept_or_wait(&self.listener, "TCP data") {
                self.accept(stream, addr, &running);
            }
        }

        if tick.join().is_err() {
            log::error!("Tick thread panicked");
        }
        log::info!("TCP data channel stopped");
        Ok(())
    }

    fn accept(&self, stream: TcpStream, addr: SocketAddr, running: &Arc<AtomicBool>) {
        if self.session.lock().is_some() {
            log::warn!("Rejecting TCP data connection from {}: client already active", addr);
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
        if let Err(e) = stream.set_nonblocking(false) {
            log::error!("Failed to set data stream blocking: {}", e);
            return;
        }

        let (out, drain) = tx_queue::bounded(self.queue_bytes);
        let writer = match spawn_writer("data-writer", &stream, drain, Arc::clone(running)) {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Failed to start data writer: {}", e);
                return;
            }
        };

        let mut bridge = TcpDataBridge::new(self.ctx.clone());
        bridge.on_connect(addr);
        *self.session.lock() = Some(ActiveSession { bridge, out });

        let session = Arc::clone(&self.session);
        let running = Arc::clone(running);
        let spawned = thread::Builder::new()
            .name("data-client".to_string())
            .spawn(move || {
                if let Err(e) = serve_client(stream, &session, &running) {
                    log::error!("TCP data client {} error: {}", addr, e);
                }
                // Dropping the session drops the last queue handle
                if let Some(mut active) = session.lock().take() {
                    active.bridge.on_disconnect();
                }
                if writer.join().is_err() {
                    log::error!("Data writer thread panicked");
                }
            });
        if let Err(e) = spawned {
            log::error!("Failed to spawn data client thread: {}", e);
            self.session.lock().take();
        }
    }
}

fn serve_client(mut stream: TcpStream, session: &SessionSlot, running: &AtomicBool) -> Result<()> {
    let mut buf = vec![0u8; LARGE_SEGMENT_THRESHOLD];
    let result = read_chunks(&mut stream, &mut buf, running, |segment| {
        if let Some(active) = session.lock().as_mut() {
            active.bridge.on_segment(segment, &active.out);
        }
    });
    let _ = stream.shutdown(Shutdown::Both);
    result.map_err(Error::from)
}

fn tick_loop(session: SessionSlot, interval: Duration, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        if let Some(active) = session.lock().as_mut() {
            active.bridge.tick(&active.out);
        }
        thread::sleep(interval);
    }
}
