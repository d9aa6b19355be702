//! Network servers for the control and data channels
//!
//! | Channel  | Transport | Default port | Handler |
//! |----------|-----------|--------------|---------|
//! | Control  | TCP       | 1000         | [`ControlServer`] |
//! | Data     | TCP       | 1001         | [`DataTcpServer`] |
//! | Data     | UDP       | 1002         | [`DataUdpServer`] |
//!
//! All servers poll a shared running flag: listeners accept non-blocking with
//! a short sleep, streams and sockets read with a timeout.

pub mod control;
pub mod data_tcp;
pub mod data_udp;
pub mod tx_queue;

pub use control::ControlServer;
pub use data_tcp::DataTcpServer;
pub use data_udp::DataUdpServer;
pub use tx_queue::{TxDrain, TxQueue};

use crate::error::Result;
use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Read timeout on client streams, bounds shutdown latency
pub(crate) const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Listener poll interval when no connection is pending
pub(crate) const ACCEPT_POLL: Duration = Duration::from_millis(10);

pub(crate) fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Take one pending connection from a non-blocking listener
///
/// Sleeps `ACCEPT_POLL` when nothing is pending and after an accept error.
pub(crate) fn accept_or_wait(
    listener: &TcpListener,
    channel: &str,
) -> Option<(TcpStream, SocketAddr)> {
    match listener.accept() {
        Ok(conn) => Some(conn),
        Err(ref e) if is_timeout(e) => {
            thread::sleep(ACCEPT_POLL);
            None
        }
        Err(e) => {
            log::error!("{} accept error: {}", channel, e);
            thread::sleep(ACCEPT_POLL);
            None
        }
    }
}

/// Feed everything read from `stream` to `on_chunk` until the peer closes,
/// a read fails, or `running` clears
pub(crate) fn read_chunks<F>(
    stream: &mut TcpStream,
    buf: &mut [u8],
    running: &AtomicBool,
    mut on_chunk: F,
) -> io::Result<()>
where
    F: FnMut(&[u8]),
{
    if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
        log::warn!("Failed to set read timeout: {}", e);
    }

    while running.load(Ordering::Relaxed) {
        match stream.read(buf) {
            Ok(0) => return Ok(()),
            Ok(n) => on_chunk(&buf[..n]),
            Err(e) if is_timeout(&e) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => return Ok(()),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Start the writer thread draining `drain` into a clone of `stream`
pub(crate) fn spawn_writer(
    name: &str,
    stream: &TcpStream,
    drain: TxDrain,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let out = stream.try_clone()?;
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            if let Err(e) = drain.run_writer(&out, &running) {
                log::debug!("Writer stopped: {}", e);
                // Unblock the reader too
                let _ = out.shutdown(Shutdown::Both);
            }
        })?;
    Ok(handle)
}
