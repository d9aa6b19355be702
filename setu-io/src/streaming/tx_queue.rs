//! Byte-budgeted outbound queue for one TCP connection
//!
//! Producers (the command decoder, the data bridge, the tick) ask for room
//! before queueing and drop what does not fit; nothing ever blocks on a slow
//! peer. A writer thread drains the queue into the socket and releases the
//! budget once the bytes are written.

use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long the writer waits for data before rechecking the running flag
const WRITER_POLL: Duration = Duration::from_millis(100);

/// Producer side
#[derive(Debug, Clone)]
pub struct TxQueue {
    tx: Sender<Vec<u8>>,
    queued: Arc<AtomicUsize>,
    capacity: usize,
}

/// Consumer side
#[derive(Debug)]
pub struct TxDrain {
    rx: Receiver<Vec<u8>>,
    queued: Arc<AtomicUsize>,
}

/// Create a queue holding at most `capacity` unwritten bytes
pub fn bounded(capacity: usize) -> (TxQueue, TxDrain) {
    let (tx, rx) = unbounded();
    let queued = Arc::new(AtomicUsize::new(0));
    (
        TxQueue {
            tx,
            queued: Arc::clone(&queued),
            capacity,
        },
        TxDrain { rx, queued },
    )
}

impl TxQueue {
    /// Bytes that can be queued right now
    #[inline]
    pub fn room(&self) -> usize {
        self.capacity
            .saturating_sub(self.queued.load(Ordering::Acquire))
    }

    #[inline]
    pub fn has_room(&self, len: usize) -> bool {
        self.room() >= len
    }

    /// Queue `payload` if the whole of it fits
    ///
    /// # Errors
    ///
    /// - `Error::QueueFull` when the budget is exhausted
    /// - `Error::ConnectionClosed` when the writer has gone away
    pub fn push(&self, payload: Vec<u8>) -> Result<()> {
        let len = payload.len();
        let capacity = self.capacity;
        self.queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |queued| {
                (queued + len <= capacity).then_some(queued + len)
            })
            .map_err(|queued| Error::QueueFull {
                needed: len,
                room: capacity.saturating_sub(queued),
            })?;

        if self.tx.send(payload).is_err() {
            self.queued.fetch_sub(len, Ordering::AcqRel);
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }
}

impl TxDrain {
    /// Take the next payload without waiting, releasing its budget
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        let payload = self.rx.try_recv().ok()?;
        self.release(payload.len());
        Some(payload)
    }

    fn release(&self, len: usize) {
        self.queued.fetch_sub(len, Ordering::AcqRel);
    }

    /// Write queued payloads to `out` until every producer is dropped, the
    /// running flag clears, or a write fails
    pub fn run_writer<W: Write>(self, mut out: W, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::Relaxed) {
            let payload = match self.rx.recv_timeout(WRITER_POLL) {
                Ok(payload) => payload,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            let result = out.write_all(&payload);
            self.release(payload.len());
            result?;
        }
        Ok(())
    }
}
