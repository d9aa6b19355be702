//! Session register state shared by the command decoder and the data paths
//!
//! All fields are atomics so the control thread can change a path mode or
//! clear a counter while the data threads are mid-stream, without a lock on
//! the hot path. Counters are `u32` and wrap naturally.

use crate::bridge::path::{TcpPath, UdpPath};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Received/sent byte totals for one data channel
#[derive(Debug, Default)]
pub struct ChannelCounters {
    rx_bytes: AtomicU32,
    tx_bytes: AtomicU32,
}

impl ChannelCounters {
    #[inline]
    pub fn add_rx(&self, bytes: usize) {
        self.rx_bytes.fetch_add(bytes as u32, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_tx(&self, bytes: usize) {
        self.tx_bytes.fetch_add(bytes as u32, Ordering::Relaxed);
    }

    #[inline]
    pub fn rx(&self) -> u32 {
        self.rx_bytes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn tx(&self) -> u32 {
        self.tx_bytes.load(Ordering::Relaxed)
    }

    /// Zero both totals
    pub fn reset(&self) {
        self.rx_bytes.store(0, Ordering::Relaxed);
        self.tx_bytes.store(0, Ordering::Relaxed);
    }
}

/// Mode selectors and counters of one bridge instance
///
/// # Fields
///
/// - `led_mode`: indicator blink mode, 2 bits (stored only)
/// - `tcp_path` / `udp_path`: raw path mode bytes as last written
/// - `tcp` / `udp`: per-channel byte counters
#[derive(Debug)]
pub struct SessionState {
    led_mode: AtomicU8,
    tcp_path: AtomicU8,
    udp_path: AtomicU8,
    pub tcp: ChannelCounters,
    pub udp: ChannelCounters,
}

impl SessionState {
    /// Create state with the given startup path modes
    pub fn new(tcp_path: u8, udp_path: u8) -> Self {
        Self {
            led_mode: AtomicU8::new(0),
            tcp_path: AtomicU8::new(tcp_path),
            udp_path: AtomicU8::new(udp_path),
            tcp: ChannelCounters::default(),
            udp: ChannelCounters::default(),
        }
    }

    pub fn led_mode(&self) -> u8 {
        self.led_mode.load(Ordering::Relaxed)
    }

    /// Store LED mode, keeping the low 2 bits
    pub fn set_led_mode(&self, value: u32) {
        self.led_mode.store((value & 0x3) as u8, Ordering::Relaxed);
    }

    pub fn tcp_path_raw(&self) -> u8 {
        self.tcp_path.load(Ordering::Relaxed)
    }

    /// Store TCP path mode, keeping the low 8 bits. Unknown values are kept
    /// as-is and route nothing.
    pub fn set_tcp_path(&self, value: u32) {
        self.tcp_path.store((value & 0xFF) as u8, Ordering::Relaxed);
    }

    pub fn tcp_path(&self) -> TcpPath {
        TcpPath::from_raw(self.tcp_path_raw())
    }

    pub fn udp_path_raw(&self) -> u8 {
        self.udp_path.load(Ordering::Relaxed)
    }

    /// Store UDP path mode, keeping the low 8 bits
    pub fn set_udp_path(&self, value: u32) {
        self.udp_path.store((value & 0xFF) as u8, Ordering::Relaxed);
    }

    pub fn udp_path(&self) -> UdpPath {
        UdpPath::from_raw(self.udp_path_raw())
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(TcpPath::ReceiveOnly.raw(), UdpPath::Loopback.raw())
    }
}
