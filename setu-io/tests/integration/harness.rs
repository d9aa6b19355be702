//! Bridge lifecycle and client helpers for integration tests

use setu_io::bridge::BridgeContext;
use setu_io::core::types::Block;
use setu_io::device::{
    create_device, BlockTransfer, BridgeDevice, PeripheralBus, TransferError,
};
use setu_io::protocol::{CommandFrame, ReplyFrame, FRAME_SIZE};
use setu_io::{Config, Result, SetuApp};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Upper bound for any single network wait in a test
pub const IO_TIMEOUT: Duration = Duration::from_secs(3);

/// A running bridge, stopped on drop
pub struct TestHarness {
    pub control: SocketAddr,
    pub data_tcp: SocketAddr,
    pub data_udp: SocketAddr,
    pub ctx: BridgeContext,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl TestHarness {
    pub fn start(tcp_path: u8, udp_path: u8) -> Self {
        Self::start_counting(tcp_path, udp_path).0
    }

    /// Start with a device wrapper that counts block transfers
    pub fn start_counting(tcp_path: u8, udp_path: u8) -> (Self, Arc<TransferCounts>) {
        let mut config = Config::default();
        config.network.bind_address = "127.0.0.1".to_string();
        config.network.control_port = 0;
        config.network.data_tcp_port = 0;
        config.network.data_udp_port = 0;
        config.bridge.tcp_path = tcp_path;
        config.bridge.udp_path = udp_path;
        config.device.transfer_timeout_ms = 200;

        let counts = Arc::new(TransferCounts::default());
        let device = CountingDevice {
            inner: create_device(&config.device).expect("loopback device"),
            counts: Arc::clone(&counts),
        };
        let app = SetuApp::with_device(&config, Box::new(device)).expect("bridge should start");
        let control = app.control_addr().unwrap();
        let data_tcp = app.data_tcp_addr().unwrap();
        let data_udp = app.data_udp_addr().unwrap();
        let ctx = app.context().clone();

        let running = Arc::new(AtomicBool::new(true));
        let r = Arc::clone(&running);
        let handle = thread::spawn(move || app.run(r));

        let harness = Self {
            control,
            data_tcp,
            data_udp,
            ctx,
            running,
            handle: Some(handle),
        };
        (harness, counts)
    }

    pub fn control_client(&self) -> ControlClient {
        ControlClient::connect(self.control)
    }

    pub fn data_client(&self) -> TcpStream {
        let stream = TcpStream::connect(self.data_tcp).expect("data channel connect");
        stream.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
        stream
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Block transfers seen by the device
#[derive(Debug, Default)]
pub struct TransferCounts {
    pub out: AtomicUsize,
    pub inn: AtomicUsize,
}

impl TransferCounts {
    pub fn out(&self) -> usize {
        self.out.load(Ordering::SeqCst)
    }

    pub fn inn(&self) -> usize {
        self.inn.load(Ordering::SeqCst)
    }
}

struct CountingDevice {
    inner: Box<dyn BridgeDevice>,
    counts: Arc<TransferCounts>,
}

impl BlockTransfer for CountingDevice {
    fn transfer_out(&mut self, block: &Block) -> std::result::Result<(), TransferError> {
        self.counts.out.fetch_add(1, Ordering::SeqCst);
        self.inner.transfer_out(block)
    }

    fn transfer_in(&mut self, block: &mut Block) -> std::result::Result<(), TransferError> {
        self.counts.inn.fetch_add(1, Ordering::SeqCst);
        self.inner.transfer_in(block)
    }
}

impl PeripheralBus for CountingDevice {
    fn read_register(&self, offset: u16) -> u32 {
        self.inner.read_register(offset)
    }

    fn write_register(&mut self, offset: u16, value: u32) {
        self.inner.write_register(offset, value)
    }
}

/// Blocking request/reply client for the control channel
pub struct ControlClient {
    stream: TcpStream,
}

impl ControlClient {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("control channel connect");
        stream.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
        stream.set_nodelay(true).unwrap();
        Self { stream }
    }

    /// Send raw bytes and read `replies` frames back
    pub fn exchange(&mut self, bytes: &[u8], replies: usize) -> Vec<ReplyFrame> {
        self.stream.write_all(bytes).unwrap();
        (0..replies)
            .map(|_| {
                let mut buf = [0u8; FRAME_SIZE];
                self.stream.read_exact(&mut buf).unwrap();
                ReplyFrame::decode(&buf).unwrap()
            })
            .collect()
    }

    pub fn request(&mut self, frame: CommandFrame) -> ReplyFrame {
        self.exchange(&frame.encode(), 1).remove(0)
    }

    pub fn read(&mut self, address: u16) -> u32 {
        self.request(CommandFrame::read(address)).data
    }

    pub fn write(&mut self, address: u16, data: u32) -> ReplyFrame {
        self.request(CommandFrame::write(address, data))
    }
}

/// Poll `check` until it holds or `IO_TIMEOUT` passes
pub fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    let deadline = Instant::now() + IO_TIMEOUT;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    check()
}
