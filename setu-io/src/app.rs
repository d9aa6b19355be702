//! Application orchestration for the SetuIO daemon
//!
//! Builds the device and shared bridge state, binds the three channels, and
//! runs each server on its own thread until shutdown.

use crate::bridge::{BridgeContext, UdpReassembler};
use crate::config::Config;
use crate::core::state::SessionState;
use crate::device::{self, create_device, BridgeDevice};
use crate::error::{Error, Result};
use crate::streaming::{ControlServer, DataTcpServer, DataUdpServer};
use log::{error, info};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Interval between statistics log lines
const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Bound sockets and shared state, ready to run
pub struct SetuApp {
    ctx: BridgeContext,
    control: ControlServer,
    data_tcp: DataTcpServer,
    data_udp: DataUdpServer,
}

impl SetuApp {
    /// Create the device and bind every channel
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_device(config, create_device(&config.device)?)
    }

    /// Bind every channel around an already built device
    pub fn with_device(config: &Config, device: Box<dyn BridgeDevice>) -> Result<Self> {
        info!("Initializing SetuIO bridge");

        let dev = device::share(device);
        let bridge = &config.bridge;
        let state = SessionState::new(bridge.tcp_path, bridge.udp_path);
        let ctx = BridgeContext::new(state, bridge.ring_blocks, dev);
        info!(
            "Path modes: TCP 0x{:02X}, UDP 0x{:02X}; ring of {} blocks",
            bridge.tcp_path, bridge.udp_path, bridge.ring_blocks
        );

        let net = &config.network;
        let control = ControlServer::bind(&net.control_addr(), ctx.clone(), bridge.tx_queue_bytes)?;
        let data_tcp = DataTcpServer::bind(
            &net.data_tcp_addr(),
            ctx.clone(),
            bridge.tx_queue_bytes,
            bridge.tick_interval(),
        )?;
        let reassembler = UdpReassembler::new(Arc::clone(&ctx.state), ctx.device.clone());
        let data_udp = DataUdpServer::bind(&net.data_udp_addr(), reassembler)?;

        Ok(Self {
            ctx,
            control,
            data_tcp,
            data_udp,
        })
    }

    pub fn control_addr(&self) -> Result<SocketAddr> {
        self.control.local_addr()
    }

    pub fn data_tcp_addr(&self) -> Result<SocketAddr> {
        self.data_tcp.local_addr()
    }

    pub fn data_udp_addr(&self) -> Result<SocketAddr> {
        self.data_udp.local_addr()
    }

    /// Shared state, for inspection
    pub fn context(&self) -> &BridgeContext {
        &self.ctx
    }

    /// Serve until `running` clears, then wait for every server thread
    pub fn run(self, running: Arc<AtomicBool>) -> Result<()> {
        let Self {
            ctx,
            control,
            data_tcp,
            data_udp,
        } = self;

        let handles = vec![
            spawn_server("control", &running, move |r| control.run(r))?,
            spawn_server("data-tcp", &running, move |r| data_tcp.run(r))?,
            spawn_server("data-udp", &running, move |r| data_udp.run(r))?,
        ];
        info!("SetuIO running");

        let mut last_stats = Instant::now();
        while running.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(100));
            if last_stats.elapsed() >= STATS_INTERVAL {
                log_statistics(&ctx);
                last_stats = Instant::now();
            }
        }

        info!("Shutting down...");
        for handle in handles {
            if handle.join().is_err() {
                error!("Server thread panicked");
            }
        }
        log_statistics(&ctx);
        info!("SetuIO stopped");
        Ok(())
    }
}

fn spawn_server<F>(name: &str, running: &Arc<AtomicBool>, server: F) -> Result<JoinHandle<()>>
where
    F: FnOnce(Arc<AtomicBool>) -> Result<()> + Send + 'static,
{
    let running = Arc::clone(running);
    let label = name.to_string();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            if let Err(e) = server(Arc::clone(&running)) {
                error!("{} server failed: {}", label, e);
                // A dead channel takes the daemon down with it
                running.store(false, Ordering::Relaxed);
            }
        })
        .map_err(|e| Error::Other(format!("Failed to spawn {} thread: {}", name, e)))
}

fn log_statistics(ctx: &BridgeContext) {
    let state = &ctx.state;
    info!(
        "TCP rx={} tx={} (mode 0x{:02X}) | UDP rx={} tx={} (mode 0x{:02X})",
        state.tcp.rx(),
        state.tcp.tx(),
        state.tcp_path_raw(),
        state.udp.rx(),
        state.udp.tx(),
        state.udp_path_raw()
    );
}
