//! Integration tests for setu-io over real loopback sockets
//!
//! Each test starts a full bridge (control, TCP data, UDP data) on ephemeral
//! ports of 127.0.0.1 with the loopback fabric as the device.
//!
//! ```bash
//! cargo test -p setu-io --test integration
//! ```

mod control;
mod data_tcp;
mod data_udp;
mod harness;

pub use harness::{eventually, TestHarness};
