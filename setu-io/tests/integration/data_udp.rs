//! UDP reassembly over a real socket

use super::{eventually, harness::IO_TIMEOUT, TestHarness};
use setu_io::core::types::SUB_BLOCK_SIZE;
use std::net::UdpSocket;

fn client() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.set_read_timeout(Some(IO_TIMEOUT)).unwrap();
    socket
}

fn datagrams() -> Vec<Vec<u8>> {
    (0..4u8)
        .map(|i| {
            let mut d = vec![0x40 + i; SUB_BLOCK_SIZE];
            d[0] = i;
            d
        })
        .collect()
}

fn echo_block(bridge: &TestHarness, socket: &UdpSocket) -> Vec<Vec<u8>> {
    for d in datagrams() {
        socket.send_to(&d, bridge.data_udp).unwrap();
    }
    (0..4)
        .map(|_| {
            let mut buf = [0u8; 2048];
            let (n, from) = socket.recv_from(&mut buf).unwrap();
            assert_eq!(from, bridge.data_udp);
            buf[..n].to_vec()
        })
        .collect()
}

#[test]
fn loopback_echoes_four_datagrams() {
    let bridge = TestHarness::start(0x01, 0x03);
    let socket = client();

    assert_eq!(echo_block(&bridge, &socket), datagrams());

    let mut control = bridge.control_client();
    assert!(eventually(|| control.read(0x8028) == 4096));
    assert_eq!(control.read(0x8024), 4096);
}

#[test]
fn round_trip_through_device() {
    let bridge = TestHarness::start(0x01, 0x13);
    let socket = client();
    assert_eq!(echo_block(&bridge, &socket), datagrams());
}

#[test]
fn udp_reset_register_clears_counters() {
    let bridge = TestHarness::start(0x01, 0x03);
    let socket = client();
    echo_block(&bridge, &socket);

    let mut control = bridge.control_client();
    assert!(eventually(|| control.read(0x8028) == 4096));
    control.write(0x802C, 1);
    assert_eq!(control.read(0x8024), 0);
    assert_eq!(control.read(0x8028), 0);
}
