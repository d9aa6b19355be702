//! TCP data channel routing

use super::{eventually, TestHarness};
use setu_io::core::types::BLOCK_SIZE;
use setu_io::device::{COPY_CONTROL, COPY_TX_TO_RX};
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 253) as u8).collect()
}

#[test]
fn round_trip_mode_returns_block() {
    let bridge = TestHarness::start(0x01, 0x03);
    let mut control = bridge.control_client();
    control.write(0x8010, 0x13);

    let mut data = bridge.data_client();
    let block = pattern(BLOCK_SIZE);
    data.write_all(&block).unwrap();

    let mut back = vec![0u8; BLOCK_SIZE];
    data.read_exact(&mut back).unwrap();
    assert_eq!(back, block);

    // The fabric was asked to copy the pushed block back
    assert_eq!(control.read(COPY_CONTROL), COPY_TX_TO_RX);
    assert!(eventually(|| control.read(0x8018) == BLOCK_SIZE as u32));
    assert_eq!(control.read(0x8014), BLOCK_SIZE as u32);
}

#[test]
fn round_trip_mode_moves_block_once_each_way() {
    let (bridge, counts) = TestHarness::start_counting(0x13, 0x03);
    let mut data = bridge.data_client();
    let block = pattern(BLOCK_SIZE);
    data.write_all(&block).unwrap();

    let mut back = vec![0u8; BLOCK_SIZE];
    data.read_exact(&mut back).unwrap();
    assert_eq!(back, block);

    // Out, fabric copy, in: one pull per pushed block
    assert_eq!(counts.out(), 1);
    assert_eq!(counts.inn(), 1);

    // Nothing else is written back until another block arrives
    data.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    let mut extra = [0u8; 1];
    assert!(data.read(&mut extra).is_err());
    assert_eq!(counts.out(), 1);
}

#[test]
fn push_mode_transfers_without_reply() {
    let (bridge, counts) = TestHarness::start_counting(0x11, 0x03);
    let mut control = bridge.control_client();
    let mut data = bridge.data_client();
    data.write_all(&pattern(BLOCK_SIZE)).unwrap();

    assert!(eventually(|| counts.out() == 1));
    assert_eq!(counts.inn(), 0);
    assert_eq!(control.read(0x8018), 0);
}

#[test]
fn reconnect_resets_counters_and_ring() {
    let bridge = TestHarness::start(0x03, 0x03);
    let mut control = bridge.control_client();

    {
        let mut first = bridge.data_client();
        first.write_all(&pattern(BLOCK_SIZE + 100)).unwrap();
        let mut back = vec![0u8; BLOCK_SIZE];
        first.read_exact(&mut back).unwrap();
        assert!(eventually(|| control.read(0x8014) == BLOCK_SIZE as u32 + 100));
    }

    // The old session may still hold the slot for a moment; retry until
    // a connection is served
    let head = [0xC3u8; 10];
    let mut second = None;
    assert!(eventually(|| {
        let mut client = bridge.data_client();
        let _ = client.write_all(&head);
        let deadline = Instant::now() + Duration::from_millis(200);
        while Instant::now() < deadline {
            if bridge.ctx.state.tcp.rx() == head.len() as u32 {
                second = Some(client);
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }));
    let mut second = second.unwrap();

    assert_eq!(control.read(0x8014), head.len() as u32);
    assert_eq!(control.read(0x8018), 0);
    {
        let ring = bridge.ctx.ring.lock();
        assert_eq!(ring.read_ptr(), 0);
        assert_eq!(ring.write_ptr(), head.len());
    }

    // The 100 leftover bytes of the first session are not in the next block
    let rest = pattern(BLOCK_SIZE - head.len());
    second.write_all(&rest).unwrap();
    let mut back = vec![0u8; BLOCK_SIZE];
    second.read_exact(&mut back).unwrap();
    assert_eq!(&back[..head.len()], &head[..]);
    assert_eq!(&back[head.len()..], &rest[..]);
}

#[test]
fn loopback_mode_merges_small_writes() {
    let bridge = TestHarness::start(0x03, 0x03);
    let mut data = bridge.data_client();
    let stream = pattern(2 * BLOCK_SIZE);

    for chunk in stream.chunks(700) {
        data.write_all(chunk).unwrap();
    }

    let mut back = vec![0u8; 2 * BLOCK_SIZE];
    data.read_exact(&mut back).unwrap();
    assert_eq!(back, stream);
}

#[test]
fn receive_only_mode_counts_without_reply() {
    let bridge = TestHarness::start(0x01, 0x03);
    let mut control = bridge.control_client();
    let mut data = bridge.data_client();

    data.write_all(&pattern(3000)).unwrap();
    assert!(eventually(|| control.read(0x8014) == 3000));
    assert_eq!(control.read(0x8018), 0);
}

#[test]
fn synthetic_send_streams_numbered_blocks() {
    let bridge = TestHarness::start(0x02, 0x03);
    let mut data = bridge.data_client();

    let mut blocks = vec![0u8; 2 * BLOCK_SIZE];
    data.read_exact(&mut blocks).unwrap();

    let (first, second) = blocks.split_at(BLOCK_SIZE);
    assert_eq!(&first[..8], &[0xEB, 0x90, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03]);
    assert_eq!(&second[..4], &[0xEB, 0x90, 0x00, 0x01]);
    assert_eq!(first[4..], second[4..]);
}

#[test]
fn second_data_client_is_rejected() {
    let bridge = TestHarness::start(0x03, 0x03);
    let mut control = bridge.control_client();
    let mut first = bridge.data_client();
    // Make sure the first session is established before the second connects
    first.write_all(&[0u8; 10]).unwrap();
    assert!(eventually(|| control.read(0x8014) == 10));

    let mut second = bridge.data_client();
    let mut buf = [0u8; 16];
    match second.read(&mut buf) {
        Ok(0) => {}
        Err(e) if e.kind() == ErrorKind::ConnectionReset => {}
        other => panic!("second client was served: {:?}", other),
    }

    // First client unaffected
    let rest = pattern(BLOCK_SIZE - 10);
    first.write_all(&rest).unwrap();
    let mut back = vec![0u8; BLOCK_SIZE];
    first.read_exact(&mut back).unwrap();
    assert_eq!(&back[10..], &rest[..]);
}
