//! Register protocol over the control channel

use super::TestHarness;
use setu_io::protocol::{CommandFrame, Opcode, ReplyFrame};

#[test]
fn led_mode_write_then_read() {
    let bridge = TestHarness::start(0x01, 0x03);
    let mut client = bridge.control_client();

    let reply = client.write(0x8004, 2);
    assert_eq!(reply, ReplyFrame::new(Opcode::Write, 0x8004, 2));

    let reply = client.request(CommandFrame::read(0x8004));
    assert_eq!(reply, ReplyFrame::new(Opcode::Read, 0x8004, 2));
}

#[test]
fn misaligned_read_gets_invalid_reply() {
    let bridge = TestHarness::start(0x01, 0x03);
    let mut client = bridge.control_client();

    let reply = client.request(CommandFrame::read(0x0002));
    assert_eq!(reply, ReplyFrame::new(Opcode::Read, 0xEEEE, 0xEEEE_EEEE));
}

#[test]
fn malformed_frame_gets_invalid_reply() {
    let bridge = TestHarness::start(0x01, 0x03);
    let mut client = bridge.control_client();

    let mut bytes = CommandFrame::write(0x8004, 1).encode();
    bytes[0] = 0x00;
    let replies = client.exchange(&bytes, 1);
    assert!(replies[0].is_invalid());
    assert_eq!(replies[0].opcode, Opcode::Write);

    // State untouched, connection still usable
    assert_eq!(client.read(0x8004), 0);
}

#[test]
fn firmware_date_and_default_modes() {
    let bridge = TestHarness::start(0x01, 0x03);
    let mut client = bridge.control_client();

    assert_eq!(client.read(0x8000), 0x2018_1112);
    assert_eq!(client.read(0x8010), 0x01);
    assert_eq!(client.read(0x8020), 0x03);
}

#[test]
fn several_frames_in_one_write() {
    let bridge = TestHarness::start(0x01, 0x03);
    let mut client = bridge.control_client();

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&CommandFrame::write(0x8010, 0x0000_0113).encode());
    bytes.extend_from_slice(&CommandFrame::read(0x8010).encode());
    bytes.extend_from_slice(&CommandFrame::read(0x9000).encode());

    let replies = client.exchange(&bytes, 3);
    assert_eq!(replies[0], ReplyFrame::new(Opcode::Write, 0x8010, 0x0000_0113));
    assert_eq!(replies[1], ReplyFrame::new(Opcode::Read, 0x8010, 0x13));
    assert!(replies[2].is_invalid());
}

#[test]
fn passthrough_register_round_trip() {
    let bridge = TestHarness::start(0x01, 0x03);
    let mut client = bridge.control_client();

    assert_eq!(
        client.write(0x0100, 0x1234_5678),
        ReplyFrame::new(Opcode::Write, 0x0100, 0x1234_5678)
    );
    assert_eq!(client.read(0x0100), 0x1234_5678);
    assert_eq!(bridge.ctx.device.lock().read_register(0x0100), 0x1234_5678);
}

#[test]
fn two_clients_share_state() {
    let bridge = TestHarness::start(0x01, 0x03);
    let mut first = bridge.control_client();
    let mut second = bridge.control_client();

    first.write(0x8020, 0x13);
    assert_eq!(second.read(0x8020), 0x13);
}

#[test]
fn tcp_reset_clears_counters_and_ring() {
    let bridge = TestHarness::start(0x01, 0x03);
    let mut client = bridge.control_client();
    bridge.ctx.state.tcp.add_rx(1234);
    bridge.ctx.ring.lock().push(&[0u8; 100]).unwrap();

    client.write(0x801C, 1);
    assert_eq!(client.read(0x8014), 0);
    assert_eq!(client.read(0x8018), 0);
    let ring = bridge.ctx.ring.lock();
    assert_eq!((ring.write_ptr(), ring.read_ptr()), (0, 0));
}
