//! Command decoder: frames in, register effects, replies out

use super::frame::{CommandFrame, Opcode, ReplyFrame, FRAME_SIZE};
use super::registers::{Register, FIRMWARE_DATE};
use crate::bridge::BridgeContext;
use crate::core::types::{fill_words, hex_dump};
use crate::streaming::tx_queue::TxQueue;

/// Fill byte of the receive buffer before a diagnostic pull
const DIAG_FILL: u8 = 0x55;

/// Applies register commands to the shared bridge state
pub struct CommandDecoder {
    ctx: BridgeContext,
}

impl CommandDecoder {
    pub fn new(ctx: BridgeContext) -> Self {
        Self { ctx }
    }

    /// Handle every frame in one inbound message and queue the replies
    ///
    /// The message is cut into consecutive 10-byte frames; a short tail is
    /// answered as an invalid frame. Replies that do not fit in `out` are
    /// dropped. Returns the number of replies queued.
    pub fn handle_message(&self, message: &[u8], out: &TxQueue) -> usize {
        let mut queued = 0;
        for chunk in message.chunks(FRAME_SIZE) {
            let reply = self.handle_frame(chunk);
            if !out.has_room(FRAME_SIZE) {
                log::warn!("No room for reply, dropping {:?}", reply);
                continue;
            }
            match out.push(reply.encode().to_vec()) {
                Ok(()) => queued += 1,
                Err(e) => log::warn!("Reply dropped: {}", e),
            }
        }
        queued
    }

    /// Decode one frame and apply it
    pub fn handle_frame(&self, buf: &[u8]) -> ReplyFrame {
        let frame = match CommandFrame::decode(buf) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Rejecting frame {:02X?}: {}", buf, e);
                let opcode = Opcode::reply_for(buf.get(1).copied().unwrap_or_default());
                return ReplyFrame::invalid(opcode);
            }
        };

        log::debug!("Command: {}", frame);
        let reply = match frame.opcode {
            Opcode::Write => self.write(frame.address, frame.data),
            Opcode::Read => self.read(frame.address),
        };
        if reply.is_invalid() {
            log::debug!("Invalid register access: {}", frame);
        }
        reply
    }

    fn write(&self, address: u16, data: u32) -> ReplyFrame {
        let state = &self.ctx.state;
        match Register::lookup(address).filter(|r| r.writable()) {
            Some(Register::LedMode) => state.set_led_mode(data),
            Some(Register::TcpPath) => {
                state.set_tcp_path(data);
                log::info!("TCP path mode set to 0x{:02X}", state.tcp_path_raw());
            }
            Some(Register::UdpPath) => {
                state.set_udp_path(data);
                log::info!("UDP path mode set to 0x{:02X}", state.udp_path_raw());
            }
            Some(Register::TcpReset) => {
                if data & 1 != 0 {
                    state.tcp.reset();
                    self.ctx.ring.lock().reset();
                    log::info!("TCP counters and circular buffer reset");
                }
            }
            Some(Register::UdpReset) => {
                if data & 1 != 0 {
                    state.udp.reset();
                    log::info!("UDP counters reset");
                }
            }
            Some(Register::DiagTransferIn) => self.diag_transfer_in(),
            Some(Register::DiagTransferOut) => self.diag_transfer_out(data),
            Some(Register::Passthrough(offset)) => {
                self.ctx.device.lock().write_register(offset, data);
            }
            _ => return ReplyFrame::invalid(Opcode::Write),
        }
        ReplyFrame::new(Opcode::Write, address, data)
    }

    fn read(&self, address: u16) -> ReplyFrame {
        let state = &self.ctx.state;
        let value = match Register::lookup(address).filter(|r| r.readable()) {
            Some(Register::FirmwareDate) => FIRMWARE_DATE,
            Some(Register::LedMode) => state.led_mode() as u32,
            Some(Register::TcpPath) => state.tcp_path_raw() as u32,
            Some(Register::TcpRxBytes) => state.tcp.rx(),
            Some(Register::TcpTxBytes) => state.tcp.tx(),
            Some(Register::UdpPath) => state.udp_path_raw() as u32,
            Some(Register::UdpRxBytes) => state.udp.rx(),
            Some(Register::UdpTxBytes) => state.udp.tx(),
            Some(Register::Passthrough(offset)) => self.ctx.device.lock().read_register(offset),
            _ => return ReplyFrame::invalid(Opcode::Read),
        };
        ReplyFrame::new(Opcode::Read, address, value)
    }

    fn diag_transfer_in(&self) {
        let mut ring = self.ctx.ring.lock();
        let block = ring.first_block_mut();
        block.fill(DIAG_FILL);
        let result = self.ctx.device.lock().transfer_in(block);
        match result {
            Ok(()) => {
                log::info!("Diagnostic transfer in:\n{}", hex_dump(&block[..], false));
            }
            Err(e) => log::error!("Diagnostic transfer in failed: {}", e),
        }
    }

    fn diag_transfer_out(&self, word: u32) {
        let mut ring = self.ctx.ring.lock();
        let block = ring.first_block_mut();
        fill_words(block, word);
        match self.ctx.device.lock().transfer_out(block) {
            Ok(()) => log::info!("Diagnostic transfer out of 0x{:08X} done", word),
            Err(e) => log::error!("Diagnostic transfer out failed: {}", e),
        }
    }
}
