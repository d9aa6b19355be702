//! In-process stand-in for the programmable-logic side of the bridge
//!
//! Behaves like the reference bitstream:
//!
//! - a pushed block lands in transmit memory
//! - writing `COPY_TX_TO_RX` to `COPY_CONTROL` copies transmit memory into
//!   receive memory
//! - an armed receive transfer starts when `TX_TRIGGER` is written and
//!   delivers receive memory
//! - every other offset in the 1 KiB window is a plain 32-bit register
//!
//! Completions are signalled on crossbeam channels the way the interrupt
//! handlers do on hardware. Faults can be injected per direction through a
//! [`FaultHandle`] for exercising the engine's recovery path.

use super::dma::{Completion, DmaController};
use super::{
    Direction, PeripheralBus, TransferError, COPY_CONTROL, COPY_TX_TO_RX, REGISTER_WINDOW,
    TX_TRIGGER,
};
use crate::core::types::{Block, BLOCK_SIZE};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

const REGISTER_WORDS: usize = REGISTER_WINDOW as usize / 4;

/// Polls a reset takes to finish
const RESET_LATENCY_POLLS: u32 = 3;

/// One-shot misbehaviour for the next transfer in a direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Refuse the submit
    Reject,
    /// Signal an error completion
    Error,
    /// Never signal completion
    Stall,
    /// Hold the completion until the controller is reset
    Late,
}

#[derive(Debug, Default)]
struct Faults {
    to_device: Option<Fault>,
    from_device: Option<Fault>,
}

/// Shared fault injection switch
#[derive(Debug, Clone, Default)]
pub struct FaultHandle {
    inner: Arc<Mutex<Faults>>,
}

impl FaultHandle {
    /// Arm `fault` for the next transfer in `direction`
    pub fn inject(&self, direction: Direction, fault: Fault) {
        let mut faults = self.inner.lock();
        match direction {
            Direction::ToDevice => faults.to_device = Some(fault),
            Direction::FromDevice => faults.from_device = Some(fault),
        }
    }

    fn take(&self, direction: Direction) -> Option<Fault> {
        let mut faults = self.inner.lock();
        match direction {
            Direction::ToDevice => faults.to_device.take(),
            Direction::FromDevice => faults.from_device.take(),
        }
    }
}

/// Simulated fabric with transmit/receive memories and a register window
pub struct LoopbackFabric {
    regs: [u32; REGISTER_WORDS],
    tx_ram: Box<Block>,
    rx_ram: Box<Block>,
    landed: Box<Block>,
    receive_armed: bool,
    to_device_done: Sender<Completion>,
    from_device_done: Sender<Completion>,
    held: Vec<Direction>,
    faults: FaultHandle,
    reset_polls_left: u32,
    resets: u32,
}

impl LoopbackFabric {
    /// Create the fabric and the completion receivers for both directions
    pub fn new() -> (Self, Receiver<Completion>, Receiver<Completion>) {
        let (to_device_done, to_device_rx) = unbounded();
        let (from_device_done, from_device_rx) = unbounded();
        let fabric = Self {
            regs: [0; REGISTER_WORDS],
            tx_ram: Box::new([0; BLOCK_SIZE]),
            rx_ram: Box::new([0; BLOCK_SIZE]),
            landed: Box::new([0; BLOCK_SIZE]),
            receive_armed: false,
            to_device_done,
            from_device_done,
            held: Vec::new(),
            faults: FaultHandle::default(),
            reset_polls_left: 0,
            resets: 0,
        };
        (fabric, to_device_rx, from_device_rx)
    }

    pub fn faults(&self) -> FaultHandle {
        self.faults.clone()
    }

    /// Number of controller resets so far
    pub fn reset_count(&self) -> u32 {
        self.resets
    }

    fn signal(&mut self, direction: Direction, fault: Option<Fault>) {
        let completion = match fault {
            Some(Fault::Stall) => return,
            Some(Fault::Late) => {
                self.held.push(direction);
                return;
            }
            Some(Fault::Error) => Completion::Error,
            Some(Fault::Reject) | None => Completion::Done,
        };
        self.send(direction, completion);
    }

    fn send(&self, direction: Direction, completion: Completion) {
        let sender = match direction {
            Direction::ToDevice => &self.to_device_done,
            Direction::FromDevice => &self.from_device_done,
        };
        // Engine gone means nobody is waiting
        let _ = sender.send(completion);
    }

    fn start_receive(&mut self) {
        if !self.receive_armed {
            log::debug!("Fabric trigger with no receive armed");
            return;
        }
        self.receive_armed = false;
        let fault = self.faults.take(Direction::FromDevice);
        if !matches!(fault, Some(Fault::Stall) | Some(Fault::Error)) {
            self.landed.copy_from_slice(&self.rx_ram[..]);
        }
        self.signal(Direction::FromDevice, fault);
    }
}

impl PeripheralBus for LoopbackFabric {
    fn read_register(&self, offset: u16) -> u32 {
        self.regs
            .get(offset as usize / 4)
            .copied()
            .unwrap_or_default()
    }

    fn write_register(&mut self, offset: u16, value: u32) {
        let Some(slot) = self.regs.get_mut(offset as usize / 4) else {
            log::warn!("Fabric write outside register window: 0x{:04X}", offset);
            return;
        };
        *slot = value;

        match offset {
            COPY_CONTROL if value == COPY_TX_TO_RX => {
                self.rx_ram.copy_from_slice(&self.tx_ram[..]);
                log::trace!("Fabric copied transmit memory to receive memory");
            }
            TX_TRIGGER if value & 1 != 0 => self.start_receive(),
            _ => {}
        }
    }
}

impl DmaController for LoopbackFabric {
    fn submit_to_device(&mut self, block: &Block) -> Result<(), TransferError> {
        let fault = self.faults.take(Direction::ToDevice);
        if fault == Some(Fault::Reject) {
            return Err(TransferError::Rejected {
                direction: Direction::ToDevice,
                reason: "controller busy".to_string(),
            });
        }
        self.tx_ram.copy_from_slice(block);
        self.signal(Direction::ToDevice, fault);
        Ok(())
    }

    fn submit_from_device(&mut self) -> Result<(), TransferError> {
        let mut faults = self.faults.inner.lock();
        if faults.from_device == Some(Fault::Reject) {
            faults.from_device = None;
            return Err(TransferError::Rejected {
                direction: Direction::FromDevice,
                reason: "controller busy".to_string(),
            });
        }
        drop(faults);
        self.receive_armed = true;
        Ok(())
    }

    fn collect_from_device(&mut self, block: &mut Block) {
        block.copy_from_slice(&self.landed[..]);
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.receive_armed = false;
        self.reset_polls_left = RESET_LATENCY_POLLS;
        for direction in std::mem::take(&mut self.held) {
            self.send(direction, Completion::Done);
        }
    }

    fn reset_done(&mut self) -> bool {
        if self.reset_polls_left == 0 {
            return true;
        }
        self.reset_polls_left -= 1;
        self.reset_polls_left == 0
    }
}
