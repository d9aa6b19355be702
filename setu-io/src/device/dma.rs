//! DMA engine: completion wait and recovery around a controller backend
//!
//! A [`DmaController`] only knows how to start transfers and reset itself.
//! Completion is reported asynchronously on one channel per direction (the
//! interrupt handlers on real hardware). [`DmaEngine`] turns that into the
//! blocking [`BlockTransfer`] the bridge uses:
//!
//! ```text
//! drain stale completions -> submit -> (from-device: trigger) -> recv_timeout
//!                                                           |
//!                              Error / Timeout -> reset + bounded poll
//! ```

use super::loopback::LoopbackFabric;
use super::{BlockTransfer, Direction, PeripheralBus, TransferError, TX_TRIGGER};
use crate::core::types::Block;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::Duration;

/// Upper bound on reset-done polls after a failed transfer
pub const RESET_POLL_LIMIT: u32 = 10_000;

/// Completion event raised by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Done,
    Error,
}

/// Register-level controller driven by [`DmaEngine`]
pub trait DmaController: PeripheralBus {
    /// Start moving `block` to the device
    fn submit_to_device(&mut self, block: &Block) -> Result<(), TransferError>;

    /// Arm the receive channel for one block
    fn submit_from_device(&mut self) -> Result<(), TransferError>;

    /// Copy the block that landed after a successful receive completion
    fn collect_from_device(&mut self, block: &mut Block);

    /// Begin a controller reset
    fn reset(&mut self);

    /// Reset has finished
    fn reset_done(&mut self) -> bool;
}

/// Blocking block transfers over a [`DmaController`]
pub struct DmaEngine<C: DmaController> {
    controller: C,
    to_device_done: Receiver<Completion>,
    from_device_done: Receiver<Completion>,
    timeout: Duration,
}

impl<C: DmaController> DmaEngine<C> {
    pub fn new(
        controller: C,
        to_device_done: Receiver<Completion>,
        from_device_done: Receiver<Completion>,
        timeout: Duration,
    ) -> Self {
        Self {
            controller,
            to_device_done,
            from_device_done,
            timeout,
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    fn completions(&self, direction: Direction) -> &Receiver<Completion> {
        match direction {
            Direction::ToDevice => &self.to_device_done,
            Direction::FromDevice => &self.from_device_done,
        }
    }

    /// Discard completions left over from an abandoned transfer
    fn drain(&self, direction: Direction) {
        let stale = self.completions(direction).try_iter().count();
        if stale > 0 {
            log::debug!("Dropped {} stale {} completion(s)", stale, direction);
        }
    }

    fn wait(&mut self, direction: Direction) -> Result<(), TransferError> {
        let outcome = self.completions(direction).recv_timeout(self.timeout);
        match outcome {
            Ok(Completion::Done) => Ok(()),
            Ok(Completion::Error) => {
                log::error!("DMA {} transfer error, resetting controller", direction);
                self.recover();
                Err(TransferError::Device(direction))
            }
            Err(RecvTimeoutError::Timeout) => {
                log::error!(
                    "DMA {} transfer timed out after {:?}, resetting controller",
                    direction,
                    self.timeout
                );
                self.recover();
                Err(TransferError::Timeout {
                    direction,
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::error!("DMA {} completion channel disconnected", direction);
                Err(TransferError::Disconnected)
            }
        }
    }

    fn recover(&mut self) {
        self.controller.reset();
        for _ in 0..RESET_POLL_LIMIT {
            if self.controller.reset_done() {
                log::debug!("DMA controller reset complete");
                return;
            }
        }
        log::error!(
            "DMA controller did not finish reset within {} polls",
            RESET_POLL_LIMIT
        );
    }
}

impl DmaEngine<LoopbackFabric> {
    /// Engine over a fresh in-process loopback fabric
    pub fn loopback(timeout: Duration) -> Self {
        let (fabric, to_device_done, from_device_done) = LoopbackFabric::new();
        Self::new(fabric, to_device_done, from_device_done, timeout)
    }
}

impl<C: DmaController> BlockTransfer for DmaEngine<C> {
    fn transfer_out(&mut self, block: &Block) -> Result<(), TransferError> {
        self.drain(Direction::ToDevice);
        self.controller.submit_to_device(block)?;
        self.wait(Direction::ToDevice)
    }

    fn transfer_in(&mut self, block: &mut Block) -> Result<(), TransferError> {
        self.drain(Direction::FromDevice);
        self.controller.submit_from_device()?;
        // The fabric only starts sending once told to
        self.controller.write_register(TX_TRIGGER, 1);
        self.wait(Direction::FromDevice)?;
        self.controller.collect_from_device(block);
        Ok(())
    }
}

impl<C: DmaController> PeripheralBus for DmaEngine<C> {
    fn read_register(&self, offset: u16) -> u32 {
        self.controller.read_register(offset)
    }

    fn write_register(&mut self, offset: u16, value: u32) {
        self.controller.write_register(offset, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BLOCK_SIZE;
    use crate::device::loopback::Fault;
    use crate::device::{COPY_CONTROL, COPY_TX_TO_RX};

    fn engine() -> DmaEngine<LoopbackFabric> {
        DmaEngine::loopback(Duration::from_millis(50))
    }

    #[test]
    fn test_out_then_in_after_copy() {
        let mut dma = engine();
        let out = [0xA5u8; BLOCK_SIZE];
        dma.transfer_out(&out).unwrap();
        dma.write_register(COPY_CONTROL, COPY_TX_TO_RX);

        let mut back = [0u8; BLOCK_SIZE];
        dma.transfer_in(&mut back).unwrap();
        assert_eq!(back, out);
    }

    #[test]
    fn test_in_without_copy_returns_receive_memory() {
        let mut dma = engine();
        dma.transfer_out(&[0x11u8; BLOCK_SIZE]).unwrap();

        let mut back = [0xFFu8; BLOCK_SIZE];
        dma.transfer_in(&mut back).unwrap();
        assert_eq!(back, [0u8; BLOCK_SIZE]);
    }

    #[test]
    fn test_device_error_resets_controller() {
        let mut dma = engine();
        let faults = dma.controller().faults();
        faults.inject(Direction::ToDevice, Fault::Error);

        let err = dma.transfer_out(&[0u8; BLOCK_SIZE]).unwrap_err();
        assert_eq!(err, TransferError::Device(Direction::ToDevice));
        assert_eq!(dma.controller().reset_count(), 1);

        // Next transfer is unaffected
        assert!(dma.transfer_out(&[0u8; BLOCK_SIZE]).is_ok());
    }

    #[test]
    fn test_stall_times_out() {
        let mut dma = engine();
        dma.controller().faults().inject(Direction::FromDevice, Fault::Stall);

        let mut block = [0u8; BLOCK_SIZE];
        let err = dma.transfer_in(&mut block).unwrap_err();
        assert_eq!(
            err,
            TransferError::Timeout {
                direction: Direction::FromDevice,
                timeout_ms: 50
            }
        );
        assert_eq!(dma.controller().reset_count(), 1);
    }

    #[test]
    fn test_rejected_submit_skips_wait() {
        let mut dma = engine();
        dma.controller().faults().inject(Direction::ToDevice, Fault::Reject);

        let err = dma.transfer_out(&[0u8; BLOCK_SIZE]).unwrap_err();
        assert!(matches!(
            err,
            TransferError::Rejected {
                direction: Direction::ToDevice,
                ..
            }
        ));
        assert_eq!(dma.controller().reset_count(), 0);
    }

    #[test]
    fn test_late_completion_is_drained() {
        let mut dma = engine();
        dma.controller().faults().inject(Direction::ToDevice, Fault::Late);

        // Completion arrives after the wait gave up
        assert!(dma.transfer_out(&[1u8; BLOCK_SIZE]).is_err());
        dma.controller().faults().inject(Direction::ToDevice, Fault::Error);

        // The stale Done from the late completion must not satisfy this wait
        let err = dma.transfer_out(&[2u8; BLOCK_SIZE]).unwrap_err();
        assert_eq!(err, TransferError::Device(Direction::ToDevice));
    }
}
