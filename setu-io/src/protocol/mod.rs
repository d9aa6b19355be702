//! Register command protocol

pub mod decoder;
pub mod frame;
pub mod registers;

pub use decoder::CommandDecoder;
pub use frame::{CommandFrame, FrameError, Opcode, ReplyFrame, FRAME_SIZE};
pub use registers::Register;
