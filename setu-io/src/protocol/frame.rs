//! Fixed 10-byte command and reply frames
//!
//! ```text
//! ┌──────┬────────┬──────────────┬──────────────────┬───────────┐
//! │ 0xEB │ opcode │ address (BE) │ data (BE)        │ 0xEE 0xEE │
//! │ 1 B  │ 1 B    │ 2 B          │ 4 B              │ 2 B       │
//! └──────┴────────┴──────────────┴──────────────────┴───────────┘
//! ```
//!
//! Replies use the same layout. A rejected command is answered with address
//! `0xEEEE` and data `0xEEEEEEEE`.

use std::fmt;

/// Bytes per frame
pub const FRAME_SIZE: usize = 10;

/// First byte of every frame
pub const MAGIC: u8 = 0xEB;

/// Last two bytes of every frame
pub const TRAILER: [u8; 2] = [0xEE, 0xEE];

/// Address field of an invalid reply
pub const INVALID_ADDRESS: u16 = 0xEEEE;

/// Data field of an invalid reply
pub const INVALID_DATA: u32 = 0xEEEE_EEEE;

/// Command opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Write = 0x90,
    Read = 0x91,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x90 => Some(Opcode::Write),
            0x91 => Some(Opcode::Read),
            _ => None,
        }
    }

    /// Opcode an invalid reply carries for a frame whose opcode byte was
    /// `byte`; anything that is not a write is answered as a read
    pub fn reply_for(byte: u8) -> Self {
        if byte == Opcode::Write as u8 {
            Opcode::Write
        } else {
            Opcode::Read
        }
    }
}

/// Why a frame was not accepted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("short frame: {0} bytes")]
    Short(usize),

    #[error("bad magic byte 0x{0:02X}")]
    BadMagic(u8),

    #[error("bad trailer {0:02X?}")]
    BadTrailer([u8; 2]),

    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),
}

/// Inbound register command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    pub opcode: Opcode,
    pub address: u16,
    pub data: u32,
}

impl CommandFrame {
    pub fn write(address: u16, data: u32) -> Self {
        Self {
            opcode: Opcode::Write,
            address,
            data,
        }
    }

    pub fn read(address: u16) -> Self {
        Self {
            opcode: Opcode::Read,
            address,
            data: 0,
        }
    }

    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        encode(self.opcode as u8, self.address, self.data)
    }

    /// Parse the first `FRAME_SIZE` bytes of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let (opcode, address, data) = split(buf)?;
        let opcode = Opcode::from_byte(opcode).ok_or(FrameError::UnknownOpcode(opcode))?;
        Ok(Self {
            opcode,
            address,
            data,
        })
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode {
            Opcode::Write => write!(f, "WRITE 0x{:04X} <- 0x{:08X}", self.address, self.data),
            Opcode::Read => write!(f, "READ 0x{:04X}", self.address),
        }
    }
}

/// Outbound reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyFrame {
    pub opcode: Opcode,
    pub address: u16,
    pub data: u32,
}

impl ReplyFrame {
    pub fn new(opcode: Opcode, address: u16, data: u32) -> Self {
        Self {
            opcode,
            address,
            data,
        }
    }

    /// Canonical rejection
    pub fn invalid(opcode: Opcode) -> Self {
        Self::new(opcode, INVALID_ADDRESS, INVALID_DATA)
    }

    pub fn is_invalid(&self) -> bool {
        self.address == INVALID_ADDRESS && self.data == INVALID_DATA
    }

    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        encode(self.opcode as u8, self.address, self.data)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let (opcode, address, data) = split(buf)?;
        let opcode = Opcode::from_byte(opcode).ok_or(FrameError::UnknownOpcode(opcode))?;
        Ok(Self::new(opcode, address, data))
    }
}

fn encode(opcode: u8, address: u16, data: u32) -> [u8; FRAME_SIZE] {
    let mut out = [0u8; FRAME_SIZE];
    out[0] = MAGIC;
    out[1] = opcode;
    out[2..4].copy_from_slice(&address.to_be_bytes());
    out[4..8].copy_from_slice(&data.to_be_bytes());
    out[8..10].copy_from_slice(&TRAILER);
    out
}

fn split(buf: &[u8]) -> Result<(u8, u16, u32), FrameError> {
    if buf.len() < FRAME_SIZE {
        return Err(FrameError::Short(buf.len()));
    }
    if buf[0] != MAGIC {
        return Err(FrameError::BadMagic(buf[0]));
    }
    if buf[8..10] != TRAILER {
        return Err(FrameError::BadTrailer([buf[8], buf[9]]));
    }
    let address = u16::from_be_bytes([buf[2], buf[3]]);
    let data = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    Ok((buf[1], address, data))
}
