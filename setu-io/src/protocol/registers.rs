//! Register address map
//!
//! | Address  | Access | Register |
//! |----------|--------|----------|
//! | `0x8000` | R      | firmware build date |
//! | `0x8004` | R/W    | LED blink mode (2 bits) |
//! | `0x8010` | R/W    | TCP path mode (8 bits) |
//! | `0x8014` | R      | TCP received bytes |
//! | `0x8018` | R      | TCP sent bytes |
//! | `0x801C` | W      | TCP reset, bit 0 |
//! | `0x8020` | R/W    | UDP path mode (8 bits) |
//! | `0x8024` | R      | UDP received bytes |
//! | `0x8028` | R      | UDP sent bytes |
//! | `0x802C` | W      | UDP reset, bit 0 |
//! | `0x8030` | W      | diagnostic transfer in |
//! | `0x8034` | W      | diagnostic transfer out, data is the fill word |
//! | `0x0000..0x0400`, 4-aligned | R/W | fabric passthrough |

use crate::device::REGISTER_WINDOW;

/// Value of the firmware date register
pub const FIRMWARE_DATE: u32 = 0x2018_1112;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    FirmwareDate,
    LedMode,
    TcpPath,
    TcpRxBytes,
    TcpTxBytes,
    TcpReset,
    UdpPath,
    UdpRxBytes,
    UdpTxBytes,
    UdpReset,
    DiagTransferIn,
    DiagTransferOut,
    /// Fabric register at this offset
    Passthrough(u16),
}

impl Register {
    pub fn lookup(address: u16) -> Option<Self> {
        let reg = match address {
            0x8000 => Register::FirmwareDate,
            0x8004 => Register::LedMode,
            0x8010 => Register::TcpPath,
            0x8014 => Register::TcpRxBytes,
            0x8018 => Register::TcpTxBytes,
            0x801C => Register::TcpReset,
            0x8020 => Register::UdpPath,
            0x8024 => Register::UdpRxBytes,
            0x8028 => Register::UdpTxBytes,
            0x802C => Register::UdpReset,
            0x8030 => Register::DiagTransferIn,
            0x8034 => Register::DiagTransferOut,
            a if is_passthrough(a) => Register::Passthrough(a),
            _ => return None,
        };
        Some(reg)
    }

    pub fn readable(self) -> bool {
        !matches!(
            self,
            Register::TcpReset
                | Register::UdpReset
                | Register::DiagTransferIn
                | Register::DiagTransferOut
        )
    }

    pub fn writable(self) -> bool {
        matches!(
            self,
            Register::LedMode
                | Register::TcpPath
                | Register::TcpReset
                | Register::UdpPath
                | Register::UdpReset
                | Register::DiagTransferIn
                | Register::DiagTransferOut
                | Register::Passthrough(_)
        )
    }
}

/// Address falls in the fabric window on a word boundary
pub fn is_passthrough(address: u16) -> bool {
    address < REGISTER_WINDOW && address % 4 == 0
}
