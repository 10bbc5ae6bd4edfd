//! MCP2221 HID command framing.
//!
//! Every exchange with the bridge is one 64-byte output report followed by
//! one 64-byte input report. I2C commands share a 4-byte header:
//!
//! | Offset | Meaning                              |
//! |--------|--------------------------------------|
//! | 0      | command code                         |
//! | 1      | transfer length, low byte            |
//! | 2      | transfer length, high byte           |
//! | 3      | `(address << 1) \| direction`        |
//! | 4..64  | payload (writes) / unused (reads)    |
//!
//! Responses echo the command code at offset 0 and carry a status byte at
//! offset 1 (zero on success).

use crate::errors::{BridgeError, Result};

// ============================================================================
// Constants
// ============================================================================

/// HID report size used by the MCP2221 for both directions.
pub const PACKET_SIZE: usize = 64;

/// Bytes of command header preceding the payload.
pub const HEADER_SIZE: usize = 4;

/// Largest payload that fits in one report next to the header.
pub const MAX_CHUNK: usize = PACKET_SIZE - HEADER_SIZE;

/// Longest logical transfer the 16-bit length field can describe.
pub const MAX_TRANSFER: usize = u16::MAX as usize;

/// Sub-command at offset 2 of a Status/Set Parameters report requesting that
/// the current I2C transfer be cancelled.
pub const CANCEL_TRANSFER: u8 = 0x10;

/// Response offsets.
pub const RESPONSE_ECHO: usize = 0;
pub const RESPONSE_STATUS: usize = 1;
pub const RESPONSE_CANCEL_STATE: usize = 2;
pub const RESPONSE_DATA_COUNT: usize = 3;
pub const RESPONSE_DATA: usize = 4;

/// One HID report.
pub type Packet = [u8; PACKET_SIZE];

// ============================================================================
// Data Types
// ============================================================================

/// Commands understood by the bridge, with their fixed report codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Start, write, stop.
    WriteData,
    /// Start, write, no stop. Leaves the bus held for a repeated start.
    WriteNoStop,
    /// Start, read, stop. Data is fetched afterwards with `GetData`.
    ReadData,
    /// Repeated start, read, stop.
    ReadDataRepeatedStart,
    /// Fetch up to 60 bytes the chip has buffered from a read.
    GetData,
    /// Status query; with `CANCEL_TRANSFER` at offset 2 it cancels the
    /// transfer in progress.
    StatusSetParameters,
}

impl Command {
    pub fn code(self) -> u8 {
        match self {
            Command::WriteData => 0x90,
            Command::WriteNoStop => 0x94,
            Command::ReadData => 0x91,
            Command::ReadDataRepeatedStart => 0x93,
            Command::GetData => 0x40,
            Command::StatusSetParameters => 0x10,
        }
    }
}

/// I2C transfer direction, encoded in the low bit of the address byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

/// A 7-bit I2C node address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddress(u8);

impl NodeAddress {
    pub fn new(address: u8) -> Result<Self> {
        if address > 0x7F {
            return Err(BridgeError::InvalidAddress(address));
        }
        Ok(Self(address))
    }

    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Address byte as placed at offset 3 of a command report.
    #[inline]
    pub fn wire_byte(self, direction: Direction) -> u8 {
        (self.0 << 1) | direction as u8
    }
}

impl TryFrom<u8> for NodeAddress {
    type Error = BridgeError;

    fn try_from(address: u8) -> Result<Self> {
        NodeAddress::new(address)
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Build the header of an I2C command report. The payload area is left zeroed.
pub fn build_command(
    command: Command,
    transfer_length: usize,
    address: NodeAddress,
    direction: Direction,
) -> Result<Packet> {
    let length = u16::try_from(transfer_length).map_err(|_| BridgeError::TransferTooLong {
        length: transfer_length,
    })?;
    let [low, high] = length.to_le_bytes();

    let mut packet = [0u8; PACKET_SIZE];
    packet[0] = command.code();
    packet[1] = low;
    packet[2] = high;
    packet[3] = address.wire_byte(direction);
    Ok(packet)
}

/// The fixed report that asks the chip for buffered read data.
pub fn get_data_packet() -> Packet {
    let mut packet = [0u8; PACKET_SIZE];
    packet[0] = Command::GetData.code();
    packet
}

/// The fixed report that cancels the current I2C transfer.
pub fn cancel_packet() -> Packet {
    let mut packet = [0u8; PACKET_SIZE];
    packet[0] = Command::StatusSetParameters.code();
    packet[2] = CANCEL_TRANSFER;
    packet
}
