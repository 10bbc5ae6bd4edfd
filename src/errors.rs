use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("protocol desync: sent command {expected:#04X}, response echoed {received:#04X}")]
    ProtocolDesync { expected: u8, received: u8 },
    #[error("command {command:#04X} rejected with status {status:#04X}")]
    Response { command: u8, status: u8 },
    #[error("read invalidated: device reported {reported} buffered bytes")]
    OperationInvalidated { reported: u8 },
    #[error("no data after {polls} GetData polls")]
    PollLimitExceeded { polls: u32 },
    #[error("transfer of {length} bytes exceeds the 65535-byte limit")]
    TransferTooLong { length: usize },
    #[error("invalid 7-bit I2C address: {0:#04X}")]
    InvalidAddress(u8),
    #[error("no bridge found with vid={vendor_id:#06X} pid={product_id:#06X}")]
    AdapterNotFound { vendor_id: u16, product_id: u16 },
}

impl BridgeError {
    /// Errors reported by a well-formed exchange; the bus can be brought back
    /// to idle with a cancel before the caller retries.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BridgeError::Response { .. }
                | BridgeError::OperationInvalidated { .. }
                | BridgeError::PollLimitExceeded { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error("short read: {read} of {expected} bytes")]
    ShortRead { read: usize, expected: usize },
    #[error("hid error: {0}")]
    Hid(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(feature = "hidapi")]
impl From<hidapi::HidError> for TransportError {
    fn from(err: hidapi::HidError) -> Self {
        TransportError::Hid(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
