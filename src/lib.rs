//! MCP2221 USB-HID to I2C bridge driver.
//!
//! The MCP2221 exposes its I2C master through 64-byte HID reports. This crate
//! turns logical I2C operations (write N bytes, read N bytes, write then read
//! with a repeated start) into the report sequences the chip expects, and
//! cancels the chip's transfer after a rejected request so the next operation
//! starts from an idle bus.
//!
//! # Layers
//!
//! 1. [`transport::HidTransport`] sends and receives single reports. The
//!    `hidapi` feature provides an implementation over hidapi.
//! 2. [`protocol`] builds command reports.
//! 3. [`transfer`] chunks writes, polls reads, and cancels transfers.
//! 4. [`Mcp2221`] ties them to one node address and applies the
//!    reset-after-failure policy.
//!
//! # Example
//! ```ignore
//! use mcp2221_rs::{BridgeConfig, Mcp2221};
//!
//! let mut sensor = Mcp2221::open(0x18, BridgeConfig::from_env())?;
//! let raw = sensor.write_and_read(&[0x05], 2)?;
//! ```

pub mod config;
mod errors;
mod link;
pub mod logging;
pub mod protocol;
mod session;
pub mod transfer;
pub mod transport;

#[cfg(feature = "python")]
mod python;

pub use config::BridgeConfig;
pub use errors::*;
pub use link::I2cLink;
pub use protocol::{Command, NodeAddress};
pub use session::Mcp2221;
pub use transfer::CancelOutcome;
pub use transport::HidTransport;
