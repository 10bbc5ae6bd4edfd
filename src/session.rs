//! MCP2221 I2C session.
//!
//! A session owns one transport and talks to one I2C node. Every call is a
//! strict request/response sequence; methods take `&mut self`, so sharing a
//! session between threads needs an external `Mutex`.
//!
//! # Error recovery
//!
//! When the chip rejects a well-formed request (nonzero status, an
//! implausible GetData count, or the optional poll ceiling), the session
//! cancels the chip's I2C transfer once and then returns the original error.
//! A failed cancel is logged and never replaces that error. Transport
//! failures and echo mismatches are returned as-is: neither the link nor the
//! framing can be trusted enough to send a cancel.

use log::{debug, warn};

use crate::config::BridgeConfig;
use crate::errors::Result;
use crate::link::I2cLink;
use crate::protocol::{Command, NodeAddress};
use crate::transfer::{cancel_transfer, read_chunked, write_chunked, CancelOutcome};
use crate::transport::HidTransport;

/// MCP2221 bridge driver bound to one I2C node.
///
/// # Example
/// ```ignore
/// let transport = mcp2221_rs::transport::open(0x04D8, 0x00DD)?;
/// let mut bridge = Mcp2221::new(transport, 0x18)?;
///
/// // MCP9808: point at the ambient temperature register, then read it
/// let raw = bridge.write_and_read(&[0x05], 2)?;
/// ```
pub struct Mcp2221<T: HidTransport> {
    transport: T,
    address: NodeAddress,
    config: BridgeConfig,
}

impl<T: HidTransport> Mcp2221<T> {
    // ------------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------------

    pub fn new(transport: T, address: u8) -> Result<Self> {
        Self::with_config(transport, address, BridgeConfig::default())
    }

    pub fn with_config(transport: T, address: u8, config: BridgeConfig) -> Result<Self> {
        let address = NodeAddress::new(address)?;
        debug!(
            "MCP2221 session for node {:#04X} (max_polls={:?})",
            address.value(),
            config.max_polls
        );
        Ok(Self {
            transport,
            address,
            config,
        })
    }

    // ------------------------------------------------------------------------
    // I2C operations
    // ------------------------------------------------------------------------

    /// Write `data` with a stop condition.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let address = self.address;
        self.recover_on_error(|t, _| write_chunked(t, address, Command::WriteData, data))
    }

    /// Read `count` bytes with a stop condition.
    pub fn read(&mut self, count: usize) -> Result<Vec<u8>> {
        let address = self.address;
        self.recover_on_error(|t, poll_limit| {
            read_chunked(t, address, Command::ReadData, count, poll_limit)
        })
    }

    /// Write `send_from` without a stop, then read `receive_count` bytes after
    /// a repeated start. The read is only issued if the write succeeded.
    pub fn write_and_read(&mut self, send_from: &[u8], receive_count: usize) -> Result<Vec<u8>> {
        let address = self.address;
        self.recover_on_error(|t, poll_limit| {
            write_chunked(t, address, Command::WriteNoStop, send_from)?;
            read_chunked(
                t,
                address,
                Command::ReadDataRepeatedStart,
                receive_count,
                poll_limit,
            )
        })
    }

    /// Cancel any I2C transfer the chip has in progress.
    pub fn reset(&mut self) -> Result<CancelOutcome> {
        cancel_transfer(&mut self.transport, self.config.settle_delay())
    }

    /// The MCP2221 always honours clock stretching.
    pub fn supports_clock_stretching(&self) -> bool {
        true
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn address(&self) -> NodeAddress {
        self.address
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    // ------------------------------------------------------------------------
    // Internal Methods
    // ------------------------------------------------------------------------

    /// Run `op`; if it fails in a way the chip can recover from, cancel the
    /// transfer once and hand back the original error.
    fn recover_on_error<R>(
        &mut self,
        op: impl FnOnce(&mut T, Option<u32>) -> Result<R>,
    ) -> Result<R> {
        match op(&mut self.transport, self.config.max_polls) {
            Err(err) if err.is_recoverable() => {
                debug!("resetting bus after: {err}");
                if let Err(reset_err) = self.reset() {
                    warn!("bus reset after \"{err}\" failed: {reset_err}");
                }
                Err(err)
            }
            other => other,
        }
    }
}

#[cfg(feature = "hidapi")]
impl Mcp2221<crate::transport::HidapiTransport> {
    /// Open the bridge identified by `config` and bind it to `address`.
    ///
    /// Fails with [`crate::BridgeError::AdapterNotFound`] when no matching
    /// device is attached.
    pub fn open(address: u8, config: BridgeConfig) -> Result<Self> {
        let transport = crate::transport::open(config.vendor_id, config.product_id)?;
        Self::with_config(transport, address, config)
    }
}

impl<T: HidTransport> I2cLink for Mcp2221<T> {
    type Error = crate::errors::BridgeError;

    fn write(&mut self, data: &[u8]) -> Result<()> {
        Mcp2221::write(self, data)
    }

    fn read(&mut self, count: usize) -> Result<Vec<u8>> {
        Mcp2221::read(self, count)
    }

    fn write_and_read(&mut self, send_from: &[u8], receive_count: usize) -> Result<Vec<u8>> {
        Mcp2221::write_and_read(self, send_from, receive_count)
    }

    fn supports_clock_stretching(&self) -> bool {
        Mcp2221::supports_clock_stretching(self)
    }
}
