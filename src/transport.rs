//! Fixed-size report exchange with the bridge.
//!
//! The protocol layer only needs "send one 64-byte report" and "receive one
//! 64-byte report, blocking". Anything that can do that (hidapi, a different
//! USB stack, a test double) implements [`HidTransport`].

use crate::errors::TransportError;
use crate::protocol::Packet;

/// Synchronous report transport.
pub trait HidTransport {
    /// Send exactly one report.
    fn send(&mut self, packet: &Packet) -> Result<(), TransportError>;

    /// Block until one full report arrives.
    fn receive(&mut self) -> Result<Packet, TransportError>;
}

impl<T: HidTransport + ?Sized> HidTransport for Box<T> {
    fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        (**self).send(packet)
    }

    fn receive(&mut self) -> Result<Packet, TransportError> {
        (**self).receive()
    }
}

impl<T: HidTransport + ?Sized> HidTransport for &mut T {
    fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        (**self).send(packet)
    }

    fn receive(&mut self) -> Result<Packet, TransportError> {
        (**self).receive()
    }
}

#[cfg(feature = "hidapi")]
pub use self::hid::{open, HidapiTransport};

#[cfg(feature = "hidapi")]
mod hid {
    use hidapi::{HidApi, HidDevice};
    use log::{debug, info};

    use super::HidTransport;
    use crate::errors::{BridgeError, TransportError};
    use crate::protocol::{Packet, PACKET_SIZE};

    /// [`HidTransport`] over a hidapi device handle.
    pub struct HidapiTransport {
        device: HidDevice,
    }

    impl HidapiTransport {
        pub fn new(device: HidDevice) -> Self {
            Self { device }
        }
    }

    impl HidTransport for HidapiTransport {
        fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
            // Report ID 0 prefix: the MCP2221 uses unnumbered reports.
            let mut report = [0u8; PACKET_SIZE + 1];
            report[1..].copy_from_slice(packet);
            let written = self.device.write(&report)?;
            // Backends differ on whether the report ID byte is counted.
            if written < PACKET_SIZE {
                return Err(TransportError::ShortWrite {
                    written,
                    expected: PACKET_SIZE,
                });
            }
            Ok(())
        }

        fn receive(&mut self) -> Result<Packet, TransportError> {
            let mut packet = [0u8; PACKET_SIZE];
            let read = self.device.read(&mut packet)?;
            if read != PACKET_SIZE {
                return Err(TransportError::ShortRead {
                    read,
                    expected: PACKET_SIZE,
                });
            }
            Ok(packet)
        }
    }

    /// Open the first bridge matching `vendor_id`/`product_id`.
    pub fn open(vendor_id: u16, product_id: u16) -> Result<HidapiTransport, BridgeError> {
        let api = HidApi::new().map_err(TransportError::from)?;
        let device = api.open(vendor_id, product_id).map_err(|e| {
            debug!("hid_open failed: {e}");
            BridgeError::AdapterNotFound {
                vendor_id,
                product_id,
            }
        })?;
        info!(
            "opened MCP2221 bridge vid={:#06X} pid={:#06X}",
            vendor_id, product_id
        );
        Ok(HidapiTransport::new(device))
    }
}
