//! Multi-report I2C transfers and bus recovery.
//!
//! A logical write is split into 60-byte chunks, one report each, and every
//! chunk is acknowledged before the next goes out. A logical read is one
//! request report followed by `GetData` polls until the requested byte count
//! has been collected. None of these functions reset the bus on failure; that
//! policy belongs to the session.

use std::iter;
use std::thread;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::errors::{BridgeError, Result};
use crate::protocol::{
    build_command, cancel_packet, get_data_packet, Command, Direction, NodeAddress, Packet,
    CANCEL_TRANSFER, HEADER_SIZE, MAX_CHUNK, RESPONSE_CANCEL_STATE, RESPONSE_DATA,
    RESPONSE_DATA_COUNT, RESPONSE_ECHO, RESPONSE_STATUS,
};
use crate::transport::HidTransport;

/// How the chip acknowledged a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// A transfer was marked for cancellation.
    Cancelled,
    /// The chip claims nothing was pending. Not trustworthy on its own, so the
    /// bus was given time to settle before returning.
    NothingPending,
}

/// Send one report and wait for its response.
fn exchange<T: HidTransport + ?Sized>(transport: &mut T, packet: &Packet) -> Result<Packet> {
    trace!("-> {:02X?}", &packet[..HEADER_SIZE]);
    transport.send(packet)?;
    let response = transport.receive()?;
    trace!("<- {:02X?}", &response[..HEADER_SIZE]);
    Ok(response)
}

fn check_echo(response: &Packet, command: Command) -> Result<()> {
    let received = response[RESPONSE_ECHO];
    if received != command.code() {
        return Err(BridgeError::ProtocolDesync {
            expected: command.code(),
            received,
        });
    }
    Ok(())
}

fn check_response(response: &Packet, command: Command) -> Result<()> {
    check_echo(response, command)?;
    let status = response[RESPONSE_STATUS];
    if status != 0 {
        return Err(BridgeError::Response {
            command: command.code(),
            status,
        });
    }
    Ok(())
}

/// Write `payload` to `address` using `command` (`WriteData` or `WriteNoStop`).
///
/// Issues `max(1, ceil(len / 60))` reports; an empty payload still sends one
/// framing report so the chip performs start/address/stop. Stops at the first
/// rejected chunk.
pub fn write_chunked<T: HidTransport + ?Sized>(
    transport: &mut T,
    address: NodeAddress,
    command: Command,
    payload: &[u8],
) -> Result<()> {
    let mut packet = build_command(command, payload.len(), address, Direction::Write)?;

    let mut chunks = payload.chunks(MAX_CHUNK);
    let first = chunks.next().unwrap_or(&[]);
    let mut written = 0usize;

    for chunk in iter::once(first).chain(chunks) {
        packet[HEADER_SIZE..].fill(0);
        packet[HEADER_SIZE..HEADER_SIZE + chunk.len()].copy_from_slice(chunk);

        let response = exchange(transport, &packet)?;
        check_response(&response, command)?;
        written += chunk.len();
    }

    debug!(
        "wrote {} bytes to {:#04X} ({:?})",
        written,
        address.value(),
        command
    );
    Ok(())
}

/// Read `count` bytes from `address` using `command` (`ReadData` or
/// `ReadDataRepeatedStart`).
///
/// After the request report, `GetData` is polled until `count` bytes have
/// been gathered. With `poll_limit = None` polling never gives up.
pub fn read_chunked<T: HidTransport + ?Sized>(
    transport: &mut T,
    address: NodeAddress,
    command: Command,
    count: usize,
    poll_limit: Option<u32>,
) -> Result<Vec<u8>> {
    let request = build_command(command, count, address, Direction::Read)?;
    let response = exchange(transport, &request)?;
    check_response(&response, command)?;

    let poll = get_data_packet();
    let mut data = Vec::with_capacity(count);
    let mut polls = 0u32;

    while data.len() < count {
        if let Some(limit) = poll_limit {
            if polls >= limit {
                return Err(BridgeError::PollLimitExceeded { polls });
            }
        }
        polls += 1;

        let response = exchange(transport, &poll)?;
        check_response(&response, Command::GetData)?;

        let reported = response[RESPONSE_DATA_COUNT];
        let available = reported as usize;
        if available > MAX_CHUNK {
            return Err(BridgeError::OperationInvalidated { reported });
        }

        let wanted = count - data.len();
        if available > wanted {
            warn!(
                "GetData returned {} bytes, only {} outstanding; dropping the excess",
                available, wanted
            );
        }
        let take = available.min(wanted);
        data.extend_from_slice(&response[RESPONSE_DATA..RESPONSE_DATA + take]);
    }

    debug!(
        "read {} bytes from {:#04X} in {} polls ({:?})",
        data.len(),
        address.value(),
        polls,
        command
    );
    Ok(data)
}

/// Cancel whatever I2C transfer the chip has in progress.
///
/// The chip echoing the cancel sub-code back is read as "nothing to cancel".
/// That acknowledgement has proven unreliable, so it is logged and the bus is
/// given `settle_delay` before returning.
pub fn cancel_transfer<T: HidTransport + ?Sized>(
    transport: &mut T,
    settle_delay: Duration,
) -> Result<CancelOutcome> {
    let response = exchange(transport, &cancel_packet())?;
    check_echo(&response, Command::StatusSetParameters)?;

    if response[RESPONSE_CANCEL_STATE] == CANCEL_TRANSFER {
        warn!("cancel acknowledged with nothing pending; waiting {settle_delay:?} for the bus");
        thread::sleep(settle_delay);
        return Ok(CancelOutcome::NothingPending);
    }

    debug!("I2C transfer cancelled");
    Ok(CancelOutcome::Cancelled)
}
