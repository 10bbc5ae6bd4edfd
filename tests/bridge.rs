//! End-to-end tests against an emulated MCP2221.

use std::collections::{HashMap, VecDeque};

use mcp2221_rs::protocol::{Packet, PACKET_SIZE};
use mcp2221_rs::{
    BridgeConfig, BridgeError, CancelOutcome, HidTransport, I2cLink, Mcp2221, TransportError,
};

/// Minimal MCP2221 model: nodes answer reads with bytes from a generator,
/// writes are recorded, and a missing node NACKs and leaves the engine hung
/// until cancelled.
struct EmulatedBridge {
    nodes: HashMap<u8, Vec<u8>>,
    writes: Vec<(u8, Vec<u8>)>,
    pending_write: Option<(u8, usize, Vec<u8>)>,
    read_buffer: VecDeque<u8>,
    /// Most bytes handed out per GetData.
    chunk: usize,
    /// Empty GetData answers before data becomes available.
    latency_polls: usize,
    hung: bool,
    sent: Vec<Packet>,
    response: Option<Packet>,
    cancels: usize,
}

impl EmulatedBridge {
    fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            writes: Vec::new(),
            pending_write: None,
            read_buffer: VecDeque::new(),
            chunk: 60,
            latency_polls: 0,
            hung: false,
            sent: Vec::new(),
            response: None,
            cancels: 0,
        }
    }

    fn with_node(mut self, address: u8, data: Vec<u8>) -> Self {
        self.nodes.insert(address, data);
        self
    }

    fn codes(&self) -> Vec<u8> {
        self.sent.iter().map(|p| p[0]).collect()
    }

    fn handle(&mut self, p: &Packet) -> Packet {
        let mut r = [0u8; PACKET_SIZE];
        r[0] = p[0];
        let length = u16::from_le_bytes([p[1], p[2]]) as usize;
        let address = p[3] >> 1;

        match p[0] {
            0x90 | 0x94 => {
                if self.hung || !self.nodes.contains_key(&address) {
                    self.hung = true;
                    r[1] = 0x01;
                    return r;
                }
                let (_, total, mut data) = self
                    .pending_write
                    .take()
                    .unwrap_or((address, length, Vec::new()));
                let n = (total - data.len()).min(60);
                data.extend_from_slice(&p[4..4 + n]);
                if data.len() == total {
                    self.writes.push((address, data));
                } else {
                    self.pending_write = Some((address, total, data));
                }
            }
            0x91 | 0x93 => {
                if self.hung || !self.nodes.contains_key(&address) {
                    self.hung = true;
                    r[1] = 0x01;
                    return r;
                }
                let source = &self.nodes[&address];
                self.read_buffer = source.iter().copied().cycle().take(length).collect();
            }
            0x40 => {
                if self.latency_polls > 0 {
                    self.latency_polls -= 1;
                    return r;
                }
                let n = self.read_buffer.len().min(self.chunk);
                r[3] = n as u8;
                for (i, b) in self.read_buffer.drain(..n).enumerate() {
                    r[4 + i] = b;
                }
            }
            0x10 => {
                if p[2] == 0x10 {
                    self.cancels += 1;
                    r[2] = if self.hung { 0x00 } else { 0x10 };
                    self.hung = false;
                    self.pending_write = None;
                    self.read_buffer.clear();
                }
            }
            other => panic!("unexpected command {other:#04X}"),
        }
        r
    }
}

impl HidTransport for EmulatedBridge {
    fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        self.sent.push(*packet);
        self.response = Some(self.handle(packet));
        Ok(())
    }

    fn receive(&mut self) -> Result<Packet, TransportError> {
        self.response.take().ok_or(TransportError::ShortRead {
            read: 0,
            expected: PACKET_SIZE,
        })
    }
}

fn quick() -> BridgeConfig {
    BridgeConfig {
        settle_delay_ms: 0,
        ..BridgeConfig::default()
    }
}

#[test]
fn write_two_bytes_to_temperature_sensor() {
    let mut chip = EmulatedBridge::new().with_node(0x18, vec![0]);
    let mut sensor = Mcp2221::with_config(&mut chip, 0x18, quick()).unwrap();

    sensor.write(&[0x01, 0x02]).unwrap();
    drop(sensor);

    assert_eq!(chip.sent.len(), 1);
    let mut expected = [0u8; PACKET_SIZE];
    expected[..6].copy_from_slice(&[0x90, 0x02, 0x00, 0x30, 0x01, 0x02]);
    assert_eq!(chip.sent[0], expected);
    assert_eq!(chip.writes, vec![(0x18, vec![0x01, 0x02])]);
}

#[test]
fn read_61_bytes_needs_two_polls() {
    let pattern: Vec<u8> = (0..=255).collect();
    let mut chip = EmulatedBridge::new().with_node(0x40, pattern.clone());
    let mut node = Mcp2221::with_config(&mut chip, 0x40, quick()).unwrap();

    let data = node.read(61).unwrap();
    drop(node);

    assert_eq!(data, pattern[..61].to_vec());
    assert_eq!(&chip.sent[0][..4], &[0x91, 61, 0x00, 0x81]);
    let polls = chip.codes().iter().filter(|&&c| c == 0x40).count();
    assert!(polls >= 2, "only {polls} GetData polls");
}

#[test]
fn read_length_is_exact_for_any_poll_pattern() {
    for (count, chunk, latency) in [(1, 60, 0), (60, 60, 3), (100, 7, 1), (250, 33, 0)] {
        let pattern: Vec<u8> = (1..=200).collect();
        let mut chip = EmulatedBridge::new().with_node(0x50, pattern.clone());
        chip.chunk = chunk;
        chip.latency_polls = latency;
        let mut eeprom = Mcp2221::with_config(&mut chip, 0x50, quick()).unwrap();

        let data = eeprom.read(count).unwrap();

        let expected: Vec<u8> = pattern.iter().copied().cycle().take(count).collect();
        assert_eq!(data, expected, "count={count} chunk={chunk}");
    }
}

#[test]
fn long_write_is_reassembled_by_the_chip() {
    let payload: Vec<u8> = (0..200u16).map(|i| (i * 7) as u8).collect();
    let mut chip = EmulatedBridge::new().with_node(0x50, vec![0]);
    let mut eeprom = Mcp2221::with_config(&mut chip, 0x50, quick()).unwrap();

    eeprom.write(&payload).unwrap();
    drop(eeprom);

    assert_eq!(chip.codes(), vec![0x90; 4]);
    assert_eq!(chip.writes, vec![(0x50, payload)]);
}

#[test]
fn register_read_with_repeated_start() {
    let mut chip = EmulatedBridge::new().with_node(0x18, vec![0xC1, 0x90]);
    let mut sensor = Mcp2221::with_config(&mut chip, 0x18, quick()).unwrap();

    let raw = sensor.write_and_read(&[0x05], 2).unwrap();
    drop(sensor);

    assert_eq!(raw, vec![0xC1, 0x90]);
    assert_eq!(chip.codes(), vec![0x94, 0x93, 0x40]);
    assert_eq!(chip.writes, vec![(0x18, vec![0x05])]);
}

#[test]
fn missing_node_is_reset_and_bus_recovers() {
    let mut chip = EmulatedBridge::new().with_node(0x18, vec![0xAB]);

    {
        let mut ghost = Mcp2221::with_config(&mut chip, 0x22, quick()).unwrap();
        let err = ghost.write_and_read(&[0x00], 1).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Response {
                command: 0x94,
                status: 0x01
            }
        ));
    }
    assert_eq!(chip.codes(), vec![0x94, 0x10]);
    assert_eq!(chip.cancels, 1);
    assert!(!chip.hung);

    let mut sensor = Mcp2221::with_config(&mut chip, 0x18, quick()).unwrap();
    assert_eq!(sensor.read(1).unwrap(), vec![0xAB]);
}

#[test]
fn reset_on_idle_bus_reports_nothing_pending() {
    let mut chip = EmulatedBridge::new();
    let mut bridge = Mcp2221::with_config(&mut chip, 0x18, quick()).unwrap();

    assert_eq!(bridge.reset().unwrap(), CancelOutcome::NothingPending);
}

#[test]
fn desynced_write_is_not_reset() {
    struct Stale;
    impl HidTransport for Stale {
        fn send(&mut self, _: &Packet) -> Result<(), TransportError> {
            Ok(())
        }
        fn receive(&mut self) -> Result<Packet, TransportError> {
            let mut p = [0u8; PACKET_SIZE];
            p[0] = 0x40;
            Ok(p)
        }
    }

    let mut link = Mcp2221::with_config(Stale, 0x18, quick()).unwrap();
    assert!(matches!(
        link.write(&[1]),
        Err(BridgeError::ProtocolDesync {
            expected: 0x90,
            received: 0x40
        })
    ));
}

fn read_register<L: I2cLink>(link: &mut L, register: u8) -> Result<u16, L::Error> {
    let raw = link.write_and_read(&[register], 2)?;
    Ok(u16::from_be_bytes([raw[0], raw[1]]))
}

#[test]
fn usable_through_generic_link() {
    let mut chip = EmulatedBridge::new().with_node(0x18, vec![0x00, 0x54]);
    let mut sensor = Mcp2221::with_config(&mut chip, 0x18, quick()).unwrap();

    assert!(I2cLink::supports_clock_stretching(&sensor));
    assert_eq!(read_register(&mut sensor, 0x07).unwrap(), 0x0054);
}
