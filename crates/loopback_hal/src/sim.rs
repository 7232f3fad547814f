use crate::traits::{DigitalPortBackend, Direction, HalError, PortChannel};
use serde::Deserialize;
use std::collections::HashMap;

pub const FIRST_PORT: u8 = 1;
pub const LAST_PORT: u8 = 4;

/// Standard loopback harness: port 1 <-> port 3, port 2 <-> port 4.
pub const DEFAULT_WIRING: [(u8, u8); 2] = [(1, 3), (2, 4)];

/// Faults the simulated board can be told to exhibit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimFault {
    /// Lines in `mask` always read low on `port`.
    StuckLow { port: u8, mask: u8 },
    /// Lines in `mask` always read high on `port`.
    StuckHigh { port: u8, mask: u8 },
    /// `port` reads `actual` while its peer drives `expected`.
    Substitute { port: u8, expected: u8, actual: u8 },
    /// Writing `value` to `port` fails.
    WriteError { port: u8, value: u8 },
    /// Reading `port` fails while its peer drives `value`.
    ReadError { port: u8, value: u8 },
}

/// In-memory board with four byte-wide ports and a loopback wiring table.
///
/// Output latches survive the release of a port. An unwired port, or one
/// whose peer was never driven, reads `0x00`.
pub struct SimBackend {
    device: String,
    wiring: HashMap<u8, u8>,
    latches: HashMap<u8, u8>,
    claims: HashMap<u8, Direction>,
    faults: Vec<SimFault>,
}

impl SimBackend {
    pub fn new(device: impl Into<String>) -> Self {
        Self::with_wiring(device, &DEFAULT_WIRING)
    }

    pub fn with_wiring(device: impl Into<String>, pairs: &[(u8, u8)]) -> Self {
        let mut sim = Self {
            device: device.into(),
            wiring: HashMap::new(),
            latches: HashMap::new(),
            claims: HashMap::new(),
            faults: Vec::new(),
        };
        for &(a, b) in pairs {
            sim.wire(a, b);
        }
        sim
    }

    pub fn wire(&mut self, a: u8, b: u8) {
        self.wiring.insert(a, b);
        self.wiring.insert(b, a);
    }

    pub fn inject(&mut self, fault: SimFault) {
        self.faults.push(fault);
    }

    pub fn latch(&self, port: u8) -> Option<u8> {
        self.latches.get(&port).copied()
    }

    pub fn is_claimed(&self, port: u8) -> bool {
        self.claims.contains_key(&port)
    }

    fn ensure_claimed(&self, channel: &PortChannel, direction: Direction) -> Result<(), HalError> {
        match self.claims.get(&channel.port) {
            Some(&claimed) if claimed == direction => Ok(()),
            Some(claimed) => Err(HalError::CommError(format!(
                "{channel} is claimed as {claimed:?}, not {direction:?}"
            ))),
            None => Err(HalError::CommError(format!("{channel} is not claimed"))),
        }
    }

    fn driven_value(&self, port: u8) -> u8 {
        self.wiring
            .get(&port)
            .and_then(|peer| self.latches.get(peer))
            .copied()
            .unwrap_or(0x00)
    }
}

impl DigitalPortBackend for SimBackend {
    fn name(&self) -> &str {
        "sim"
    }

    fn claim(&mut self, channel: &PortChannel, direction: Direction) -> Result<(), HalError> {
        if channel.device != self.device {
            return Err(HalError::DeviceNotFound(channel.device.clone()));
        }
        if !(FIRST_PORT..=LAST_PORT).contains(&channel.port) {
            return Err(HalError::ClaimFailed {
                channel: channel.to_string(),
                reason: "no such port".into(),
            });
        }
        if self.claims.contains_key(&channel.port) {
            return Err(HalError::ClaimFailed {
                channel: channel.to_string(),
                reason: "port is already reserved".into(),
            });
        }
        self.claims.insert(channel.port, direction);
        Ok(())
    }

    fn release(&mut self, channel: &PortChannel) {
        self.claims.remove(&channel.port);
    }

    fn write(&mut self, channel: &PortChannel, value: u8) -> Result<(), HalError> {
        self.ensure_claimed(channel, Direction::Output)?;
        let port = channel.port;
        let faulted = self.faults.iter().any(|fault| {
            matches!(fault, SimFault::WriteError { port: p, value: v } if *p == port && *v == value)
        });
        if faulted {
            return Err(HalError::Rejected {
                channel: channel.to_string(),
                value,
                reason: "injected write fault".into(),
            });
        }
        self.latches.insert(port, value);
        log::debug!("sim: {channel} <- 0x{value:02X}");
        Ok(())
    }

    fn read(&mut self, channel: &PortChannel) -> Result<u8, HalError> {
        self.ensure_claimed(channel, Direction::Input)?;
        let port = channel.port;
        let driven = self.driven_value(port);
        let mut observed = driven;
        for fault in &self.faults {
            match *fault {
                SimFault::ReadError { port: p, value } if p == port && value == driven => {
                    return Err(HalError::CommError(format!(
                        "injected read fault on {channel}"
                    )));
                }
                SimFault::Substitute {
                    port: p,
                    expected,
                    actual,
                } if p == port && expected == driven => observed = actual,
                _ => {}
            }
        }
        for fault in &self.faults {
            match *fault {
                SimFault::StuckLow { port: p, mask } if p == port => observed &= !mask,
                SimFault::StuckHigh { port: p, mask } if p == port => observed |= mask,
                _ => {}
            }
        }
        log::debug!("sim: {channel} -> 0x{observed:02X}");
        Ok(observed)
    }
}
