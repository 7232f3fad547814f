use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HalError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("cannot claim {channel}: {reason}")]
    ClaimFailed { channel: String, reason: String },
    #[error("driver rejected 0x{value:02X} on {channel}: {reason}")]
    Rejected {
        channel: String,
        value: u8,
        reason: String,
    },
    #[error("communication error: {0}")]
    CommError(String),
    #[error("timeout")]
    Timeout,
}

/// Line direction a port is claimed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Output,
    Input,
}

/// One 8-line port on a device, addressed as `<device>/port<N>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortChannel {
    pub device: String,
    pub port: u8,
}

impl PortChannel {
    pub fn new(device: impl Into<String>, port: u8) -> Self {
        Self {
            device: device.into(),
            port,
        }
    }
}

impl fmt::Display for PortChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/port{}", self.device, self.port)
    }
}

pub trait DigitalPortBackend: Send {
    /// Human-readable backend name, used in log lines.
    fn name(&self) -> &str;

    /// Reserve all lines of `channel` for `direction`.
    fn claim(&mut self, channel: &PortChannel, direction: Direction) -> Result<(), HalError>;

    /// Drop a reservation made by [`claim`](Self::claim). Releasing an
    /// unclaimed channel is a no-op.
    fn release(&mut self, channel: &PortChannel);

    fn write(&mut self, channel: &PortChannel, value: u8) -> Result<(), HalError>;

    fn read(&mut self, channel: &PortChannel) -> Result<u8, HalError>;
}

impl DigitalPortBackend for Box<dyn DigitalPortBackend> {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn claim(&mut self, channel: &PortChannel, direction: Direction) -> Result<(), HalError> {
        (**self).claim(channel, direction)
    }
    fn release(&mut self, channel: &PortChannel) {
        (**self).release(channel)
    }
    fn write(&mut self, channel: &PortChannel, value: u8) -> Result<(), HalError> {
        (**self).write(channel, value)
    }
    fn read(&mut self, channel: &PortChannel) -> Result<u8, HalError> {
        (**self).read(channel)
    }
}
