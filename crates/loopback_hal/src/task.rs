use crate::traits::{DigitalPortBackend, Direction, HalError, PortChannel};

/// A claimed port. The claim is released when the task is dropped, including
/// when a write or read on it failed.
pub struct PortTask<'a, B: DigitalPortBackend + ?Sized> {
    backend: &'a mut B,
    channel: PortChannel,
    direction: Direction,
}

impl<'a, B: DigitalPortBackend + ?Sized> PortTask<'a, B> {
    pub fn output(backend: &'a mut B, channel: PortChannel) -> Result<Self, HalError> {
        Self::open(backend, channel, Direction::Output)
    }

    pub fn input(backend: &'a mut B, channel: PortChannel) -> Result<Self, HalError> {
        Self::open(backend, channel, Direction::Input)
    }

    fn open(
        backend: &'a mut B,
        channel: PortChannel,
        direction: Direction,
    ) -> Result<Self, HalError> {
        backend.claim(&channel, direction)?;
        log::debug!("{}: claimed {channel} as {direction:?}", backend.name());
        Ok(Self {
            backend,
            channel,
            direction,
        })
    }

    pub fn write(&mut self, value: u8) -> Result<(), HalError> {
        if self.direction != Direction::Output {
            return Err(HalError::Rejected {
                channel: self.channel.to_string(),
                value,
                reason: "channel is claimed as input".into(),
            });
        }
        self.backend.write(&self.channel, value)
    }

    pub fn read(&mut self) -> Result<u8, HalError> {
        if self.direction != Direction::Input {
            return Err(HalError::CommError(format!(
                "{} is claimed as output",
                self.channel
            )));
        }
        self.backend.read(&self.channel)
    }
}

impl<B: DigitalPortBackend + ?Sized> Drop for PortTask<'_, B> {
    fn drop(&mut self) {
        self.backend.release(&self.channel);
        log::debug!("{}: released {}", self.backend.name(), self.channel);
    }
}
