use loopback_hal::task::PortTask;
use loopback_hal::traits::{DigitalPortBackend, HalError, PortChannel};
use std::thread;
use std::time::Duration;

/// Delay for the lines to stabilize after a write and before a read.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(1);

/// Claim `port` as an 8-line output, drive `value`, hold for `settle`, release.
pub fn write_port<B: DigitalPortBackend + ?Sized>(
    backend: &mut B,
    device: &str,
    port: u8,
    value: u8,
    settle: Duration,
) -> Result<(), HalError> {
    let mut task = PortTask::output(backend, PortChannel::new(device, port))?;
    task.write(value)?;
    thread::sleep(settle);
    Ok(())
}

/// Claim `port` as an 8-line input, wait `settle`, sample it, release.
pub fn read_port<B: DigitalPortBackend + ?Sized>(
    backend: &mut B,
    device: &str,
    port: u8,
    settle: Duration,
) -> Result<u8, HalError> {
    let mut task = PortTask::input(backend, PortChannel::new(device, port))?;
    thread::sleep(settle);
    task.read()
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopback_hal::sim::{SimBackend, SimFault};
    use std::time::Instant;

    #[test]
    fn written_byte_is_read_on_peer() {
        let mut sim = SimBackend::new("Dev1");
        write_port(&mut sim, "Dev1", 2, 0x33, Duration::ZERO).unwrap();
        assert_eq!(read_port(&mut sim, "Dev1", 4, Duration::ZERO).unwrap(), 0x33);
        assert!(!sim.is_claimed(2));
        assert!(!sim.is_claimed(4));
    }

    #[test]
    fn port_is_released_after_failed_read() {
        let mut sim = SimBackend::new("Dev1");
        sim.inject(SimFault::ReadError { port: 3, value: 0x00 });
        assert!(read_port(&mut sim, "Dev1", 3, Duration::ZERO).is_err());
        assert!(!sim.is_claimed(3));
    }

    #[test]
    fn write_waits_for_settle_time() {
        let mut sim = SimBackend::new("Dev1");
        let started = Instant::now();
        write_port(&mut sim, "Dev1", 1, 0xFF, DEFAULT_SETTLE).unwrap();
        assert!(started.elapsed() >= DEFAULT_SETTLE);
    }

    #[test]
    fn wrong_device_fails_to_claim() {
        let mut sim = SimBackend::new("Dev1");
        let err = write_port(&mut sim, "Dev2", 1, 0xFF, Duration::ZERO).unwrap_err();
        assert!(matches!(err, HalError::DeviceNotFound(_)));
    }
}
