//! Modbus RTU/TCP backend for the loopback tester.
//!
//! Drives a remote digital I/O module: each port is a block of 8 coils for
//! output and 8 discrete inputs for input, line 0 at the lowest address.
//! The port-to-address table comes from the orchestrator configuration.

use loopback_hal::config::{PortAddress, PortMapping};
use loopback_hal::traits::{DigitalPortBackend, Direction, HalError, PortChannel};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio_modbus::client::{Context, Reader, Writer, rtu, tcp};
use tokio_modbus::slave::Slave;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};

const MAX_CONNECT_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 500;
const LINES_PER_PORT: u16 = 8;

/// Transport parameters, kept so the link can be reopened.
enum Link {
    Tcp {
        addr: SocketAddr,
        slave: Slave,
    },
    Rtu {
        serial_port: String,
        baud_rate: u32,
        slave: Slave,
    },
}

impl Link {
    fn open(&self, rt: &Runtime, timeout: Duration) -> Result<Context, HalError> {
        match self {
            Link::Tcp { addr, slave } => {
                let (addr, slave) = (*addr, *slave);
                let connected = rt.block_on(async {
                    tokio::time::timeout(timeout, tcp::connect_slave(addr, slave)).await
                });
                match connected {
                    Ok(Ok(ctx)) => Ok(ctx),
                    Ok(Err(e)) => Err(HalError::CommError(format!("connect to {addr}: {e}"))),
                    Err(_) => Err(HalError::Timeout),
                }
            }
            Link::Rtu {
                serial_port,
                baud_rate,
                slave,
            } => rt.block_on(async {
                let port = tokio_serial::new(serial_port.as_str(), *baud_rate)
                    .data_bits(DataBits::Eight)
                    .parity(Parity::None)
                    .stop_bits(StopBits::One)
                    .flow_control(FlowControl::None)
                    .open_native_async()
                    .map_err(|e| {
                        HalError::CommError(format!("open serial port {serial_port}: {e}"))
                    })?;
                Ok::<Context, HalError>(rtu::attach_slave(port, *slave))
            }),
        }
    }
}

pub struct ModbusBackend {
    ctx: Context,
    link: Link,
    rt: Runtime,
    device: String,
    ports: PortMapping,
    timeout: Duration,
    claims: HashMap<u8, Direction>,
    /// Set when a request timed out; its reply may still arrive on `ctx`.
    stale: bool,
}

impl ModbusBackend {
    fn from_link(
        ctx: Context,
        link: Link,
        rt: Runtime,
        device: &str,
        ports: &PortMapping,
        timeout: Duration,
    ) -> Self {
        log::info!(
            "Modbus backend for {device}: {} ports mapped, {} ms request timeout",
            ports.len(),
            timeout.as_millis()
        );
        Self {
            ctx,
            link,
            rt,
            device: device.to_string(),
            ports: ports.clone(),
            timeout,
            claims: HashMap::new(),
            stale: false,
        }
    }

    /// Connect to a Modbus TCP slave with retry logic.
    pub fn connect(
        addr: SocketAddr,
        slave_id: u8,
        device: &str,
        ports: &PortMapping,
        timeout: Duration,
    ) -> Result<Self, HalError> {
        let rt = Runtime::new().map_err(|e| HalError::CommError(e.to_string()))?;
        let link = Link::Tcp {
            addr,
            slave: Slave(slave_id),
        };

        log::info!("Connecting to Modbus TCP slave at {addr} (unit {slave_id})");

        let mut last_err = String::new();
        for attempt in 1..=MAX_CONNECT_RETRIES {
            match link.open(&rt, timeout) {
                Ok(ctx) => {
                    if attempt > 1 {
                        log::info!("Connected on attempt {attempt}");
                    }
                    return Ok(Self::from_link(ctx, link, rt, device, ports, timeout));
                }
                Err(e) => last_err = e.to_string(),
            }
            log::warn!("Connect attempt {attempt}/{MAX_CONNECT_RETRIES} failed: {last_err}");
            if attempt < MAX_CONNECT_RETRIES {
                std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
            }
        }

        Err(HalError::DeviceNotFound(format!(
            "{device}: Modbus TCP {addr} unreachable after {MAX_CONNECT_RETRIES} attempts: \
             {last_err}"
        )))
    }

    /// Connect to a Modbus RTU slave over a serial port.
    pub fn connect_rtu(
        serial_port: &str,
        baud_rate: u32,
        slave_id: u8,
        device: &str,
        ports: &PortMapping,
        timeout: Duration,
    ) -> Result<Self, HalError> {
        let rt = Runtime::new().map_err(|e| HalError::CommError(e.to_string()))?;
        let link = Link::Rtu {
            serial_port: serial_port.to_string(),
            baud_rate,
            slave: Slave(slave_id),
        };

        log::info!(
            "Connecting to Modbus RTU slave at {serial_port} (baud {baud_rate}, unit {slave_id})"
        );

        let ctx = link
            .open(&rt, timeout)
            .map_err(|e| HalError::DeviceNotFound(format!("{device}: {e}")))?;
        Ok(Self::from_link(ctx, link, rt, device, ports, timeout))
    }

    /// Reopen the link if an earlier request timed out, so its late reply
    /// cannot be taken for the answer to the next request.
    fn reconnect_if_stale(&mut self) -> Result<(), HalError> {
        if !self.stale {
            return Ok(());
        }
        self.ctx = self.link.open(&self.rt, self.timeout)?;
        self.stale = false;
        log::info!("{}: reconnected after request timeout", self.device);
        Ok(())
    }

    fn note_outcome<T>(&mut self, result: &Result<T, HalError>) {
        if matches!(result, Err(HalError::Timeout)) {
            log::warn!("{}: request timed out, link will be reopened", self.device);
            self.stale = true;
        }
    }

    fn address_for(&self, channel: &PortChannel) -> Result<PortAddress, HalError> {
        self.ports
            .get(channel.port)
            .copied()
            .ok_or_else(|| HalError::ClaimFailed {
                channel: channel.to_string(),
                reason: "port is not mapped on this module".into(),
            })
    }

    fn ensure_claimed(&self, channel: &PortChannel, direction: Direction) -> Result<(), HalError> {
        match self.claims.get(&channel.port) {
            Some(&claimed) if claimed == direction => Ok(()),
            _ => Err(HalError::CommError(format!(
                "{channel} is not claimed as {direction:?}"
            ))),
        }
    }
}

/// Run one Modbus request on the backend's runtime, bounded by `timeout`.
fn run_request<T, E, X, F>(
    rt: &Runtime,
    timeout: Duration,
    op: &str,
    request: F,
) -> Result<T, HalError>
where
    E: fmt::Display,
    X: fmt::Debug,
    F: Future<Output = Result<Result<T, X>, E>>,
{
    rt.block_on(async { tokio::time::timeout(timeout, request).await })
        .map_err(|_| HalError::Timeout)?
        .map_err(|e| HalError::CommError(format!("{op}: {e}")))?
        .map_err(|e| HalError::CommError(format!("Modbus exception: {e:?}")))
}

fn byte_to_coils(value: u8) -> Vec<bool> {
    (0..LINES_PER_PORT).map(|line| (value >> line) & 1 == 1).collect()
}

fn inputs_to_byte(bits: &[bool]) -> u8 {
    bits.iter()
        .take(LINES_PER_PORT as usize)
        .enumerate()
        .fold(0u8, |acc, (line, &on)| if on { acc | (1 << line) } else { acc })
}

impl DigitalPortBackend for ModbusBackend {
    fn name(&self) -> &str {
        "modbus"
    }

    fn claim(&mut self, channel: &PortChannel, direction: Direction) -> Result<(), HalError> {
        if channel.device != self.device {
            return Err(HalError::DeviceNotFound(channel.device.clone()));
        }
        self.address_for(channel)?;
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
        let addr = self.address_for(channel)?;
        let coils = byte_to_coils(value);
        self.reconnect_if_stale()?;
        // FC 0x0F
        let result = run_request(
            &self.rt,
            self.timeout,
            "write_multiple_coils",
            self.ctx.write_multiple_coils(addr.coil, &coils),
        );
        self.note_outcome(&result);
        result?;
        log::debug!("modbus: {channel} <- 0x{value:02X} (coils {}..)", addr.coil);
        Ok(())
    }

    fn read(&mut self, channel: &PortChannel) -> Result<u8, HalError> {
        self.ensure_claimed(channel, Direction::Input)?;
        let addr = self.address_for(channel)?;
        self.reconnect_if_stale()?;
        // FC 0x02
        let result = run_request(
            &self.rt,
            self.timeout,
            "read_discrete_inputs",
            self.ctx
                .read_discrete_inputs(addr.discrete_input, LINES_PER_PORT),
        );
        self.note_outcome(&result);
        let bits = result?;
        if bits.len() < LINES_PER_PORT as usize {
            return Err(HalError::CommError(format!(
                "short discrete input response for {channel}: {} bits",
                bits.len()
            )));
        }
        let value = inputs_to_byte(&bits);
        log::debug!(
            "modbus: {channel} -> 0x{value:02X} (inputs {}..)",
            addr.discrete_input
        );
        Ok(value)
    }
}
