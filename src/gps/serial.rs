// src/gps/serial.rs
//! Serial port line reader with transparent reconnect

use std::{io, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    time::{sleep, timeout},
};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

/// Serial device settings
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub path: String,
    pub baud_rate: u32,
    /// A read that yields no bytes within this window counts as a device failure
    pub read_timeout: Duration,
    pub line_terminator: u8,
    /// Wait between closing a failed handle and reopening the device
    pub reconnect_delay: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            read_timeout: Duration::from_secs(2),
            line_terminator: b'\n',
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// One line of text as emitted by the device, terminator removed
pub type RawLine = String;

/// Opens the byte stream behind a [`PortReader`]
pub trait Connector {
    type Stream: AsyncRead + Unpin;

    fn connect(&mut self, config: &DeviceConfig) -> io::Result<Self::Stream>;
}

/// Connects to a real serial device
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    type Stream = SerialStream;

    fn connect(&mut self, config: &DeviceConfig) -> io::Result<SerialStream> {
        tokio_serial::new(&config.path, config.baud_rate)
            .timeout(config.read_timeout)
            .open_native_async()
            .map_err(io::Error::from)
    }
}

enum LinkState<S> {
    Disconnected,
    Connected(BufReader<S>),
}

/// Produces an endless sequence of lines from the device.
///
/// Owns the device handle exclusively. Any open or read failure drops the
/// handle, waits `reconnect_delay` and reopens the same path, so callers
/// never see device errors.
pub struct PortReader<C: Connector = SerialConnector> {
    config: DeviceConfig,
    connector: C,
    state: LinkState<C::Stream>,
    buffer: Vec<u8>,
    reconnects: u64,
}

impl PortReader<SerialConnector> {
    /// Create a reader for a serial device; nothing is opened until the first read
    pub fn open(config: DeviceConfig) -> Self {
        Self::with_connector(config, SerialConnector)
    }
}

impl<C: Connector> PortReader<C> {
    pub fn with_connector(config: DeviceConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            state: LinkState::Disconnected,
            buffer: Vec::with_capacity(128),
            reconnects: 0,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, LinkState::Connected(_))
    }

    /// Number of times the device handle was dropped after a failure
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Read the next non-empty line, reconnecting as often as needed
    pub async fn next_line(&mut self) -> RawLine {
        loop {
            if let LinkState::Disconnected = self.state {
                match self.connector.connect(&self.config) {
                    Ok(stream) => {
                        info!(
                            "Connected to GPS on {} at {} baud",
                            self.config.path, self.config.baud_rate
                        );
                        self.state = LinkState::Connected(BufReader::new(stream));
                    }
                    Err(e) => {
                        warn!("Failed to open serial port {}: {}", self.config.path, e);
                        self.backoff().await;
                        continue;
                    }
                }
            }

            match self.read_raw().await {
                Ok(()) => {
                    let line = decode_line(&self.buffer, self.config.line_terminator);
                    if !line.is_empty() {
                        return line;
                    }
                }
                Err(e) => {
                    warn!("Error reading from serial port {}: {}", self.config.path, e);
                    self.close();
                    self.reconnects += 1;
                    self.backoff().await;
                }
            }
        }
    }

    /// Release the device handle
    pub fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, LinkState::Disconnected);
        if let LinkState::Connected(_) = previous {
            debug!("Closed serial port {}", self.config.path);
        }
    }

    /// Read one terminated line into `buffer`.
    ///
    /// The timeout applies per chunk: a slow line keeps the handle open as
    /// long as some bytes arrive within every `read_timeout` window.
    async fn read_raw(&mut self) -> io::Result<()> {
        let LinkState::Connected(reader) = &mut self.state else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "serial port not open"));
        };
        let terminator = self.config.line_terminator;

        self.buffer.clear();
        loop {
            let chunk = match timeout(self.config.read_timeout, reader.fill_buf()).await {
                Err(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "no data before read timeout",
                    ))
                }
                Ok(Err(e)) => return Err(e),
                Ok(Ok([])) if self.buffer.is_empty() => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "device closed the stream",
                    ))
                }
                Ok(Ok([])) => return Ok(()),
                Ok(Ok(chunk)) => chunk,
            };

            match chunk.iter().position(|&b| b == terminator) {
                Some(end) => {
                    self.buffer.extend_from_slice(&chunk[..=end]);
                    reader.consume(end + 1);
                    return Ok(());
                }
                None => {
                    let used = chunk.len();
                    self.buffer.extend_from_slice(chunk);
                    reader.consume(used);
                }
            }
        }
    }

    async fn backoff(&self) {
        debug!("Retrying {} in {:?}", self.config.path, self.config.reconnect_delay);
        sleep(self.config.reconnect_delay).await;
    }
}

/// Names and types of the serial ports present on this machine
pub fn available_ports() -> crate::error::Result<Vec<String>> {
    let ports = tokio_serial::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| format!("{} - {:?}", port.port_name, port.port_type))
        .collect())
}

/// Decode bytes as text, replacing invalid sequences, and strip the terminator
fn decode_line(bytes: &[u8], terminator: u8) -> RawLine {
    let bytes = bytes.strip_suffix(&[terminator]).unwrap_or(bytes);
    String::from_utf8_lossy(bytes).trim().to_string()
}
