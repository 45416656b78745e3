//! Byte sources the stream reader can pull from.

use std::fmt;
use std::io::{self, Read};
use std::time::Duration;

use crate::core::config::ConnectionConfig;
use crate::error::{MonitorError, Result};

/// A transport the reader polls for raw bytes.
///
/// `read_chunk` must return within a bounded time; `Ok(0)` means the timeout
/// elapsed with no data. Any `Err` is treated as a terminal transport failure.
pub trait ByteSource: Send {
    /// Bytes that can be read without blocking.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read up to `buf.len()` bytes, waiting at most the source's timeout.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release the underlying device. Called once when the session ends.
    fn close(&mut self) {}
}

/// A serial port opened with `serialport`.
pub struct SerialSource {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
}

impl SerialSource {
    pub fn open(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let port = serialport::new(config.port.as_str(), config.baud_rate)
            .timeout(config.read_timeout)
            .open()?;

        log::info!(
            "Opened serial port {} at {} baud",
            config.port,
            config.baud_rate
        );

        Ok(Self {
            port: Some(port),
            name: config.port.clone(),
        })
    }

    fn port(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| MonitorError::transport(format!("{} is closed", self.name)))
    }
}

impl fmt::Debug for SerialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialSource")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl ByteSource for SerialSource {
    fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.port()?.bytes_to_read()? as usize)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let read = self.port()?.read(buf);
        match read {
            Ok(0) => Err(MonitorError::transport(format!(
                "{}: device disconnected",
                self.name
            ))),
            Ok(n) => Ok(n),
            Err(e) if is_timeout(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            log::info!("Closed serial port {}", self.name);
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// A serial port seen by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEntry {
    pub name: String,
    pub description: String,
}

/// Enumerate serial ports, USB adapters first.
pub fn available_ports() -> Result<Vec<PortEntry>> {
    let mut ports: Vec<PortEntry> = serialport::available_ports()?
        .into_iter()
        .map(|info| PortEntry {
            description: describe_port(&info.port_type),
            name: info.port_name,
        })
        .collect();

    ports.sort_by(|a, b| {
        let a_usb = a.description.starts_with("USB");
        let b_usb = b.description.starts_with("USB");
        b_usb.cmp(&a_usb).then_with(|| a.name.cmp(&b.name))
    });

    Ok(ports)
}

fn describe_port(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("serial adapter");
            format!("USB {:04x}:{:04x} {}", usb.vid, usb.pid, product)
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        serialport::SerialPortType::PciPort => "PCI".to_string(),
        serialport::SerialPortType::Unknown => "Unknown".to_string(),
    }
}

/// Default pause used by sources that have no native read timeout.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);
