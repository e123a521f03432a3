//! # OS Serial Transport
//!
//! Physical ports through the `serialport` crate, 8N1 at the configured baud
//! rate. Reads block for at most the configured timeout so the reader can
//! notice cancellation.

use std::time::Duration;

use crate::configs::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS};
use crate::ports::transport::{ByteStream, PortInfo, SerialTransport, TransportError};

/// # OS Serial Transport
#[derive(Debug, Clone)]
pub struct OsSerialTransport {
    baud_rate: u32,
    read_timeout: Duration,
}

impl Default for OsSerialTransport {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE, Duration::from_millis(DEFAULT_READ_TIMEOUT_MS))
    }
}

impl OsSerialTransport {
    /// Creates a transport opening ports at `baud_rate`.
    pub fn new(baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            baud_rate,
            read_timeout,
        }
    }
}

fn describe(info: &serialport::SerialPortInfo) -> String {
    match &info.port_type {
        serialport::SerialPortType::UsbPort(usb) => match (&usb.manufacturer, &usb.product) {
            (Some(manufacturer), Some(product)) => format!("{} ({manufacturer} {product})", info.port_name),
            (_, Some(product)) => format!("{} ({product})", info.port_name),
            _ => format!("{} (USB {:04x}:{:04x})", info.port_name, usb.vid, usb.pid),
        },
        serialport::SerialPortType::BluetoothPort => format!("{} (Bluetooth)", info.port_name),
        serialport::SerialPortType::PciPort => format!("{} (PCI)", info.port_name),
        serialport::SerialPortType::Unknown => info.port_name.clone(),
    }
}

impl SerialTransport for OsSerialTransport {
    fn enumerate(&self) -> Result<Vec<PortInfo>, TransportError> {
        let ports = serialport::available_ports()
            .map_err(|e| TransportError::Enumeration(e.to_string()))?;
        Ok(ports
            .iter()
            .map(|info| PortInfo::new(info.port_name.clone(), describe(info)))
            .collect())
    }

    fn open(&self, port_id: &str) -> Result<ByteStream, TransportError> {
        let port = serialport::new(port_id, self.baud_rate)
            .timeout(self.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => TransportError::NotFound,
                _ => TransportError::Refused(e.to_string()),
            })?;
        log::info!("Serial port {} opened at {} baud", port_id, self.baud_rate);
        Ok(Box::new(port))
    }
}
