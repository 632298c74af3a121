//! Serial port channel for desktop using the serialport crate

use crate::constants::DEFAULT_BAUD_RATE;
use crate::error::Result;
use crate::transport::Channel;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::info;

/// USB CDC serial connection to a TC66/TC66C
pub struct SerialChannel {
    port: Option<Box<dyn SerialPort>>,
}

impl SerialChannel {
    /// Open `port_name` at the default 115200 8N1
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baud(port_name, DEFAULT_BAUD_RATE)
    }

    pub fn open_with_baud(port_name: &str, baud_rate: u32) -> Result<Self> {
        info!("Opening serial port {} at {} baud", port_name, baud_rate);
        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(Duration::from_secs(2))
            .open()?;
        port.clear(ClearBuffer::Input)?;

        Ok(Self { port: Some(port) })
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is closed"))
    }
}

impl Channel for SerialChannel {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let port = self.port()?;
        let n = port.write(data)?;
        port.flush()?;
        Ok(n)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port()?.read(buf) {
            // serialport reports an idle line as a timeout error
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port()?.set_timeout(timeout).map_err(io::Error::other)
    }

    fn close(&mut self) -> io::Result<()> {
        self.port.take();
        Ok(())
    }
}
