//! Serial implementation of the printer transport.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use log::debug;
use serialport::SerialPort;

use crate::error::{CalError, CalResult};

use super::Transport;

/// Baud rate of the printer's USB-serial link.
pub const BAUD_RATE: u32 = 115_200;

/// Overall deadline for one response line.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the blocked read loop wakes to check the deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Blocking serial connection to the printer, 8-N-1 framing.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    read_timeout: Duration,
}

impl SerialTransport {
    /// Open `port_name` with the default response deadline.
    pub fn open(port_name: &str) -> CalResult<Self> {
        Self::open_with_timeout(port_name, READ_TIMEOUT)
    }

    /// Open `port_name` with a caller-supplied response deadline.
    pub fn open_with_timeout(port_name: &str, read_timeout: Duration) -> CalResult<Self> {
        let port = serialport::new(port_name, BAUD_RATE)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(POLL_INTERVAL)
            .open()?;
        debug!("Opened serial port '{port_name}' at {BAUD_RATE} baud");
        Ok(Self { port, read_timeout })
    }
}

impl Transport for SerialTransport {
    fn send_command(&mut self, command: &str) -> CalResult<()> {
        let line = format!("{command}\n");
        self.port.write_all(line.as_bytes())?;
        self.port.flush()?;
        debug!("Sent: {command}");
        Ok(())
    }

    fn read_line(&mut self) -> CalResult<String> {
        let mut response = String::new();
        let mut buffer = [0u8; 1];
        let start = Instant::now();

        loop {
            if start.elapsed() > self.read_timeout {
                return Err(CalError::Timeout(self.read_timeout));
            }

            match self.port.read(&mut buffer) {
                Ok(0) => return Err(CalError::UnexpectedEof),
                Ok(_) => {
                    let ch = buffer[0] as char;
                    if ch == '\n' {
                        break;
                    }
                    response.push(ch);
                }
                // Port timeout is the poll interval, not the deadline
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let response = response.trim_end_matches('\r').to_string();
        debug!("Received: {response}");
        Ok(response)
    }
}
