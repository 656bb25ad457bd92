use std::io::{ErrorKind, Read};
use std::time::Duration;

use log::{debug, info, warn};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};

use crate::drivers::source::{ReadOutcome, Transport};
use crate::drivers::ScopeError;

const READ_BUFFER_BYTES: usize = 4096;

/// Names of the serial ports currently visible to the OS.
pub fn available_ports() -> Result<Vec<String>, ScopeError> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Serial device opened 8N1. Bytes are decoded as UTF-8; a multi-byte
/// sequence split across reads is carried into the next chunk.
pub struct SerialTransport {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
    buffer: Vec<u8>,
    carry: Vec<u8>,
}

impl SerialTransport {
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self, ScopeError> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(timeout)
            .open()?;
        // Drop whatever the device sent before we were listening.
        if let Err(e) = port.clear(ClearBuffer::Input) {
            debug!("could not flush input on {port_name}: {e}");
        }
        info!("opened {port_name} at {baud_rate} baud");
        Ok(Self {
            port_name: port_name.to_string(),
            port: Some(port),
            buffer: vec![0u8; READ_BUFFER_BYTES],
            carry: Vec::new(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn decode_bytes(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        match std::str::from_utf8(&self.carry) {
            Ok(text) => {
                let text = text.to_owned();
                self.carry.clear();
                text
            }
            Err(e) if e.error_len().is_none() => {
                // Incomplete sequence at the tail: keep it for the next read.
                let valid = e.valid_up_to();
                let tail = self.carry.split_off(valid);
                let text = String::from_utf8_lossy(&self.carry).into_owned();
                self.carry = tail;
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.carry).into_owned();
                self.carry.clear();
                text
            }
        }
    }
}

impl Transport for SerialTransport {
    fn read_chunk(&mut self) -> Result<ReadOutcome, ScopeError> {
        let Some(port) = self.port.as_mut() else {
            return Ok(ReadOutcome::Done);
        };
        let read = match port.read(&mut self.buffer) {
            Ok(0) => return Ok(ReadOutcome::Done),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                return Ok(ReadOutcome::Idle)
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(ReadOutcome::Idle),
            Err(e) => return Err(e.into()),
        };
        let bytes = self.buffer[..read].to_vec();
        Ok(ReadOutcome::Data(self.decode_bytes(&bytes)))
    }

    fn close(&mut self) -> Result<(), ScopeError> {
        if let Some(port) = self.port.take() {
            if let Err(e) = port.clear(ClearBuffer::All) {
                warn!("failed to clear {} on close: {e}", self.port_name);
            }
            drop(port);
            info!("closed {}", self.port_name);
        }
        self.carry.clear();
        Ok(())
    }

    fn describe(&self) -> String {
        self.port_name.clone()
    }
}
