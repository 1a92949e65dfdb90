//! Collaborator seams between the node logic and the hardware/network glue

use core::fmt;

use crate::eeprom::EepromError;
use crate::led::RgbColor;
use crate::model::SensorReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    Bus,
    NotInitialized,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::Bus => f.write_str("sensor bus error"),
            SensorError::NotInitialized => f.write_str("sensor not initialized"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    Write,
    Close,
    Bind,
    Listen,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Write => f.write_str("transport write failed"),
            TransportError::Close => f.write_str("transport close failed"),
            TransportError::Bind => f.write_str("bind failed"),
            TransportError::Listen => f.write_str("listen failed"),
        }
    }
}

/// Byte-addressed persistent memory
pub trait ByteStore {
    /// Fill `buf` starting at `addr`. One bounded transfer, no partial success.
    fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), EepromError>;

    /// Store `data` starting at `addr`. Returns once the data is durable.
    fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), EepromError>;
}

/// Temperature/humidity sensor
pub trait EnvironmentSensor {
    fn init(&mut self) -> Result<(), SensorError>;

    /// Temperature in Celsius, relative humidity in percent, pressure in hPa.
    fn read(&mut self) -> Result<SensorReading, SensorError>;
}

pub trait StatusLed {
    fn set_color(&mut self, color: RgbColor);
}

/// One accepted TCP connection as seen by the HTTP state machine.
///
/// `write` only queues bytes; completion is reported back through
/// [`crate::connection::Connection::on_sent`].
pub trait Transport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Graceful close.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Hard reset. Cannot fail.
    fn abort(&mut self);
}

/// Listening endpoint owned by the server.
pub trait Listener {
    fn bind(&mut self, port: u16) -> Result<(), TransportError>;
    fn listen(&mut self, backlog: u8) -> Result<(), TransportError>;
    fn close(&mut self);
}
