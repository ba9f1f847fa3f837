//! Transport abstraction — one physical I2C bus.
//!
//! Concrete implementations:
//! - [`HalTransport`](crate::adapters::hal::HalTransport): any
//!   `embedded_hal::i2c::I2c` controller (Linux `/dev/i2c-*` under the
//!   `linux` feature)
//! - [`SimulatedBus`](crate::sim::SimulatedBus): in-memory peripherals
//!
//! [`Bus`](crate::bus::Bus) owns exactly one transport and is the only
//! caller, always under its lock, so implementations never see
//! interleaved operations.

use crate::error::LinkError;

/// Byte-level access to every device on one bus.
pub trait Transport: Send {
    /// Write `bytes` to the device at `address` in one transaction.
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), LinkError>;

    /// Fill `buf` from the device at `address`.
    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), LinkError>;

    /// Write the register address, then read one byte after a repeated
    /// start.
    fn read_register(&mut self, address: u8, register: u8) -> Result<u8, LinkError>;

    /// Write a register address followed by its value.
    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), LinkError> {
        self.write(address, &[register, value])
    }

    /// Release the underlying handle.  Later operations fail.
    fn close(&mut self) {}
}

/// Stand-in left behind by [`Bus::close`](crate::bus::Bus::close).
/// Every operation fails with [`LinkError::Closed`].
pub struct ClosedTransport;

impl Transport for ClosedTransport {
    fn write(&mut self, _address: u8, _bytes: &[u8]) -> Result<(), LinkError> {
        Err(LinkError::Closed)
    }

    fn read(&mut self, _address: u8, _buf: &mut [u8]) -> Result<(), LinkError> {
        Err(LinkError::Closed)
    }

    fn read_register(&mut self, _address: u8, _register: u8) -> Result<u8, LinkError> {
        Err(LinkError::Closed)
    }
}
