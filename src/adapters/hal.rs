//! Hardware adapter — bridges an `embedded-hal` I2C controller to the
//! [`Transport`] port.
//!
//! This is the only module in the crate that touches real silicon.  Any
//! HAL that implements [`embedded_hal::i2c::I2c`] plugs in; on Linux the
//! `linux` feature opens `/dev/i2c-<n>` through `linux-embedded-hal`.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use log::info;

use crate::error::LinkError;
use crate::transport::Transport;

/// Concrete transport over an `embedded-hal` I2C controller.
pub struct HalTransport<I> {
    i2c: Option<I>,
    label: String,
}

impl<I: I2c> HalTransport<I> {
    pub fn new(i2c: I, label: impl Into<String>) -> Self {
        Self {
            i2c: Some(i2c),
            label: label.into(),
        }
    }

    fn controller(&mut self) -> Result<&mut I, LinkError> {
        self.i2c.as_mut().ok_or(LinkError::Closed)
    }
}

fn hal_error<E: embedded_hal::i2c::Error>(e: E) -> LinkError {
    LinkError::Hal(e.kind())
}

impl<I: I2c + Send> Transport for HalTransport<I> {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), LinkError> {
        self.controller()?.write(address, bytes).map_err(hal_error)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), LinkError> {
        self.controller()?.read(address, buf).map_err(hal_error)
    }

    fn read_register(&mut self, address: u8, register: u8) -> Result<u8, LinkError> {
        let mut byte = [0u8; 1];
        self.controller()?
            .write_read(address, &[register], &mut byte)
            .map_err(hal_error)?;
        Ok(byte[0])
    }

    fn close(&mut self) {
        if self.i2c.take().is_some() {
            info!("{}: closed", self.label);
        }
    }
}

/// Open a Linux I2C character device (e.g. `/dev/i2c-2`).
#[cfg(feature = "linux")]
pub fn open_linux(
    bus: u8,
    path: &str,
) -> Result<HalTransport<linux_embedded_hal::I2cdev>, crate::error::BusError> {
    let dev = linux_embedded_hal::I2cdev::new(path).map_err(|e| crate::error::BusError::Open {
        bus,
        reason: format!("{path}: {e}"),
    })?;
    info!("i2c-{bus}: opened {path}");
    Ok(HalTransport::new(dev, format!("i2c-{bus}")))
}

/// Default device node for a bus index.
pub fn default_device_path(bus: u8) -> String {
    format!("/dev/i2c-{bus}")
}

/// Blocking delay backed by `std::thread::sleep`.  Used for retry
/// backoff; the calling thread cannot be woken early.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(u64::from(us)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
