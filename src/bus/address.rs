//! Device addressing: bus index, 7-bit device address, optional mux route.

use core::fmt;

use crate::error::{BusError, Result};

/// Highest valid 7-bit address.
pub const MAX_DEVICE_ADDRESS: u8 = 0x7F;
/// Channels on an 8-way mux (TCA9548A / PCA9548A).
pub const MUX_CHANNELS: u8 = 8;

/// A mux address plus the channel a device hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MuxRoute {
    address: u8,
    channel: u8,
}

impl MuxRoute {
    pub fn new(address: u8, channel: u8) -> Result<Self> {
        if address > MAX_DEVICE_ADDRESS {
            return Err(BusError::Config("mux address must be 0x00-0x7f"));
        }
        if channel >= MUX_CHANNELS {
            return Err(BusError::Config("mux channel must be 0-7"));
        }
        Ok(Self { address, channel })
    }

    pub const fn address(self) -> u8 {
        self.address
    }

    pub const fn channel(self) -> u8 {
        self.channel
    }

    /// One-hot channel-select byte written to the mux.
    pub const fn channel_byte(self) -> u8 {
        1 << self.channel
    }
}

impl fmt::Display for MuxRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}:{}", self.address, self.channel)
    }
}

/// Where a device lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusAddress {
    bus: u8,
    device: u8,
    mux: Option<MuxRoute>,
}

impl BusAddress {
    /// Build from the loose fields found in configuration.  Mux address and
    /// channel must both be present or both absent.
    pub fn new(
        bus: u8,
        device: u8,
        mux_address: Option<u8>,
        mux_channel: Option<u8>,
    ) -> Result<Self> {
        if device > MAX_DEVICE_ADDRESS {
            return Err(BusError::Config("device address must be 0x00-0x7f"));
        }
        let mux = match (mux_address, mux_channel) {
            (None, None) => None,
            (Some(address), Some(channel)) => Some(MuxRoute::new(address, channel)?),
            (None, Some(_)) => {
                return Err(BusError::Config("mux channel given without mux address"));
            }
            (Some(_), None) => {
                return Err(BusError::Config("mux address given without mux channel"));
            }
        };
        if mux.is_some_and(|m| m.address == device) {
            return Err(BusError::Config("device address collides with its mux address"));
        }
        Ok(Self { bus, device, mux })
    }

    pub fn direct(bus: u8, device: u8) -> Result<Self> {
        Self::new(bus, device, None, None)
    }

    pub fn behind_mux(bus: u8, device: u8, mux_address: u8, channel: u8) -> Result<Self> {
        Self::new(bus, device, Some(mux_address), Some(channel))
    }

    pub const fn bus(&self) -> u8 {
        self.bus
    }

    pub const fn device(&self) -> u8 {
        self.device
    }

    pub const fn mux(&self) -> Option<MuxRoute> {
        self.mux
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i2c-{} 0x{:02x}", self.bus, self.device)?;
        if let Some(mux) = self.mux {
            write!(f, " via mux {mux}")?;
        }
        Ok(())
    }
}
