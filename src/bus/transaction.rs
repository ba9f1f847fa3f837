//! The four bus transactions and their replies.

use log::debug;

use crate::error::{BusError, Fault, FaultKind, Result};
use crate::transport::Transport;
use crate::utils::hex;

/// One request to a device.  Register fields are wider than a byte so that
/// out-of-range values coming from driver arithmetic are caught here rather
/// than silently truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transaction<'a> {
    Write(&'a [u8]),
    Read(usize),
    ReadRegister(u16),
    WriteRegister(u16, u16),
}

/// What a [`Transaction`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Written,
    Bytes(Vec<u8>),
    Byte(u8),
}

impl Reply {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Written => Vec::new(),
            Self::Bytes(bytes) => bytes,
            Self::Byte(b) => vec![b],
        }
    }

    pub fn byte(&self) -> Option<u8> {
        match self {
            Self::Byte(b) => Some(*b),
            Self::Bytes(bytes) => bytes.first().copied(),
            Self::Written => None,
        }
    }
}

/// A range-checked transaction, ready for the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op<'a> {
    Write(&'a [u8]),
    Read(usize),
    ReadRegister(u8),
    WriteRegister(u8, u8),
}

fn byte(kind: FaultKind, field: &'static str, value: u16) -> Result<u8> {
    u8::try_from(value).map_err(|_| BusError::OutOfRange { kind, field, value })
}

impl<'a> Transaction<'a> {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Write(_) | Self::WriteRegister(..) => FaultKind::Write,
            Self::Read(_) | Self::ReadRegister(_) => FaultKind::Read,
        }
    }

    /// Range-check register addresses and values.  Never touches the bus.
    pub(crate) fn checked(&self) -> Result<Op<'a>> {
        Ok(match *self {
            Self::Write(bytes) => Op::Write(bytes),
            Self::Read(n) => Op::Read(n),
            Self::ReadRegister(reg) => Op::ReadRegister(byte(FaultKind::Read, "register", reg)?),
            Self::WriteRegister(reg, value) => Op::WriteRegister(
                byte(FaultKind::Write, "register", reg)?,
                byte(FaultKind::Write, "value", value)?,
            ),
        })
    }
}

impl Op<'_> {
    fn kind(&self) -> FaultKind {
        match self {
            Self::Write(_) | Self::WriteRegister(..) => FaultKind::Write,
            Self::Read(_) | Self::ReadRegister(_) => FaultKind::Read,
        }
    }

    fn register(&self) -> Option<u8> {
        match self {
            Self::ReadRegister(reg) | Self::WriteRegister(reg, _) => Some(*reg),
            _ => None,
        }
    }

    /// Put the operation on the wire.  Caller holds the bus lock.
    pub(crate) fn apply(
        self,
        transport: &mut dyn Transport,
        bus: u8,
        address: u8,
    ) -> Result<Reply> {
        let result = match self {
            Self::Write(bytes) => {
                debug!("i2c-{bus} 0x{address:02x} <- write {}", hex(bytes));
                transport.write(address, bytes).map(|()| Reply::Written)
            }
            Self::Read(n) => {
                let mut buf = vec![0u8; n];
                transport.read(address, &mut buf).map(|()| {
                    debug!("i2c-{bus} 0x{address:02x} -> read {}", hex(&buf));
                    Reply::Bytes(buf)
                })
            }
            Self::ReadRegister(reg) => transport.read_register(address, reg).map(|value| {
                debug!("i2c-{bus} 0x{address:02x} reg 0x{reg:02x} -> 0x{value:02x}");
                Reply::Byte(value)
            }),
            Self::WriteRegister(reg, value) => {
                debug!("i2c-{bus} 0x{address:02x} reg 0x{reg:02x} <- 0x{value:02x}");
                transport
                    .write_register(address, reg, value)
                    .map(|()| Reply::Written)
            }
        };

        result.map_err(|cause| {
            BusError::from_link(
                self.kind(),
                Fault {
                    bus,
                    address,
                    register: self.register(),
                    cause,
                },
            )
        })
    }
}
