//! Unified error types for the bus core.
//!
//! A single [`BusError`] enum that every layer converts into, so drivers
//! see one taxonomy no matter whether the fault came from the transport,
//! the mux, or argument validation.  Errors are plain data: nothing in
//! this module logs.  The retry loop and the callers log where they
//! catch an error.

use core::fmt;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Transport-level failures
// ---------------------------------------------------------------------------

/// Why a single transport operation failed, before any bus context is
/// attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The I2C controller reported an error.
    Hal(ErrorKind),
    /// A simulated peripheral sits behind a mux that is switched to some
    /// other channel (or was never switched at all).
    ChannelMismatch {
        mux: u8,
        expected: u8,
        actual: Option<u8>,
    },
    /// A simulated peripheral claims a channel the mux does not have.
    NoSuchChannel { mux: u8, channel: u8 },
    /// A simulated register was read before anything wrote it.
    UnsetRegister(u8),
    /// The transport has been closed.
    Closed,
}

impl LinkError {
    /// The device did not acknowledge its address.
    pub const fn no_ack() -> Self {
        Self::Hal(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))
    }

    /// Whether another attempt could succeed.
    pub const fn is_transient(self) -> bool {
        !matches!(self, Self::Closed | Self::NoSuchChannel { .. })
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hal(kind) => write!(f, "{kind}"),
            Self::ChannelMismatch {
                mux,
                expected,
                actual: Some(actual),
            } => write!(
                f,
                "mux 0x{mux:02x} is set to 0x{actual:02x}, expected 0x{expected:02x}"
            ),
            Self::ChannelMismatch {
                mux,
                expected,
                actual: None,
            } => write!(f, "mux 0x{mux:02x} was never set, expected 0x{expected:02x}"),
            Self::NoSuchChannel { mux, channel } => {
                write!(f, "mux 0x{mux:02x} has no channel {channel}")
            }
            Self::UnsetRegister(reg) => write!(f, "register 0x{reg:02x} was never written"),
            Self::Closed => write!(f, "transport closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fault classification
// ---------------------------------------------------------------------------

/// Transient fault classes.  The discriminants are bit masks so a set of
/// kinds packs into a [`FaultKinds`] byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum FaultKind {
    Read = 0b0000_0001,
    Write = 0b0000_0010,
    Mux = 0b0000_0100,
}

impl FaultKind {
    pub const ALL: [Self; 3] = [Self::Read, Self::Write, Self::Mux];

    /// Return the bitmask for this kind.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Mux => write!(f, "mux"),
        }
    }
}

/// A set of [`FaultKind`]s.  Serialised as a list of kind names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<FaultKind>", into = "Vec<FaultKind>")]
pub struct FaultKinds(u8);

impl FaultKinds {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0b0000_0111);

    pub const fn with(self, kind: FaultKind) -> Self {
        Self(self.0 | kind.mask())
    }

    pub const fn contains(self, kind: FaultKind) -> bool {
        self.0 & kind.mask() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for FaultKinds {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<Vec<FaultKind>> for FaultKinds {
    fn from(kinds: Vec<FaultKind>) -> Self {
        kinds.into_iter().fold(Self::NONE, Self::with)
    }
}

impl From<FaultKinds> for Vec<FaultKind> {
    fn from(kinds: FaultKinds) -> Self {
        FaultKind::ALL
            .into_iter()
            .filter(|k| kinds.contains(*k))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

/// A transport failure with the bus, device and register it happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub bus: u8,
    pub address: u8,
    pub register: Option<u8>,
    pub cause: LinkError,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i2c-{} 0x{:02x}", self.bus, self.address)?;
        if let Some(reg) = self.register {
            write!(f, " reg 0x{reg:02x}")?;
        }
        write!(f, ": {}", self.cause)
    }
}

/// Every fallible bus operation funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The device could not be detected when its client was constructed.
    Initialization { name: String, cause: Box<BusError> },
    /// A read (or the read half of a register access) failed.
    Read(Fault),
    /// A write failed.
    Write(Fault),
    /// Selecting the mux channel failed, or a simulated device was reached
    /// through the wrong channel.
    Mux(Fault),
    /// A register address or value does not fit in a byte.  No I/O was
    /// attempted.
    OutOfRange {
        kind: FaultKind,
        field: &'static str,
        value: u16,
    },
    /// Invalid address, channel, or configuration.
    Config(&'static str),
    /// The bus device node could not be opened.
    Open { bus: u8, reason: String },
}

impl BusError {
    /// The transient class of this error, if it has one.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::Read(_) => Some(FaultKind::Read),
            Self::Write(_) => Some(FaultKind::Write),
            Self::Mux(_) => Some(FaultKind::Mux),
            _ => None,
        }
    }

    /// The underlying fault for I/O errors.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Read(f) | Self::Write(f) | Self::Mux(f) => Some(f),
            Self::Initialization { cause, .. } => cause.fault(),
            _ => None,
        }
    }

    /// Whether another attempt could succeed.  Range, configuration and
    /// initialization errors never are.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Read(f) | Self::Write(f) | Self::Mux(f) => f.cause.is_transient(),
            _ => false,
        }
    }

    /// Wrap a transport failure according to the operation that hit it.
    /// Channel mismatches are always mux errors.
    pub(crate) fn from_link(kind: FaultKind, fault: Fault) -> Self {
        if matches!(
            fault.cause,
            LinkError::ChannelMismatch { .. } | LinkError::NoSuchChannel { .. }
        ) {
            return Self::Mux(fault);
        }
        match kind {
            FaultKind::Read => Self::Read(fault),
            FaultKind::Write => Self::Write(fault),
            FaultKind::Mux => Self::Mux(fault),
        }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialization { name, cause } => {
                write!(f, "{name}: device not detected ({cause})")
            }
            Self::Read(fault) => write!(f, "read failed on {fault}"),
            Self::Write(fault) => write!(f, "write failed on {fault}"),
            Self::Mux(fault) => write!(f, "mux error on {fault}"),
            Self::OutOfRange { kind, field, value } => {
                write!(f, "{kind}: {field} {value} is outside 0-255")
            }
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Open { bus, reason } => write!(f, "i2c-{bus}: cannot open ({reason})"),
        }
    }
}

impl std::error::Error for BusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Initialization { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, BusError>;
