//! devicebus — serialized, mux-aware, retrying I2C bus core.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  driver ──▶ Client ──▶ retry ──▶ Arc<Bus> (lock)              │
//! │                                    │                          │
//! │                        mux select ─┴─ transaction             │
//! │                                    │                          │
//! │  ─────────────────── Transport trait ──────────────────────   │
//! │                                    │                          │
//! │        HalTransport (embedded-hal)   SimulatedBus (memory)    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Drivers report outcomes to a [`health::Health`] tracker and shut the
//! entity down when it turns unhealthy.

#![deny(unused_must_use)]

pub mod adapters;
pub mod bus;
pub mod config;
pub mod error;
pub mod health;
pub mod retry;
pub mod sim;
pub mod transport;
pub mod utils;

pub use bus::address::BusAddress;
pub use bus::{Backend, Bus, BusSet, Client, MuxRoute, Transaction};
pub use error::{BusError, FaultKind, FaultKinds, LinkError, Result};
pub use health::{Health, SharedHealth};
pub use retry::RetryPolicy;
pub use transport::Transport;
