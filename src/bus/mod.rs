//! Shared bus: one transport and its mux state behind a single lock.
//!
//! ```text
//!   Client ─┐
//!   Client ─┼──▶ Arc<Bus> ──▶ Mutex { transport, mux state } ──▶ wire
//!   Client ─┘
//! ```
//!
//! Every client on a physical bus holds the same `Arc<Bus>`.  Each attempt
//! of each transaction takes the lock exactly once and keeps it across the
//! mux select *and* the transaction, so no other client can re-point the
//! mux in between.  Retry sleeps happen outside the lock.

pub mod address;
pub mod client;
pub mod mux;
pub mod set;
pub mod transaction;

use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, info};

use crate::error::Result;
use crate::transport::{ClosedTransport, Transport};
use address::BusAddress;
use mux::MuxState;
use transaction::{Op, Reply};

pub use address::MuxRoute;
pub use client::Client;
pub use set::{Backend, BusSet};
pub use transaction::Transaction;

struct BusInner {
    transport: Box<dyn Transport>,
    mux: MuxState,
    clients: Vec<String>,
}

/// One physical I2C bus shared by every client on it.
pub struct Bus {
    index: u8,
    inner: Mutex<BusInner>,
}

impl Bus {
    pub fn new(index: u8, transport: Box<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            index,
            inner: Mutex::new(BusInner {
                transport,
                mux: MuxState::new(),
                clients: Vec::new(),
            }),
        })
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// Select the mux channel (if routed) and run `op`, as one critical
    /// section.
    pub(crate) fn transact(&self, address: &BusAddress, op: Op<'_>) -> Result<Reply> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if let Some(route) = address.mux() {
            mux::select(inner.transport.as_mut(), &mut inner.mux, self.index, route)?;
        }
        op.apply(inner.transport.as_mut(), self.index, address.device())
    }

    /// Snapshot of the channel bytes last written to each mux.
    pub fn mux_state(&self) -> MuxState {
        self.lock().mux.clone()
    }

    /// Names of the clients currently attached.
    pub fn clients(&self) -> Vec<String> {
        self.lock().clients.clone()
    }

    pub(crate) fn attach(&self, name: &str) {
        self.lock().clients.push(name.to_owned());
    }

    pub(crate) fn detach(&self, name: &str) {
        let mut inner = self.lock();
        if let Some(pos) = inner.clients.iter().position(|c| c == name) {
            inner.clients.remove(pos);
        }
    }

    /// Release the transport.  Clients still holding the bus get
    /// non-retryable `Closed` faults from then on.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.transport.close();
        inner.transport = Box::new(ClosedTransport);
        inner.mux = MuxState::new();
        info!("i2c-{}: closed ({} clients attached)", self.index, inner.clients.len());
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        // Plain data behind the lock; recover from poisoning.
        self.inner.lock().unwrap_or_else(|poisoned| {
            error!("i2c-{}: lock poisoned, recovering", self.index);
            poisoned.into_inner()
        })
    }
}
