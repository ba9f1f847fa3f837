//! Per-device transaction client.
//!
//! A driver owns exactly one [`Client`] per chip.  The client knows the
//! chip's [`BusAddress`], holds the shared [`Bus`], and wraps every
//! transaction in the [`RetryPolicy`].  Whether the bus is real silicon or
//! the simulator was decided when the bus was opened; the client cannot
//! tell the difference.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info};

use super::address::BusAddress;
use super::transaction::{Reply, Transaction};
use super::Bus;
use crate::adapters::hal::StdDelay;
use crate::error::{BusError, Result};
use crate::retry::{self, RetryPolicy};

pub struct Client {
    name: String,
    address: BusAddress,
    bus: Arc<Bus>,
    policy: RetryPolicy,
    delay: Box<dyn DelayNs + Send>,
}

impl Client {
    /// Attach to `bus` and verify the device answers a one-byte read.
    ///
    /// Fails with [`BusError::Initialization`] wrapping the read or mux
    /// error if the device stays silent after retries.
    pub fn new(
        name: impl Into<String>,
        bus: Arc<Bus>,
        address: BusAddress,
        policy: RetryPolicy,
    ) -> Result<Self> {
        Self::with_delay(name, bus, address, policy, Box::new(StdDelay))
    }

    /// Like [`Client::new`] with a custom backoff delay source.
    pub fn with_delay(
        name: impl Into<String>,
        bus: Arc<Bus>,
        address: BusAddress,
        policy: RetryPolicy,
        delay: Box<dyn DelayNs + Send>,
    ) -> Result<Self> {
        let name = name.into();
        if address.bus() != bus.index() {
            return Err(BusError::Config("address is on a different bus"));
        }

        bus.attach(&name);
        let mut client = Self {
            name,
            address,
            bus,
            policy,
            delay,
        };

        // Dropping `client` on failure detaches it again.
        if let Err(cause) = client.execute(&Transaction::Read(1), true) {
            error!("{}: not detected at {} ({cause})", client.name, client.address);
            return Err(BusError::Initialization {
                name: client.name.clone(),
                cause: Box::new(cause),
            });
        }
        info!("{}: attached at {}", client.name, client.address);
        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> BusAddress {
        self.address
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    /// Run one transaction.  With `retry == false` the first failure is
    /// returned as-is.
    pub fn execute(&mut self, txn: &Transaction<'_>, retry: bool) -> Result<Reply> {
        let op = txn.checked()?;
        let policy = if retry {
            self.policy
        } else {
            RetryPolicy::disabled()
        };
        let bus = &self.bus;
        let address = &self.address;
        debug!("{}: {txn:?} (retry={retry})", self.name);
        retry::retry(&policy, self.delay.as_mut(), || bus.transact(address, op))
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.execute(&Transaction::Write(bytes), true).map(drop)
    }

    /// Read exactly `n` bytes.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        self.execute(&Transaction::Read(n), true).map(Reply::into_bytes)
    }

    /// Write-then-read of one register.  `register` must be 0-255.
    pub fn read_register(&mut self, register: u16) -> Result<u8> {
        self.execute(&Transaction::ReadRegister(register), true)
            .map(|reply| reply.byte().unwrap_or_default())
    }

    /// `register` and `value` must be 0-255.
    pub fn write_register(&mut self, register: u16, value: u16) -> Result<()> {
        self.execute(&Transaction::WriteRegister(register, value), true)
            .map(drop)
    }

    /// One-shot presence check, no retries.
    pub fn probe(&mut self) -> bool {
        self.execute(&Transaction::Read(1), false).is_ok()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.bus.detach(&self.name);
    }
}

impl core::fmt::Debug for Client {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
