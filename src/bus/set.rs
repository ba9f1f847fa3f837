//! Bus factory and registry.
//!
//! The [`Backend`] is chosen once, here.  Everything downstream of a
//! [`BusSet`] holds `Arc<Bus>` / [`Client`] and never asks whether it is
//! talking to silicon or to the simulator.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};

use super::address::{BusAddress, MuxRoute};
use super::transaction::Op;
use super::{Bus, Client};
use crate::config::ControllerConfig;
use crate::error::{BusError, Result};
use crate::health::{Health, HealthConfig};
use crate::retry::RetryPolicy;
use crate::sim::SimulatedBus;
use crate::transport::Transport;

/// First and last addresses a scan probes; the rest are reserved.
pub const SCAN_FIRST: u8 = 0x08;
pub const SCAN_LAST: u8 = 0x77;

/// Which transport every bus in a [`BusSet`] is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Hardware,
    Simulated,
}

impl Backend {
    pub fn from_simulate(simulate: bool) -> Self {
        if simulate {
            Self::Simulated
        } else {
            Self::Hardware
        }
    }
}

/// Opens each bus index once and hands out clients on it.
pub struct BusSet {
    backend: Backend,
    policy: RetryPolicy,
    health: HealthConfig,
    paths: BTreeMap<u8, String>,
    buses: BTreeMap<u8, Arc<Bus>>,
    simulators: BTreeMap<u8, SimulatedBus>,
}

impl BusSet {
    pub fn new(backend: Backend, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            health: HealthConfig::default(),
            paths: BTreeMap::new(),
            buses: BTreeMap::new(),
            simulators: BTreeMap::new(),
        }
    }

    /// Backend, retry policy, health settings and device paths from
    /// `config`.  Peripherals are attached separately by [`BusSet::connect`].
    pub fn from_config(config: &ControllerConfig) -> Self {
        let mut set = Self::new(Backend::from_simulate(config.simulate), config.retry);
        set.health = config.health;
        for bus in &config.buses {
            set.paths.insert(bus.index, bus.path.clone());
        }
        set
    }

    /// Use `path` instead of `/dev/i2c-<index>` for bus `index`.
    #[must_use]
    pub fn with_device_path(mut self, index: u8, path: impl Into<String>) -> Self {
        self.paths.insert(index, path.into());
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// A fresh tracker with the configured window and minimum.
    pub fn health(&self) -> Health {
        Health::from_config(&self.health)
    }

    /// The shared bus for `index`, opening its transport on first use.
    pub fn bus(&mut self, index: u8) -> Result<Arc<Bus>> {
        if let Some(bus) = self.buses.get(&index) {
            return Ok(bus.clone());
        }
        let transport = self.open(index)?;
        let bus = Bus::new(index, transport);
        self.buses.insert(index, bus.clone());
        Ok(bus)
    }

    /// The simulator behind bus `index`.  `None` on the hardware backend.
    pub fn simulator(&mut self, index: u8) -> Option<SimulatedBus> {
        match self.backend {
            Backend::Simulated => Some(self.simulators.entry(index).or_default().clone()),
            Backend::Hardware => None,
        }
    }

    /// Attach a client at `address` with the set's retry policy.  On the
    /// simulated backend the device (and its mux) are created if missing.
    pub fn client(&mut self, name: impl Into<String>, address: BusAddress) -> Result<Client> {
        let bus = self.bus(address.bus())?;
        if let Some(sim) = self.simulator(address.bus()) {
            sim.ensure(&address);
        }
        Client::new(name, bus, address, self.policy)
    }

    /// Attach every peripheral listed in `config`, in order.
    pub fn connect(&mut self, config: &ControllerConfig) -> Result<Vec<Client>> {
        config
            .peripherals
            .iter()
            .map(|p| {
                let address = p.bus_address()?;
                self.client(p.name.as_str(), address)
            })
            .collect()
    }

    /// Addresses on bus `index` (behind `route`, if given) that acknowledge
    /// a one-byte read.  One attempt per address, no retries.
    pub fn scan(&mut self, index: u8, route: Option<MuxRoute>) -> Result<Vec<u8>> {
        let bus = self.bus(index)?;
        let mut found = Vec::new();
        for device in SCAN_FIRST..=SCAN_LAST {
            if route.is_some_and(|r| r.address() == device) {
                continue;
            }
            let address = BusAddress::new(
                index,
                device,
                route.map(MuxRoute::address),
                route.map(MuxRoute::channel),
            )?;
            match bus.transact(&address, Op::Read(1)) {
                Ok(_) => found.push(device),
                Err(BusError::Mux(fault)) if fault.address != device => {
                    // The mux itself is gone; nothing behind it will answer.
                    return Err(BusError::Mux(fault));
                }
                Err(_) => {}
            }
        }
        info!("i2c-{index}: scan found {} device(s)", found.len());
        Ok(found)
    }

    /// Close every open bus.  Clients still attached get `Closed` faults.
    pub fn close(&mut self) {
        for bus in self.buses.values() {
            bus.close();
        }
        self.buses.clear();
    }

    fn open(&mut self, index: u8) -> Result<Box<dyn Transport>> {
        match self.backend {
            Backend::Simulated => {
                debug!("i2c-{index}: simulated");
                let sim = self.simulators.entry(index).or_default().clone();
                info!("i2c-{index}: opened (simulated)");
                Ok(Box::new(sim))
            }
            Backend::Hardware => self.open_hardware(index),
        }
    }

    #[cfg(feature = "linux")]
    fn open_hardware(&self, index: u8) -> Result<Box<dyn Transport>> {
        let path = self
            .paths
            .get(&index)
            .cloned()
            .unwrap_or_else(|| crate::adapters::hal::default_device_path(index));
        Ok(Box::new(crate::adapters::hal::open_linux(index, &path)?))
    }

    #[cfg(not(feature = "linux"))]
    fn open_hardware(&self, index: u8) -> Result<Box<dyn Transport>> {
        debug!("i2c-{index}: no hardware backend ({:?})", self.paths.get(&index));
        Err(BusError::Open {
            bus: index,
            reason: "built without the `linux` feature".into(),
        })
    }
}

impl Drop for BusSet {
    fn drop(&mut self) {
        self.close();
    }
}
