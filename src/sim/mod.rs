//! Hardware simulator, an in-memory [`Transport`].
//!
//! ```text
//!   Bus ──▶ SimulatedBus ──┬──▶ mux address?  ──▶ MuxSimulator::set
//!                          └──▶ device address ──▶ SimulatedPeripheral
//!                                                   (verifies the mux first)
//! ```
//!
//! [`SimulatedBus`] is a cheap handle: the [`Bus`](crate::bus::Bus) owns one
//! clone as its transport while tests keep another to preload peripherals,
//! inject faults and inspect the [`Traffic`] history.

pub mod mux;
pub mod peripheral;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::bus::address::BusAddress;
use crate::error::LinkError;
use crate::transport::Transport;

pub use mux::MuxSimulator;
pub use peripheral::SimulatedPeripheral;

/// One operation as the simulated bus received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Traffic {
    Write { address: u8, bytes: Vec<u8> },
    Read { address: u8, len: usize },
    ReadRegister { address: u8, register: u8 },
    WriteRegister { address: u8, register: u8, value: u8 },
}

impl Traffic {
    pub fn address(&self) -> u8 {
        match self {
            Self::Write { address, .. }
            | Self::Read { address, .. }
            | Self::ReadRegister { address, .. }
            | Self::WriteRegister { address, .. } => *address,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    peripherals: Vec<SimulatedPeripheral>,
    muxes: BTreeSet<u8>,
    history: Vec<Traffic>,
    failures: BTreeMap<u8, u32>,
}

impl SimState {
    /// Record `traffic` and consume one injected failure for its address.
    fn begin(&mut self, traffic: Traffic) -> Result<(), LinkError> {
        let address = traffic.address();
        self.history.push(traffic);
        match self.failures.get_mut(&address) {
            Some(n) if *n > 0 => {
                *n -= 1;
                debug!("sim: injected failure at 0x{address:02x} ({n} left)");
                Err(LinkError::no_ack())
            }
            _ => Ok(()),
        }
    }

    /// The peripheral a transaction to `address` lands on.  Several devices
    /// may share an address on different mux channels; the one whose
    /// channel is currently connected wins.
    fn target(
        &mut self,
        mux: &MuxSimulator,
        address: u8,
    ) -> Result<&mut SimulatedPeripheral, LinkError> {
        let mut first_err = None;
        let mut found = None;
        for (i, p) in self.peripherals.iter().enumerate() {
            if p.address() != address {
                continue;
            }
            match p.reachable(mux, address) {
                Ok(()) => {
                    found = Some(i);
                    break;
                }
                Err(e) if first_err.is_none() => first_err = Some(e),
                Err(_) => {}
            }
        }
        match found {
            Some(i) => Ok(&mut self.peripherals[i]),
            None => Err(first_err.unwrap_or_else(LinkError::no_ack)),
        }
    }
}

/// In-memory bus of simulated devices and muxes.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<SimState>>,
    mux: MuxSimulator,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peripheral(&self, peripheral: SimulatedPeripheral) {
        debug!(
            "sim: peripheral 0x{:02x}{}",
            peripheral.address(),
            peripheral
                .route()
                .map(|r| format!(" behind mux {r}"))
                .unwrap_or_default()
        );
        self.lock().peripherals.push(peripheral);
    }

    /// Put a mux at `address`.  Writes to it switch channels.
    pub fn add_mux(&self, address: u8) {
        self.lock().muxes.insert(address);
    }

    /// Make sure a device (and its mux, if routed) exists at `address`.
    pub fn ensure(&self, address: &BusAddress) {
        let route = address.mux();
        if let Some(route) = route {
            self.add_mux(route.address());
        }
        let exists = self
            .lock()
            .peripherals
            .iter()
            .any(|p| p.address() == address.device() && p.route() == route);
        if !exists {
            let peripheral = SimulatedPeripheral::new(address.device());
            self.add_peripheral(match route {
                Some(route) => peripheral.behind(route),
                None => peripheral,
            });
        }
    }

    /// Run `f` on the first peripheral at `address`.
    pub fn with_peripheral<R>(
        &self,
        address: u8,
        f: impl FnOnce(&mut SimulatedPeripheral) -> R,
    ) -> Option<R> {
        self.lock()
            .peripherals
            .iter_mut()
            .find(|p| p.address() == address)
            .map(f)
    }

    /// Handle to the shared mux positions.
    pub fn mux(&self) -> &MuxSimulator {
        &self.mux
    }

    pub fn history(&self) -> Vec<Traffic> {
        self.lock().history.clone()
    }

    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    /// Fail the next `n` operations addressed to `address` with a NACK.
    pub fn fail_next(&self, address: u8, n: u32) {
        self.lock().failures.insert(address, n);
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Transport for SimulatedBus {
    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), LinkError> {
        let mut state = self.lock();
        state.begin(Traffic::Write {
            address,
            bytes: bytes.to_vec(),
        })?;
        if state.muxes.contains(&address) {
            if let Some(&byte) = bytes.last() {
                self.mux.set(address, byte);
            }
            return Ok(());
        }
        state.target(&self.mux, address)?.write(&self.mux, address, bytes)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), LinkError> {
        let mut state = self.lock();
        state.begin(Traffic::Read {
            address,
            len: buf.len(),
        })?;
        if state.muxes.contains(&address) {
            let byte = self.mux.connection(address).unwrap_or(0);
            buf.fill(byte);
            return Ok(());
        }
        state.target(&self.mux, address)?.read(&self.mux, address, buf)
    }

    fn read_register(&mut self, address: u8, register: u8) -> Result<u8, LinkError> {
        let mut state = self.lock();
        state.begin(Traffic::ReadRegister { address, register })?;
        if state.muxes.contains(&address) {
            return Ok(self.mux.connection(address).unwrap_or(0));
        }
        state
            .target(&self.mux, address)?
            .read_register(&self.mux, address, register)
    }

    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), LinkError> {
        let mut state = self.lock();
        state.begin(Traffic::WriteRegister {
            address,
            register,
            value,
        })?;
        if state.muxes.contains(&address) {
            self.mux.set(address, value);
            return Ok(());
        }
        state
            .target(&self.mux, address)?
            .write_register(&self.mux, address, register, value)
    }
}
