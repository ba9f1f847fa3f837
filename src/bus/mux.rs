//! Mux arbitration.
//!
//! A mux is just another device on the parent bus: writing a one-hot byte
//! to its address connects the matching child channel.  Every device on
//! every channel shares that one register, so "select channel, then talk
//! to the device" is only correct when nothing else touches the bus in
//! between.  [`select`] therefore must only be called from inside
//! [`Bus`](super::Bus)'s critical section, together with the transaction
//! it prepares.

use std::collections::BTreeMap;

use log::{debug, warn};

use super::address::MuxRoute;
use crate::error::{BusError, Fault, Result};
use crate::transport::Transport;

/// 0x70-0x77 is the whole TCA9548A address space.  Config validation
/// holds each bus to this; `MuxState` itself tracks any number.
pub const MAX_MUXES_PER_BUS: usize = 8;

/// Last channel byte written to each mux on one bus.
#[derive(Debug, Clone, Default)]
pub struct MuxState {
    connections: BTreeMap<u8, u8>,
}

impl MuxState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel byte last written to `mux`, if any.
    pub fn connection(&self, mux: u8) -> Option<u8> {
        self.connections.get(&mux).copied()
    }

    /// Channel index last selected on `mux`, if any.
    pub fn channel(&self, mux: u8) -> Option<u8> {
        self.connection(mux).map(|byte| byte.trailing_zeros() as u8)
    }

    /// Number of muxes that have been switched at least once.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn record(&mut self, mux: u8, byte: u8) {
        self.connections.insert(mux, byte);
    }

    fn forget(&mut self, mux: u8) {
        self.connections.remove(&mux);
    }
}

/// Switch `route`'s mux to its channel.  A failed write leaves the mux in
/// an unknown state, so it is forgotten.
pub(crate) fn select(
    transport: &mut dyn Transport,
    state: &mut MuxState,
    bus: u8,
    route: MuxRoute,
) -> Result<()> {
    let byte = route.channel_byte();
    debug!(
        "i2c-{bus} mux 0x{:02x} <- 0x{byte:02x} (channel {})",
        route.address(),
        route.channel()
    );

    if let Err(cause) = transport.write(route.address(), &[byte]) {
        state.forget(route.address());
        warn!(
            "i2c-{bus} mux 0x{:02x}: select channel {} failed: {cause}",
            route.address(),
            route.channel()
        );
        return Err(BusError::Mux(Fault {
            bus,
            address: route.address(),
            register: None,
            cause,
        }));
    }
    state.record(route.address(), byte);
    Ok(())
}
