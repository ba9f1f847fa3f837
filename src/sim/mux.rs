//! Simulated TCA9548A-style address multiplexers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::bus::address::MUX_CHANNELS;
use crate::error::LinkError;

/// Channel bytes written to every simulated mux on one bus.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct MuxSimulator {
    connections: Arc<Mutex<BTreeMap<u8, u8>>>,
}

impl MuxSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `byte` as the current channel selection of mux `address`.
    pub fn set(&self, address: u8, byte: u8) {
        self.lock().insert(address, byte);
    }

    /// Last byte written to mux `address`.
    pub fn connection(&self, address: u8) -> Option<u8> {
        self.lock().get(&address).copied()
    }

    /// Succeeds only if mux `address` was last set to exactly `1 << channel`.
    /// A channel the mux does not have never matches.
    pub fn verify(&self, address: u8, channel: u8) -> Result<(), LinkError> {
        if channel >= MUX_CHANNELS {
            return Err(LinkError::NoSuchChannel {
                mux: address,
                channel,
            });
        }
        let expected = 1u8 << channel;
        match self.connection(address) {
            Some(actual) if actual == expected => Ok(()),
            actual => Err(LinkError::ChannelMismatch {
                mux: address,
                expected,
                actual,
            }),
        }
    }

    /// Forget every selection, as after a power cycle.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u8, u8>> {
        self.connections
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
