//! In-memory model of one I2C device.

use std::collections::BTreeMap;

use super::mux::MuxSimulator;
use crate::bus::MuxRoute;
use crate::error::LinkError;

/// A device the simulated bus can talk to.
///
/// Two protocols are modelled side by side:
///
/// - a LIFO byte buffer: `write` pushes, `read` pops and yields `0x00` once
///   it runs dry, the way a real bus reads back an idle-high line as zeros
///   after the device stops driving it;
/// - a register file: `write_register` / `read_register`.  Reading a
///   register nothing has written is an error rather than a default.
///
/// A write matching one of the canned request patterns queues the matching
/// reply instead of being pushed.
#[derive(Debug, Clone)]
pub struct SimulatedPeripheral {
    address: u8,
    mux: Option<MuxRoute>,
    buffer: Vec<u8>,
    registers: BTreeMap<u8, u8>,
    responses: Vec<(Vec<u8>, Vec<u8>)>,
}

impl SimulatedPeripheral {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            mux: None,
            buffer: Vec::new(),
            registers: BTreeMap::new(),
            responses: Vec::new(),
        }
    }

    /// Place the device on a mux channel.
    #[must_use]
    pub fn behind(mut self, route: MuxRoute) -> Self {
        self.mux = Some(route);
        self
    }

    /// Preload the buffer.  `bytes` are read back first-to-last.
    #[must_use]
    pub fn with_buffer(mut self, bytes: &[u8]) -> Self {
        self.queue(bytes);
        self
    }

    #[must_use]
    pub fn with_register(mut self, register: u8, value: u8) -> Self {
        self.registers.insert(register, value);
        self
    }

    /// Answer a write of exactly `request` by queueing `reply`.
    #[must_use]
    pub fn with_response(mut self, request: &[u8], reply: &[u8]) -> Self {
        self.responses.push((request.to_vec(), reply.to_vec()));
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn route(&self) -> Option<MuxRoute> {
        self.mux
    }

    /// Bytes still waiting to be read.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn register(&self, register: u8) -> Option<u8> {
        self.registers.get(&register).copied()
    }

    /// Whether a transaction to `address` reaches this device given the
    /// current mux positions.
    pub fn reachable(&self, mux: &MuxSimulator, address: u8) -> Result<(), LinkError> {
        if address != self.address {
            return Err(LinkError::no_ack());
        }
        match self.mux {
            Some(route) => mux.verify(route.address(), route.channel()),
            None => Ok(()),
        }
    }

    pub fn write(
        &mut self,
        mux: &MuxSimulator,
        address: u8,
        bytes: &[u8],
    ) -> Result<(), LinkError> {
        self.reachable(mux, address)?;
        let canned = self
            .responses
            .iter()
            .find(|(request, _)| request.as_slice() == bytes)
            .map(|(_, reply)| reply.clone());
        match canned {
            Some(reply) => self.queue(&reply),
            None => self.buffer.extend_from_slice(bytes),
        }
        Ok(())
    }

    pub fn read(
        &mut self,
        mux: &MuxSimulator,
        address: u8,
        buf: &mut [u8],
    ) -> Result<(), LinkError> {
        self.reachable(mux, address)?;
        for slot in buf.iter_mut() {
            *slot = self.buffer.pop().unwrap_or(0x00);
        }
        Ok(())
    }

    pub fn read_register(
        &mut self,
        mux: &MuxSimulator,
        address: u8,
        register: u8,
    ) -> Result<u8, LinkError> {
        self.reachable(mux, address)?;
        self.register(register)
            .ok_or(LinkError::UnsetRegister(register))
    }

    pub fn write_register(
        &mut self,
        mux: &MuxSimulator,
        address: u8,
        register: u8,
        value: u8,
    ) -> Result<(), LinkError> {
        self.reachable(mux, address)?;
        self.registers.insert(register, value);
        Ok(())
    }

    /// Push `bytes` so that pops return them in order.
    fn queue(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes.iter().rev());
    }
}
