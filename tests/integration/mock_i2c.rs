//! Mock `embedded-hal` I2C controller for integration tests.
//!
//! Records every operation so tests can assert on the exact wire traffic
//! the hardware adapter produces, without a `/dev/i2c-*` node.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum I2cCall {
    Write { address: u8, bytes: Vec<u8> },
    Read { address: u8, len: usize },
}

// ── Shared state ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct State {
    present: BTreeSet<u8>,
    /// Register file per device; the first written byte is the pointer.
    registers: BTreeMap<u8, [u8; 256]>,
    pointers: BTreeMap<u8, u8>,
    calls: Vec<I2cCall>,
    transactions: usize,
}

/// Cloneable handle: one clone goes into the adapter, the test keeps
/// another for inspection.
#[derive(Debug, Clone, Default)]
pub struct MockI2c(Arc<Mutex<State>>);

#[allow(dead_code)]
impl MockI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `address` acknowledge.
    pub fn add_device(&self, address: u8) -> &Self {
        let mut s = self.lock();
        s.present.insert(address);
        s.registers.entry(address).or_insert([0; 256]);
        self
    }

    pub fn remove_device(&self, address: u8) {
        self.lock().present.remove(&address);
    }

    pub fn calls(&self) -> Vec<I2cCall> {
        self.lock().calls.clone()
    }

    pub fn clear(&self) {
        let mut s = self.lock();
        s.calls.clear();
        s.transactions = 0;
    }

    /// Number of start..stop transactions seen.
    pub fn transactions(&self) -> usize {
        self.lock().transactions
    }

    pub fn register(&self, address: u8, register: u8) -> u8 {
        self.lock().registers.get(&address).map_or(0, |r| r[register as usize])
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap()
    }
}

impl ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut s = self.lock();
        s.transactions += 1;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => s.calls.push(I2cCall::Write {
                    address,
                    bytes: bytes.to_vec(),
                }),
                Operation::Read(buf) => s.calls.push(I2cCall::Read {
                    address,
                    len: buf.len(),
                }),
            }
            if !s.present.contains(&address) {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            match op {
                Operation::Write(bytes) => {
                    if let Some((&reg, data)) = bytes.split_first() {
                        let regs = s.registers.entry(address).or_insert([0; 256]);
                        for (i, b) in data.iter().enumerate() {
                            regs[(reg as usize + i) % 256] = *b;
                        }
                        s.pointers.insert(address, reg);
                    }
                }
                Operation::Read(buf) => {
                    let reg = s.pointers.get(&address).copied().unwrap_or(0);
                    let regs = s.registers.get(&address).copied().unwrap_or([0; 256]);
                    for (i, slot) in buf.iter_mut().enumerate() {
                        *slot = regs[(reg as usize + i) % 256];
                    }
                }
            }
        }
        Ok(())
    }
}
