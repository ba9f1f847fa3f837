//! Bounded exponential-backoff retry for transient bus faults.
//!
//! ```text
//!   attempt ──ok──▶ return
//!      │
//!     err ── not retryable / tries exhausted / cancelled ──▶ return err
//!      │
//!   sleep(delay); delay *= backoff ──▶ attempt
//! ```
//!
//! Only errors whose [`FaultKind`](crate::error::FaultKind) is in the policy's mask and which are
//! transient are retried.  Range and configuration errors come straight
//! back on the first attempt.  The error returned after exhaustion is the
//! last one the operation produced, unmodified.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::error::{BusError, FaultKinds, Result};

const DEFAULT_TRIES: u32 = 5;
const DEFAULT_INITIAL_DELAY_MS: u64 = 100;
const DEFAULT_BACKOFF: f32 = 2.0;

/// Which faults to retry, how many times, and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Fault kinds that trigger another attempt.
    pub kinds: FaultKinds,
    /// Total attempts, including the first.  `0` behaves like `1`.
    pub tries: u32,
    /// Sleep before the second attempt.
    pub initial_delay_ms: u64,
    /// Multiplier applied to the sleep after every failed attempt.
    pub backoff: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            kinds: FaultKinds::ALL,
            tries: DEFAULT_TRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// A single attempt; the first failure is returned.
    pub fn disabled() -> Self {
        Self {
            tries: 1,
            ..Self::default()
        }
    }

    /// Whether `err` earns another attempt under this policy.
    pub fn retries(&self, err: &BusError) -> bool {
        err.is_transient() && err.fault_kind().is_some_and(|k| self.kinds.contains(k))
    }

    /// The sleeps this policy performs when every attempt fails.
    pub fn schedule(&self) -> Vec<std::time::Duration> {
        let mut delay_us = self.initial_delay_ms as f64 * 1000.0;
        (1..self.tries.max(1))
            .map(|_| {
                let d = std::time::Duration::from_micros(delay_us as u64);
                delay_us *= f64::from(self.backoff);
                d
            })
            .collect()
    }
}

/// Run `op` under `policy`, sleeping on `delay` between attempts.
pub fn retry<T, D, F>(policy: &RetryPolicy, delay: &mut D, op: F) -> Result<T>
where
    D: DelayNs + ?Sized,
    F: FnMut() -> Result<T>,
{
    run(policy, delay, None, op)
}

/// Like [`retry`], but gives up early once `cancel` is set.  The flag is
/// only checked between attempts; a sleep in progress runs to completion.
pub fn retry_cancellable<T, D, F>(
    policy: &RetryPolicy,
    delay: &mut D,
    cancel: &AtomicBool,
    op: F,
) -> Result<T>
where
    D: DelayNs + ?Sized,
    F: FnMut() -> Result<T>,
{
    run(policy, delay, Some(cancel), op)
}

fn run<T, D, F>(
    policy: &RetryPolicy,
    delay: &mut D,
    cancel: Option<&AtomicBool>,
    mut op: F,
) -> Result<T>
where
    D: DelayNs + ?Sized,
    F: FnMut() -> Result<T>,
{
    let tries = policy.tries.max(1);
    let mut delay_us = policy.initial_delay_ms as f64 * 1000.0;
    let mut attempt = 1;

    loop {
        let err = match op() {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !policy.retries(&err) {
            return Err(err);
        }
        if attempt >= tries {
            if tries > 1 {
                error!("giving up after {attempt} attempts: {err}");
            }
            return Err(err);
        }
        if cancel.is_some_and(|c| c.load(Ordering::Acquire)) {
            warn!("retry cancelled after {attempt} attempts: {err}");
            return Err(err);
        }

        let sleep_us = delay_us.min(f64::from(u32::MAX)) as u32;
        warn!(
            "attempt {attempt}/{tries} failed: {err}; retrying in {} ms",
            sleep_us / 1000
        );
        delay.delay_us(sleep_us);
        delay_us *= f64::from(policy.backoff);
        attempt += 1;
    }
}
