//! Rolling-window health tracking for a logical entity (a sensor, an
//! actuator, a whole peripheral).
//!
//! Drivers report the outcome of every bus interaction.  The tracker keeps
//! the last `window` outcomes in a fixed-capacity ring and derives:
//!
//! - `percent` = 100 × successes / outcomes (100 when nothing is recorded)
//! - `healthy` = `percent >= minimum`
//!
//! Used as a circuit breaker: keep retrying while healthy, shut the entity
//! down once the success ratio drops under the minimum.  `reset()` after a
//! successful recovery.

use std::sync::{Arc, Mutex, MutexGuard};

use heapless::Deque;
use log::warn;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW: usize = 20;
/// Upper bound for `window`; the ring is statically sized.
pub const MAX_WINDOW: usize = 64;
pub const DEFAULT_MINIMUM_PERCENT: f32 = 80.0;

/// Serialisable tracker settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub window: usize,
    pub minimum_percent: f32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            minimum_percent: DEFAULT_MINIMUM_PERCENT,
        }
    }
}

/// Success/failure history for one entity.
#[derive(Debug, Clone)]
pub struct Health {
    window: usize,
    minimum: f32,
    outcomes: Deque<bool, MAX_WINDOW>,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MINIMUM_PERCENT)
    }
}

impl Health {
    /// `window` is clamped to `1..=MAX_WINDOW`.
    pub fn new(window: usize, minimum_percent: f32) -> Self {
        Self {
            window: window.clamp(1, MAX_WINDOW),
            minimum: minimum_percent,
            outcomes: Deque::new(),
        }
    }

    pub fn from_config(config: &HealthConfig) -> Self {
        Self::new(config.window, config.minimum_percent)
    }

    pub fn report_success(&mut self) {
        self.push(true);
    }

    pub fn report_failure(&mut self) {
        self.push(false);
    }

    /// Report the outcome of `result`.
    pub fn report<T, E>(&mut self, result: &Result<T, E>) {
        self.push(result.is_ok());
    }

    /// Success ratio over the window, 0.0–100.0.
    pub fn percent(&self) -> f32 {
        if self.outcomes.is_empty() {
            return 100.0;
        }
        let successes = self.outcomes.iter().filter(|ok| **ok).count();
        100.0 * successes as f32 / self.outcomes.len() as f32
    }

    pub fn is_healthy(&self) -> bool {
        self.percent() >= self.minimum
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.outcomes.clear();
    }

    /// Outcomes currently in the window.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn minimum_percent(&self) -> f32 {
        self.minimum
    }

    /// Run `op` until it succeeds or the entity turns unhealthy, reporting
    /// every outcome.  Returns the last error once unhealthy.
    pub fn guard<T, E, F>(&mut self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        loop {
            match op() {
                Ok(value) => {
                    self.report_success();
                    return Ok(value);
                }
                Err(e) => {
                    self.report_failure();
                    if !self.is_healthy() {
                        warn!(
                            "health dropped to {:.1}% (minimum {:.1}%), giving up",
                            self.percent(),
                            self.minimum
                        );
                        return Err(e);
                    }
                }
            }
        }
    }

    fn push(&mut self, outcome: bool) {
        if self.outcomes.len() >= self.window {
            self.outcomes.pop_front();
        }
        let pushed = self.outcomes.push_back(outcome);
        debug_assert!(pushed.is_ok(), "window exceeds MAX_WINDOW");
    }
}

/// A [`Health`] shared between threads that report on the same entity.
#[derive(Debug, Clone, Default)]
pub struct SharedHealth(Arc<Mutex<Health>>);

impl SharedHealth {
    pub fn new(health: Health) -> Self {
        Self(Arc::new(Mutex::new(health)))
    }

    pub fn report_success(&self) {
        self.lock().report_success();
    }

    pub fn report_failure(&self) {
        self.lock().report_failure();
    }

    pub fn report<T, E>(&self, result: &Result<T, E>) {
        self.lock().report(result);
    }

    pub fn percent(&self) -> f32 {
        self.lock().percent()
    }

    pub fn is_healthy(&self) -> bool {
        self.lock().is_healthy()
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    fn lock(&self) -> MutexGuard<'_, Health> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
