//! Controller configuration
//!
//! Everything the bus core needs at start-up: which backend to open,
//! the retry policy every client inherits, health-tracker settings, device
//! node overrides per bus, and the peripherals to attach.
//!
//! Loaded from JSON; every field has a default so a partial file works.
//! [`ControllerConfig::validate`] must pass before the config is used.

use std::collections::BTreeSet;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::bus::address::{BusAddress, MAX_DEVICE_ADDRESS, MUX_CHANNELS};
use crate::bus::mux::MAX_MUXES_PER_BUS;
use crate::error::BusError;
use crate::health::{HealthConfig, MAX_WINDOW};
use crate::retry::RetryPolicy;

/// Top-level controller configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Run every bus against the in-memory simulator.
    pub simulate: bool,
    pub retry: RetryPolicy,
    pub health: HealthConfig,
    /// Device node overrides.  Buses not listed use `/dev/i2c-<index>`.
    pub buses: Vec<BusDeviceConfig>,
    pub peripherals: Vec<PeripheralConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusDeviceConfig {
    pub index: u8,
    pub path: String,
}

/// One device to attach a client to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralConfig {
    pub name: String,
    pub bus: u8,
    pub address: u8,
    #[serde(default)]
    pub mux_address: Option<u8>,
    #[serde(default)]
    pub mux_channel: Option<u8>,
}

impl PeripheralConfig {
    pub fn bus_address(&self) -> Result<BusAddress, BusError> {
        BusAddress::new(self.bus, self.address, self.mux_address, self.mux_channel)
    }
}

/// Errors from loading or validating a [`ControllerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file does not exist.
    NotFound,
    /// The file is not valid JSON for this schema.
    Corrupted,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error reading the file.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "config I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ControllerConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            warn!("config: {e}");
            ConfigError::Corrupted
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            warn!("config: {}: {e}", path.display());
            match e.kind() {
                std::io::ErrorKind::NotFound => ConfigError::NotFound,
                _ => ConfigError::IoError,
            }
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_retry(&self.retry)?;
        validate_health(&self.health)?;

        let mut indices = BTreeSet::new();
        for bus in &self.buses {
            if !indices.insert(bus.index) {
                return Err(ConfigError::ValidationFailed("buses: index listed twice"));
            }
            if bus.path.is_empty() {
                return Err(ConfigError::ValidationFailed("buses: path must not be empty"));
            }
        }

        let mut names = BTreeSet::new();
        let mut addresses = BTreeSet::new();
        let mut muxes = BTreeSet::new();
        for p in &self.peripherals {
            if p.name.is_empty() {
                return Err(ConfigError::ValidationFailed("peripherals: name must not be empty"));
            }
            if !names.insert(p.name.as_str()) {
                return Err(ConfigError::ValidationFailed("peripherals: duplicate name"));
            }
            if p.address > MAX_DEVICE_ADDRESS {
                return Err(ConfigError::ValidationFailed(
                    "peripherals: address must be 0x00–0x7f",
                ));
            }
            if p.mux_channel.is_some_and(|c| c >= MUX_CHANNELS) {
                return Err(ConfigError::ValidationFailed(
                    "peripherals: mux_channel must be 0–7",
                ));
            }
            if p.mux_address.is_some() != p.mux_channel.is_some() {
                return Err(ConfigError::ValidationFailed(
                    "peripherals: mux_address and mux_channel must be set together",
                ));
            }
            let address = p.bus_address().map_err(|_| {
                ConfigError::ValidationFailed("peripherals: address collides with its mux")
            })?;
            if !addresses.insert(address) {
                return Err(ConfigError::ValidationFailed(
                    "peripherals: two devices at the same address and route",
                ));
            }
            if let Some(route) = address.mux() {
                muxes.insert((address.bus(), route.address()));
                if muxes.iter().filter(|(bus, _)| *bus == address.bus()).count()
                    > MAX_MUXES_PER_BUS
                {
                    return Err(ConfigError::ValidationFailed(
                        "peripherals: at most 8 muxes per bus",
                    ));
                }
            }
        }
        Ok(())
    }
}

fn validate_retry(retry: &RetryPolicy) -> Result<(), ConfigError> {
    if !(1..=20).contains(&retry.tries) {
        return Err(ConfigError::ValidationFailed("retry.tries must be 1–20"));
    }
    if retry.initial_delay_ms > 60_000 {
        return Err(ConfigError::ValidationFailed(
            "retry.initial_delay_ms must be 0–60000",
        ));
    }
    if !(1.0..=10.0).contains(&retry.backoff) {
        return Err(ConfigError::ValidationFailed("retry.backoff must be 1.0–10.0"));
    }
    Ok(())
}

fn validate_health(health: &HealthConfig) -> Result<(), ConfigError> {
    if !(1..=MAX_WINDOW).contains(&health.window) {
        return Err(ConfigError::ValidationFailed("health.window must be 1–64"));
    }
    if !(0.0..=100.0).contains(&health.minimum_percent) {
        return Err(ConfigError::ValidationFailed(
            "health.minimum_percent must be 0.0–100.0",
        ));
    }
    Ok(())
}
