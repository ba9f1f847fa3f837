//! Adapters — concrete implementations of the [`Transport`](crate::transport::Transport) port.
//!
//! | Adapter | Implements  | Connects to                               |
//! |---------|-------------|-------------------------------------------|
//! | `hal`   | Transport   | any `embedded-hal` I2C controller         |
//! |         | DelayNs     | `std::thread::sleep` (retry backoff)      |
//!
//! The simulated transport lives in [`crate::sim`].

pub mod hal;
