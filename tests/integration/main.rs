//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the simulator or a mock `embedded-hal` controller.  All tests
//! run on the host with no real hardware required.

mod client_tests;
mod concurrency_tests;
mod health_tests;
mod mock_i2c;
