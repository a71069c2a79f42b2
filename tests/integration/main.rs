//! Integration test driver for `tests/integration/`.
//!
//! Each `mod` below maps to a file that exercises the node against the
//! simulation adapters plus the mocks in `mock_hw`. All tests run on the
//! host with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod loop_tests;
mod mock_hw;
mod startup_tests;
