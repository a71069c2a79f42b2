//! Application core: the sampling loop and its bring-up.
//!
//! The loop, the liveness keeper and the startup sequence only talk to
//! hardware through the **port traits** in [`ports`], so every path runs on
//! the host against mocks.

pub mod events;
pub mod liveness;
pub mod ports;
pub mod service;
pub mod startup;
