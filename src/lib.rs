//! BattNode firmware library.
//!
//! Exposes the sampling loop, its ports and adapters for integration
//! testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; the host build
//! substitutes simulated adapters.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod drivers;
pub mod error;
pub mod events;
pub mod net;
pub mod pins;
pub mod sensors;
