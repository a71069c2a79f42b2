//! Sensor subsystem.
//!
//! The node has exactly one analog channel, the battery divider, handled by
//! [`battery::BatterySampler`].

pub mod battery;
