//! Peripheral drivers: watchdog, button debouncer, GPIO bring-up.

pub mod button;
pub mod hw_init;
pub mod watchdog;
