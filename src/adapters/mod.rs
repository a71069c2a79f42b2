//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements   | Connects to                      |
//! |------------|--------------|----------------------------------|
//! | `adc`      | AdcPort      | ADC1 oneshot + calibration       |
//! | `console`  | ConsolePort  | Console UART                     |
//! | `log_sink` | EventSink    | Serial log output                |
//! | `nvs`      | ConfigPort   | NVS / in-memory store            |
//! | `thread`   | NetworkPort  | OpenThread + TCP to the collector|
//!
//! Watchdog and button adapters live in [`crate::drivers`].

pub mod adc;
pub mod console;
pub mod log_sink;
pub mod nvs;
pub mod thread;
