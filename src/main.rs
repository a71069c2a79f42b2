//! BattNode firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  EspAdc        Watchdog       ThreadNetwork   UartConsole      │
//! │  (AdcPort)     (WatchdogPort) (NetworkPort)   (ConsolePort)    │
//! │  ButtonDriver  LogEventSink   NvsConfigStore                   │
//! │  (ButtonBus)   (EventSink)    (ConfigPort)                     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  boot() ──▶ SamplingLoop (wait · sample · report · feed)│    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A startup failure logs the error and exits with the status of its
//! failure site.

use core::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};

use battnode::adapters::adc::EspAdc;
use battnode::adapters::console::UartConsole;
use battnode::adapters::log_sink::LogEventSink;
use battnode::adapters::nvs::NvsConfigStore;
use battnode::adapters::thread::ThreadNetwork;
use battnode::app::startup::{Board, boot};
use battnode::config::NodeConfig;
use battnode::diagnostics;
use battnode::drivers::button::ButtonDriver;
use battnode::drivers::hw_init::{self, BUTTON_EDGES};
use battnode::drivers::watchdog::Watchdog;
use battnode::error::StartupError;
use battnode::pins;

/// Console UART used by the ESP-IDF logger.
const CONSOLE_UART: u32 = 0;
const BUTTON_POLL: Duration = Duration::from_millis(10);

fn main() {
    esp_idf_svc::sys::link_patches();

    if let Err(e) = run() {
        error!("{:#}", e);
        let code = e
            .downcast_ref::<StartupError>()
            .map_or(1, StartupError::exit_code);
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    esp_idf_logger::init()?;
    diagnostics::install_panic_handler();

    // ── Config (NVS or defaults) ──────────────────────────────
    let config = match NvsConfigStore::new() {
        Ok(store) => store.load_or_default(),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            NodeConfig::default()
        }
    };
    info!(
        "config: period={}s network={} prescale=x{}",
        config.loop_period_secs, config.network_enabled, config.prescale
    );

    // ── Button producer ───────────────────────────────────────
    let pin = hw_init::init_button().context("button GPIO init")?;
    let mut button = ButtonDriver::new(pin, &BUTTON_EDGES);

    // ── Bring-up ──────────────────────────────────────────────
    let board = Board {
        adc: EspAdc::new(pins::BATTERY_ADC_CHANNEL),
        watchdog: Watchdog::new(),
        network: ThreadNetwork::new(config.send_timeout()),
        console: UartConsole::new(CONSOLE_UART),
    };
    let mut node = boot(&config, board, &mut button, LogEventSink::new())?;

    button
        .spawn(BUTTON_POLL)
        .context("spawn button producer")?;

    node.run()
}
