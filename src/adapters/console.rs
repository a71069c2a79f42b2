//! Console adapter.
//!
//! Suspending the console drains pending UART output and silences every
//! log sink, so the UART stays idle for the rest of the run.

use log::info;

use crate::app::ports::ConsolePort;
use crate::error::ConsoleError;

#[cfg(target_os = "espidf")]
pub struct UartConsole {
    port: u32,
}

#[cfg(target_os = "espidf")]
impl UartConsole {
    pub fn new(port: u32) -> Self {
        Self { port }
    }
}

#[cfg(target_os = "espidf")]
impl ConsolePort for UartConsole {
    fn suspend(&mut self) -> Result<(), ConsoleError> {
        use esp_idf_svc::sys::*;

        info!("console: suspending UART{}", self.port);
        // SAFETY: polling flush of an initialised console UART.
        let ret = unsafe { uart_wait_tx_idle_polling(self.port as _) };
        if ret != ESP_OK {
            return Err(ConsoleError(ret));
        }
        unsafe { esp_log_level_set(c"*".as_ptr(), esp_log_level_t_ESP_LOG_NONE) };
        log::set_max_level(log::LevelFilter::Off);
        Ok(())
    }
}

/// Host stand-in recording whether it was suspended.
#[derive(Debug, Default)]
pub struct SimConsole {
    suspended: bool,
    fail_with: Option<i32>,
}

impl SimConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// A console whose suspend always fails with `rc`.
    pub fn failing(rc: i32) -> Self {
        Self {
            suspended: false,
            fail_with: Some(rc),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}

impl ConsolePort for SimConsole {
    fn suspend(&mut self) -> Result<(), ConsoleError> {
        if let Some(rc) = self.fail_with {
            return Err(ConsoleError(rc));
        }
        info!("console(sim): suspended");
        self.suspended = true;
        Ok(())
    }
}
