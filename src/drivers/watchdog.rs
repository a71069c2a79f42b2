//! Task Watchdog Timer (TWDT) driver.
//!
//! Implements [`WatchdogPort`] on top of the ESP-IDF TWDT *user* API:
//! `allocate_channel` reconfigures the timer for the requested timeout,
//! `start` registers the main-loop user (from then on it must be fed), and
//! `feed` resets that user.
//!
//! On the host a simulated watchdog tracks the feed deadline so tests can
//! observe a missed feed.

#[cfg(not(target_os = "espidf"))]
use std::time::Instant;

use core::time::Duration;

use log::info;

use crate::app::ports::{WatchdogChannel, WatchdogPort};
use crate::error::WatchdogError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const USER_NAME: &core::ffi::CStr = c"battnode_main";

pub struct Watchdog {
    timeout: Option<Duration>,
    #[cfg(target_os = "espidf")]
    user: esp_task_wdt_user_handle_t,
    #[cfg(not(target_os = "espidf"))]
    deadline: Option<Instant>,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    pub fn new() -> Self {
        Self {
            timeout: None,
            #[cfg(target_os = "espidf")]
            user: core::ptr::null_mut(),
            #[cfg(not(target_os = "espidf"))]
            deadline: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl WatchdogPort for Watchdog {
    fn allocate_channel(&mut self, timeout: Duration) -> Result<WatchdogChannel, WatchdogError> {
        let cfg = esp_task_wdt_config_t {
            timeout_ms: timeout.as_millis() as u32,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        // SAFETY: cfg outlives the call; the TWDT copies it.
        let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
        if ret != ESP_OK {
            // Not initialised yet: bring it up with our config instead.
            let ret = unsafe { esp_task_wdt_init(&cfg) };
            if ret != ESP_OK {
                return Err(WatchdogError::NoChannel(ret));
            }
        }
        self.timeout = Some(timeout);
        Ok(WatchdogChannel(0))
    }

    fn start(&mut self) -> Result<(), WatchdogError> {
        // SAFETY: USER_NAME is 'static; the handle slot is ours.
        let ret = unsafe { esp_task_wdt_add_user(USER_NAME.as_ptr(), &mut self.user) };
        if ret != ESP_OK {
            return Err(WatchdogError::StartFailed(ret));
        }
        info!("Watchdog: TWDT user registered, panic on trigger");
        Ok(())
    }

    fn feed(&mut self, _channel: WatchdogChannel) {
        if self.user.is_null() {
            return;
        }
        let ret = unsafe { esp_task_wdt_reset_user(self.user) };
        if ret != ESP_OK {
            log::warn!("Watchdog: feed returned {}", ret);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl Watchdog {
    /// Whether the simulated deadline passed without a feed.
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() > d)
    }

    fn rearm(&mut self) {
        if let Some(t) = self.timeout {
            self.deadline = Some(Instant::now() + t);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl WatchdogPort for Watchdog {
    fn allocate_channel(&mut self, timeout: Duration) -> Result<WatchdogChannel, WatchdogError> {
        if timeout.is_zero() {
            return Err(WatchdogError::NoChannel(-22));
        }
        if self.timeout.is_some() {
            // single channel
            return Err(WatchdogError::NoChannel(-12));
        }
        self.timeout = Some(timeout);
        Ok(WatchdogChannel(0))
    }

    fn start(&mut self) -> Result<(), WatchdogError> {
        if self.timeout.is_none() {
            return Err(WatchdogError::StartFailed(-22));
        }
        info!("Watchdog(sim): armed ({:?})", self.timeout);
        self.rearm();
        Ok(())
    }

    fn feed(&mut self, _channel: WatchdogChannel) {
        self.rearm();
    }
}
