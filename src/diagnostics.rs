//! Boot-time and runtime diagnostics.
//!
//! - reset cause, read and logged once at boot,
//! - stack/heap report after bring-up,
//! - a panic hook that logs the reason before the device resets.

use core::fmt;

use log::{error, info, warn};

/// Why the controller last came out of reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCause {
    PowerOn,
    External,
    Software,
    Panic,
    Watchdog,
    DeepSleep,
    Brownout,
    Unknown,
}

impl ResetCause {
    /// Decode an `esp_reset_reason_t` value.
    pub const fn from_raw(code: u32) -> Self {
        match code {
            1 => Self::PowerOn,
            2 => Self::External,
            3 => Self::Software,
            4 => Self::Panic,
            // interrupt, task and other watchdogs
            5..=7 => Self::Watchdog,
            8 => Self::DeepSleep,
            9 => Self::Brownout,
            _ => Self::Unknown,
        }
    }

    /// Raw code used by the simulated register on the host.
    #[cfg_attr(target_os = "espidf", allow(dead_code))]
    const fn to_raw(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::PowerOn => 1,
            Self::External => 2,
            Self::Software => 3,
            Self::Panic => 4,
            Self::Watchdog => 7,
            Self::DeepSleep => 8,
            Self::Brownout => 9,
        }
    }

    /// Resets the node did not ask for.
    pub const fn is_abnormal(self) -> bool {
        matches!(self, Self::Panic | Self::Watchdog | Self::Brownout)
    }
}

impl fmt::Display for ResetCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PowerOn => "power-on",
            Self::External => "external pin",
            Self::Software => "software",
            Self::Panic => "panic",
            Self::Watchdog => "watchdog",
            Self::DeepSleep => "deep-sleep wake",
            Self::Brownout => "brownout",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ───────────────────────────────────────────────────────────────
// Reset cause register
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
thread_local! {
    static SIMULATED_RESET: core::cell::Cell<u32> = const { core::cell::Cell::new(1) };
}

/// Host only: pretend the last reset seen by this thread had `cause`.
#[cfg(not(target_os = "espidf"))]
pub fn simulate_reset(cause: ResetCause) {
    SIMULATED_RESET.with(|r| r.set(cause.to_raw()));
}

#[cfg(target_os = "espidf")]
fn take_reset_cause() -> ResetCause {
    // Latched per boot by the ROM; nothing to clear.
    let raw = unsafe { esp_idf_svc::sys::esp_reset_reason() };
    ResetCause::from_raw(raw as u32)
}

#[cfg(not(target_os = "espidf"))]
fn take_reset_cause() -> ResetCause {
    let raw = SIMULATED_RESET.with(|r| r.replace(ResetCause::PowerOn.to_raw()));
    ResetCause::from_raw(raw)
}

/// Log the cause of the last reset and clear it so the next boot reports
/// its own.
pub fn show_and_clear_reset_cause() -> ResetCause {
    let cause = take_reset_cause();
    if cause.is_abnormal() {
        warn!("Reset cause: {}", cause);
    } else {
        info!("Reset cause: {}", cause);
    }
    cause
}

// ───────────────────────────────────────────────────────────────
// Stack / heap report
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackReport {
    /// Lowest free stack seen on the calling task, in bytes.
    pub stack_high_water: u32,
    pub heap_free: u32,
    pub heap_min_free: u32,
}

#[cfg(target_os = "espidf")]
pub fn log_stack_usage() -> Option<StackReport> {
    use esp_idf_svc::sys::*;
    // SAFETY: a null handle queries the calling task.
    let stack_high_water = unsafe { uxTaskGetStackHighWaterMark(core::ptr::null_mut()) };
    let report = StackReport {
        stack_high_water,
        heap_free: unsafe { esp_get_free_heap_size() },
        heap_min_free: unsafe { esp_get_minimum_free_heap_size() },
    };
    info!(
        "main: stack unused {} B | heap free {} B (min {} B)",
        report.stack_high_water, report.heap_free, report.heap_min_free
    );
    Some(report)
}

#[cfg(not(target_os = "espidf"))]
pub fn log_stack_usage() -> Option<StackReport> {
    info!("stack usage not available on host");
    None
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Install a panic hook that logs the reason before the reset.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        match info.location() {
            Some(at) => error!("PANIC at {}:{}: {}", at.file(), at.line(), reason),
            None => error!("PANIC: {}", reason),
        }
    }));
}
