//! One-shot GPIO initialisation for the user button.
//!
//! Configures the button pin as an input with pull-up, installs the GPIO ISR
//! service and registers an any-edge handler that stamps [`BUTTON_EDGES`].
//! Called once before the button producer thread is spawned.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
use log::info;

use super::button::{ButtonPin, EdgeLatch};
use crate::pins;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

/// Edges recorded by the button ISR.
pub static BUTTON_EDGES: EdgeLatch = EdgeLatch::new();

/// The configured button input.
pub struct ButtonGpio {
    gpio: i32,
}

impl ButtonGpio {
    pub fn gpio(&self) -> i32 {
        self.gpio
    }
}

impl ErrorType for ButtonGpio {
    type Error = Infallible;
}

impl InputPin for ButtonGpio {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(level_high(self.gpio))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!level_high(self.gpio))
    }
}

// Raw GPIO ISRs stay enabled across edges.
impl ButtonPin for ButtonGpio {}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn level_high(gpio: i32) -> bool {
    // SAFETY: read-only register access on a configured input.
    (unsafe { gpio_get_level(gpio) }) != 0
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn button_gpio_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: esp_timer_get_time is an RTC counter read; safe in ISR context.
    let now_ms = (unsafe { esp_timer_get_time() } / 1_000) as u32;
    BUTTON_EDGES.record(now_ms);
}

#[cfg(target_os = "espidf")]
pub fn init_button() -> Result<ButtonGpio, HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::BUTTON_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
    };
    // SAFETY: called once from the startup path; cfg outlives the call.
    unsafe {
        let ret = gpio_config(&cfg);
        if ret != ESP_OK {
            return Err(HwInitError::GpioConfigFailed(ret));
        }

        // ESP_ERR_INVALID_STATE: already installed by another component.
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        let ret = gpio_isr_handler_add(
            pins::BUTTON_GPIO,
            Some(button_gpio_isr),
            core::ptr::null_mut(),
        );
        if ret != ESP_OK {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        gpio_intr_enable(pins::BUTTON_GPIO);
    }

    info!("hw_init: button on GPIO{} (any edge)", pins::BUTTON_GPIO);
    Ok(ButtonGpio {
        gpio: pins::BUTTON_GPIO,
    })
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_BUTTON_DOWN: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
fn level_high(_gpio: i32) -> bool {
    // active low
    !SIM_BUTTON_DOWN.load(core::sync::atomic::Ordering::SeqCst)
}

/// Host only: drive the simulated button line as the ISR would see it.
#[cfg(not(target_os = "espidf"))]
pub fn simulate_button(down: bool) {
    SIM_BUTTON_DOWN.store(down, core::sync::atomic::Ordering::SeqCst);
    BUTTON_EDGES.record(super::button::monotonic_ms());
}

#[cfg(not(target_os = "espidf"))]
pub fn init_button() -> Result<ButtonGpio, HwInitError> {
    info!("hw_init(sim): button on GPIO{}", pins::BUTTON_GPIO);
    Ok(ButtonGpio {
        gpio: pins::BUTTON_GPIO,
    })
}
