//! GPIO / ADC assignments for the BattNode board.
//!
//! Single source of truth; drivers and adapters reference these constants
//! rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Battery sense (ADC1)
// ---------------------------------------------------------------------------

/// VDDH / 5 divider output, ADC1 channel 2.
pub const BATTERY_ADC_CHANNEL: u8 = 2;
/// Oneshot resolution used for the battery channel.
pub const BATTERY_ADC_RESOLUTION_BITS: u8 = 12;

// ---------------------------------------------------------------------------
// User button (active-low with external pull-up)
// ---------------------------------------------------------------------------

/// Momentary push-button; a press wakes the sampling loop early.
pub const BUTTON_GPIO: i32 = 9;
