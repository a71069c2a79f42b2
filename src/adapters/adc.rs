//! Battery ADC adapter.
//!
//! On ESP-IDF, [`EspAdc`] drives an ADC1 oneshot unit and converts with the
//! factory curve-fitting calibration. If the chip carries no eFuse
//! calibration the adapter still samples, but conversions fail with
//! [`ConversionError::CalibrationUnavailable`].
//!
//! On the host, [`SimAdc`] serves a settable raw level and converts with a
//! [`LinearCalibration`].

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use log::{info, warn};

use crate::app::ports::AdcPort;
use crate::error::{ConversionError, SampleError};
use crate::sensors::battery::{AdcSequence, LinearCalibration};

// ───────────────────────────────────────────────────────────────
// ESP-IDF oneshot ADC
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::EspAdc;

#[cfg(target_os = "espidf")]
mod esp {
    use super::*;
    use esp_idf_svc::sys::*;

    pub struct EspAdc {
        unit: adc_oneshot_unit_handle_t,
        cali: adc_cali_handle_t,
        channel: u8,
    }

    impl EspAdc {
        /// Create the ADC1 unit. A failed unit leaves the adapter
        /// not-ready rather than failing here; startup checks readiness.
        pub fn new(channel: u8) -> Self {
            let init_cfg = adc_oneshot_unit_init_cfg_t {
                unit_id: adc_unit_t_ADC_UNIT_1,
                ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
                ..Default::default()
            };
            let mut unit: adc_oneshot_unit_handle_t = core::ptr::null_mut();
            // SAFETY: init_cfg outlives the call; unit is written on success.
            let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut unit) };
            if ret != ESP_OK {
                warn!("adc1: unit init failed (rc={})", ret);
                unit = core::ptr::null_mut();
            }
            Self {
                unit,
                cali: core::ptr::null_mut(),
                channel,
            }
        }
    }

    impl AdcPort for EspAdc {
        fn name(&self) -> &str {
            "adc1"
        }

        fn channel_id(&self) -> u8 {
            self.channel
        }

        fn is_ready(&self) -> bool {
            !self.unit.is_null()
        }

        fn configure_channel(&mut self) -> Result<(), SampleError> {
            let chan_cfg = adc_oneshot_chan_cfg_t {
                atten: adc_atten_t_ADC_ATTEN_DB_12,
                bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
            };
            let ret = unsafe {
                adc_oneshot_config_channel(self.unit, adc_channel_t::from(self.channel), &chan_cfg)
            };
            if ret != ESP_OK {
                return Err(SampleError::ChannelSetup(ret));
            }

            let cali_cfg = adc_cali_curve_fitting_config_t {
                unit_id: adc_unit_t_ADC_UNIT_1,
                chan: adc_channel_t::from(self.channel),
                atten: adc_atten_t_ADC_ATTEN_DB_12,
                bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
            };
            let ret = unsafe { adc_cali_create_scheme_curve_fitting(&cali_cfg, &mut self.cali) };
            if ret == ESP_OK {
                info!("adc1: channel {} configured, curve-fitting calibration", self.channel);
            } else {
                warn!("adc1: no calibration scheme (rc={})", ret);
                self.cali = core::ptr::null_mut();
            }
            Ok(())
        }

        fn read(&mut self, sequence: &mut AdcSequence) -> Result<(), SampleError> {
            let mut raw: i32 = 0;
            let ret = unsafe {
                adc_oneshot_read(self.unit, adc_channel_t::from(sequence.channel), &mut raw)
            };
            match ret {
                ESP_OK => {
                    sequence.buffer = raw.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
                    Ok(())
                }
                ESP_ERR_TIMEOUT => Err(SampleError::Busy),
                rc => Err(SampleError::Io(rc)),
            }
        }

        fn raw_to_millivolts(&self, value: i32) -> Result<i32, ConversionError> {
            if self.cali.is_null() {
                return Err(ConversionError::CalibrationUnavailable);
            }
            let mut mv: i32 = 0;
            let ret = unsafe { adc_cali_raw_to_voltage(self.cali, value, &mut mv) };
            if ret != ESP_OK {
                return Err(ConversionError::CalibrationUnavailable);
            }
            Ok(mv)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// Shared handle onto the simulated input level.
#[derive(Debug, Clone)]
pub struct SimLevel(Arc<AtomicI32>);

impl SimLevel {
    pub fn set(&self, raw: i16) {
        self.0.store(i32::from(raw), Ordering::SeqCst);
    }

    /// Make the next reads fail with `Busy`.
    pub fn fail(&self) {
        self.0.store(i32::MIN, Ordering::SeqCst);
    }

    fn get(&self) -> Option<i16> {
        i16::try_from(self.0.load(Ordering::SeqCst)).ok()
    }
}

pub struct SimAdc {
    channel: u8,
    configured: bool,
    level: SimLevel,
    calibration: Option<LinearCalibration>,
}

impl SimAdc {
    /// `initial` is the raw code served until changed through [`SimAdc::level`].
    pub fn new(channel: u8, initial: i16) -> Self {
        Self {
            channel,
            configured: false,
            level: SimLevel(Arc::new(AtomicI32::new(i32::from(initial)))),
            calibration: Some(LinearCalibration::default_12bit()),
        }
    }

    pub fn without_calibration(mut self) -> Self {
        self.calibration = None;
        self
    }

    pub fn level(&self) -> SimLevel {
        self.level.clone()
    }
}

impl AdcPort for SimAdc {
    fn name(&self) -> &str {
        "adc(sim)"
    }

    fn channel_id(&self) -> u8 {
        self.channel
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn configure_channel(&mut self) -> Result<(), SampleError> {
        self.configured = true;
        info!("adc(sim): channel {} configured", self.channel);
        Ok(())
    }

    fn read(&mut self, sequence: &mut AdcSequence) -> Result<(), SampleError> {
        if !self.configured {
            return Err(SampleError::NotReady);
        }
        sequence.buffer = self.level.get().ok_or(SampleError::Busy)?;
        Ok(())
    }

    fn raw_to_millivolts(&self, value: i32) -> Result<i32, ConversionError> {
        self.calibration
            .ok_or(ConversionError::CalibrationUnavailable)?
            .raw_to_millivolts(value)
    }
}
