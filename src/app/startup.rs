//! Node bring-up.
//!
//! [`boot`] runs the startup sequence against the port traits and hands back
//! a ready [`SamplingLoop`]. Every failure is fatal and maps to its own
//! [`StartupError`]; the caller turns that into the process exit status.
//!
//! Sequence:
//!
//! 1. validate the configuration,
//! 2. allocate and start the watchdog,
//! 3. banner and reset cause,
//! 4. subscribe the press forwarder to the button bus (failure only logged),
//! 5. ADC ready check and channel setup,
//! 6. network variant: start the stack and wait for readiness,
//! 7. optional console suspend, stack report,
//! 8. network variant: settle, resolve the collector and connect.

use core::time::Duration;
use std::sync::Arc;

use log::{error, info};

use crate::config::NodeConfig;
use crate::diagnostics;
use crate::error::StartupError;
use crate::events::{EventFlags, PRESS};
use crate::net::readiness;
use crate::net::reporter::Reporter;
use crate::pins;
use crate::sensors::battery::BatterySampler;

use super::liveness::LivenessKeeper;
use super::ports::{
    AdcPort, ButtonEventBus, ButtonListener, ButtonNotification, ConsolePort, EventSink,
    NetworkPort, WatchdogPort,
};
use super::service::SamplingLoop;

/// Posts [`PRESS`] to the loop's gate for every press notification.
/// Releases are ignored.
pub struct PressForwarder {
    gate: Arc<EventFlags>,
}

impl PressForwarder {
    pub fn new(gate: Arc<EventFlags>) -> Self {
        Self { gate }
    }
}

impl ButtonListener for PressForwarder {
    fn on_button(&self, notification: ButtonNotification) {
        if notification.pressed {
            info!("Button pressed");
            self.gate.post(PRESS);
        }
    }
}

/// Device collaborators consumed by [`boot`].
pub struct Board<A, W, N, C> {
    pub adc: A,
    pub watchdog: W,
    pub network: N,
    pub console: C,
}

/// Bring the node up and return the loop, ready to run.
pub fn boot<A, W, N, C, B, E>(
    config: &NodeConfig,
    board: Board<A, W, N, C>,
    bus: &mut B,
    sink: E,
) -> Result<SamplingLoop<A, N::Link, W, E>, StartupError>
where
    A: AdcPort,
    W: WatchdogPort,
    N: NetworkPort,
    C: ConsolePort,
    B: ButtonEventBus,
    E: EventSink,
{
    let Board {
        mut adc,
        watchdog,
        mut network,
        mut console,
    } = board;

    config.validate().map_err(StartupError::Config)?;

    let mut liveness = LivenessKeeper::arm(watchdog, config.watchdog_timeout())?;

    info!("MAIN START (battnode {})", env!("CARGO_PKG_VERSION"));
    diagnostics::show_and_clear_reset_cause();

    // Longest blocking step between startup feeds.
    let slice = config.watchdog_timeout() / 2;

    let gate = Arc::new(EventFlags::new());
    match bus.subscribe(Arc::new(PressForwarder::new(gate.clone()))) {
        Ok(()) => info!("button listener registered"),
        Err(e) => error!("Event manager not initialized ({})", e),
    }

    if !adc.is_ready() {
        return Err(StartupError::AdcNotReady);
    }
    adc.configure_channel()
        .map_err(StartupError::AdcChannelSetup)?;

    if config.network_enabled {
        let status = Arc::new(EventFlags::new());
        network
            .start(status.clone())
            .map_err(StartupError::NetworkStart)?;

        // The watchdog is already armed; keep it fed through the wait.
        readiness::wait_until_ready_with(&status, config.readiness_timeout(), slice, || {
            liveness.feed();
        })
        .map_err(|_| StartupError::NetworkNotReady {
            waited_secs: config.readiness_timeout_secs,
        })?;
        info!("initialized");
    }

    if config.suspend_console {
        console.suspend().map_err(StartupError::ConsoleSuspend)?;
    }

    diagnostics::log_stack_usage();

    let reporter = if config.network_enabled {
        settle(config.connect_settle(), slice, &mut liveness);
        let remote = config.remote().ok_or(StartupError::InvalidAddress)?;
        info!("connecting to {}", remote);
        // The connect is bounded below one watchdog window by validation.
        liveness.feed();
        let link = network
            .connect(remote, config.connect_timeout())
            .map_err(StartupError::Connect)?;
        liveness.feed();
        Some(Reporter::new(link))
    } else {
        None
    };

    let sampler = BatterySampler::new(adc, config.prescale, pins::BATTERY_ADC_RESOLUTION_BITS);
    Ok(SamplingLoop::new(
        gate,
        sampler,
        reporter,
        liveness,
        sink,
        config.loop_period(),
    ))
}

/// Let the stack settle before the first connect, feeding every `slice`.
fn settle<W: WatchdogPort>(pause: Duration, slice: Duration, liveness: &mut LivenessKeeper<W>) {
    let mut left = pause;
    while !left.is_zero() {
        liveness.feed();
        let step = left.min(slice);
        std::thread::sleep(step);
        left -= step;
    }
}
