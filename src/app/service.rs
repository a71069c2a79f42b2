//! Sampling loop: the orchestrator at the centre of the node.
//!
//! [`SamplingLoop`] owns the sampler, the optional reporter, the liveness
//! keeper and the event sink. Every iteration walks the same state machine:
//!
//! ```text
//!  ┌────────────┐   event or timeout   ┌────────┐  ok   ┌─────────┐  ok + network  ┌────────┐
//!  │ WAIT_EVENT │─────────────────────▶│ SAMPLE │──────▶│ CONVERT │───────────────▶│ REPORT │
//!  └────────────┘                      └────────┘       └─────────┘                └────────┘
//!        ▲                                 │ err            │ err / no network         │ ok / err
//!        │                                 ▼                ▼                          ▼
//!        │                              ┌─────────────────────────────────────────────────┐
//!        └──────────────────────────────│                      FEED                       │
//!                                       └─────────────────────────────────────────────────┘
//! ```
//!
//! FEED runs exactly once per iteration on every path. It is carried by a
//! drop guard created at the top of the iteration, so a panicking step still
//! feeds on unwind. Iterations never overlap.

use core::time::Duration;
use std::sync::Arc;

use log::{error, info, warn};

use crate::events::{EventBits, EventFlags, PRESS};
use crate::net::reporter::Reporter;
use crate::net::transport::Transport;
use crate::sensors::battery::{BatterySampler, Millivolts, RawReading};

use super::events::NodeEvent;
use super::liveness::LivenessKeeper;
use super::ports::{AdcPort, EventSink, WatchdogPort};

/// States of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    WaitEvent,
    Sample,
    Convert(RawReading),
    Report(Millivolts),
    Feed,
}

/// What happened during one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IterationOutcome {
    /// Bits observed by the wait; zero when it timed out.
    pub woke_by: EventBits,
    /// Raw sample, when the acquisition succeeded.
    pub raw: Option<i16>,
    /// Calibrated value, when the conversion succeeded.
    pub millivolts: Option<Millivolts>,
    /// `None` when REPORT did not run; otherwise whether the send succeeded.
    pub reported: Option<bool>,
}

/// Feeds the watchdog when dropped.
struct FeedGuard<'a, W: WatchdogPort>(&'a mut LivenessKeeper<W>);

impl<W: WatchdogPort> Drop for FeedGuard<'_, W> {
    fn drop(&mut self) {
        self.0.feed();
    }
}

pub struct SamplingLoop<A, T, W, E> {
    gate: Arc<EventFlags>,
    sampler: BatterySampler<A>,
    reporter: Option<Reporter<T>>,
    liveness: LivenessKeeper<W>,
    sink: E,
    period: Duration,
    iterations: u64,
}

impl<A, T, W, E> SamplingLoop<A, T, W, E>
where
    A: AdcPort,
    T: Transport,
    W: WatchdogPort,
    E: EventSink,
{
    /// `reporter` present ⇔ the node runs with networking enabled.
    pub fn new(
        gate: Arc<EventFlags>,
        sampler: BatterySampler<A>,
        reporter: Option<Reporter<T>>,
        liveness: LivenessKeeper<W>,
        sink: E,
        period: Duration,
    ) -> Self {
        Self {
            gate,
            sampler,
            reporter,
            liveness,
            sink,
            period,
            iterations: 0,
        }
    }

    // ── Main loop ─────────────────────────────────────────────

    /// Run forever. The only exits are process termination and a watchdog
    /// reset.
    pub fn run(&mut self) -> ! {
        self.sink.emit(&NodeEvent::Started {
            network_enabled: self.network_enabled(),
            period_secs: self.period.as_secs() as u32,
        });
        info!("┌──────────────────────────────────────────────────────────┐");
        info!("│ Entering main loop                                       │");
        info!("└──────────────────────────────────────────────────────────┘");

        loop {
            self.run_iteration();
        }
    }

    /// Run one full WAIT_EVENT → … → FEED cycle.
    pub fn run_iteration(&mut self) -> IterationOutcome {
        let Self {
            gate,
            sampler,
            reporter,
            liveness,
            sink,
            period,
            iterations,
        } = self;

        let feed = FeedGuard(liveness);
        let mut outcome = IterationOutcome::default();
        let mut step = Step::WaitEvent;

        loop {
            step = match step {
                Step::WaitEvent => {
                    info!("waiting for events");
                    let bits = gate.wait_any(PRESS, *period);
                    info!("events: {:08x}", bits);
                    if bits & PRESS != 0 {
                        info!("handling button press event");
                    }
                    outcome.woke_by = bits;
                    sink.emit(&NodeEvent::Woke { bits });
                    // Timeouts sample too; the press is informational.
                    Step::Sample
                }

                Step::Sample => match sampler.sample() {
                    Ok(reading) => {
                        outcome.raw = Some(reading.raw);
                        sink.emit(&NodeEvent::Sampled { raw: reading.raw });
                        Step::Convert(reading)
                    }
                    Err(e) => {
                        error!("Could not read ({})", e);
                        sink.emit(&NodeEvent::SampleFailed(e));
                        Step::Feed
                    }
                },

                Step::Convert(reading) => match sampler.convert(reading) {
                    Ok(millivolts) => {
                        info!("battery = {} mV", millivolts);
                        outcome.millivolts = Some(millivolts);
                        sink.emit(&NodeEvent::Measured { millivolts });
                        if reporter.is_some() {
                            Step::Report(millivolts)
                        } else {
                            Step::Feed
                        }
                    }
                    Err(e) => {
                        error!("{}", e);
                        sink.emit(&NodeEvent::ConversionFailed(e));
                        Step::Feed
                    }
                },

                Step::Report(millivolts) => {
                    if let Some(reporter) = reporter.as_mut() {
                        match reporter.send(millivolts) {
                            Ok(()) => {
                                outcome.reported = Some(true);
                                sink.emit(&NodeEvent::Reported { millivolts });
                            }
                            Err(e) => {
                                warn!("Could not send ({})", e);
                                outcome.reported = Some(false);
                                sink.emit(&NodeEvent::SendFailed(e));
                            }
                        }
                    }
                    Step::Feed
                }

                Step::Feed => break,
            };
        }

        // FEED: the guard feeds here, or during unwind if a step panicked.
        drop(feed);
        *iterations += 1;
        sink.emit(&NodeEvent::Fed {
            iteration: *iterations,
        });
        outcome
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn network_enabled(&self) -> bool {
        self.reporter.is_some()
    }

    /// Completed iterations since startup.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn gate(&self) -> &Arc<EventFlags> {
        &self.gate
    }

    pub fn liveness(&self) -> &LivenessKeeper<W> {
        &self.liveness
    }

    pub fn sampler(&self) -> &BatterySampler<A> {
        &self.sampler
    }

    pub fn reporter(&self) -> Option<&Reporter<T>> {
        self.reporter.as_ref()
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }
}
