//! Steady state: the sampling loop against a real loopback collector.

use core::time::Duration;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Instant;

use battnode::adapters::adc::{SimAdc, SimLevel};
use battnode::app::events::NodeEvent;
use battnode::app::liveness::LivenessKeeper;
use battnode::app::ports::AdcPort;
use battnode::app::service::SamplingLoop;
use battnode::error::{ConversionError, SampleError, SendError, TransportError};
use battnode::events::{EventFlags, PRESS};
use battnode::net::codec::{Measurement, MeasurementDecoder};
use battnode::net::reporter::Reporter;
use battnode::net::transport::TcpTransport;
use battnode::sensors::battery::BatterySampler;

use super::mock_hw::{CountingWdt, Recorder};

type Node = SamplingLoop<SimAdc, TcpTransport, CountingWdt, Recorder>;

fn node(adc: SimAdc, prescale: i32, link: Option<TcpTransport>) -> (Node, CountingWdt) {
    let mut adc = adc;
    adc.configure_channel().unwrap();
    let wdt = CountingWdt::new();
    let liveness = LivenessKeeper::arm(wdt.clone(), Duration::from_secs(5)).unwrap();
    let node = SamplingLoop::new(
        Arc::new(EventFlags::new()),
        BatterySampler::new(adc, prescale, 12),
        link.map(Reporter::new),
        liveness,
        Recorder::new(),
        Duration::from_secs(1),
    );
    (node, wdt)
}

/// Connected (node side, collector side) pair over IPv4 loopback.
fn loopback() -> (TcpTransport, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let node_side = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (collector, _) = listener.accept().unwrap();
    collector
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    (
        TcpTransport::from_stream(node_side, Duration::from_millis(500)).unwrap(),
        collector,
    )
}

fn press_and_run(node: &mut Node) -> battnode::app::service::IterationOutcome {
    node.gate().post(PRESS);
    node.run_iteration()
}

#[test]
fn one_measurement_per_iteration_in_order() {
    let adc = SimAdc::new(2, 0);
    let level: SimLevel = adc.level();
    let (link, mut collector) = loopback();
    let (mut node, wdt) = node(adc, 5, Some(link));

    let raws = [100i16, 820, 4095];
    let mut expected = Vec::new();
    for raw in raws {
        level.set(raw);
        let out = press_and_run(&mut node);
        assert_eq!(out.reported, Some(true));
        expected.push(Measurement(out.millivolts.unwrap()));
    }
    assert_eq!(wdt.feeds(), 3);

    let mut bytes = [0u8; 12];
    collector.read_exact(&mut bytes).unwrap();
    let mut dec = MeasurementDecoder::new();
    let mut got = Vec::new();
    // Collector reads in arbitrary chunks.
    for chunk in bytes.chunks(5) {
        dec.feed(chunk, |m| got.push(m));
    }
    assert_eq!(got, expected);
    assert_eq!(dec.pending_len(), 0);
    // 4095 * 5 = 20475; 20475 * 3300 >> 12
    assert_eq!(got[2], Measurement(16_495));
}

#[test]
fn timeout_wakeup_still_samples_and_reports() {
    let (link, mut collector) = loopback();
    let (mut node, wdt) = node(SimAdc::new(2, 2048), 1, Some(link));

    let out = node.run_iteration();
    assert_eq!(out.woke_by, 0);
    assert_eq!(out.millivolts, Some(1650));
    assert_eq!(out.reported, Some(true));
    assert_eq!(wdt.feeds(), 1);

    let mut bytes = [0u8; 4];
    collector.read_exact(&mut bytes).unwrap();
    assert_eq!(Measurement::decode(bytes), Measurement(1650));
}

#[test]
fn closed_collector_fails_sends_but_never_stops_feeding() {
    let (link, collector) = loopback();
    let (mut node, wdt) = node(SimAdc::new(2, 1000), 5, Some(link));
    drop(collector);

    let mut failed = false;
    for i in 1..=20u64 {
        let out = press_and_run(&mut node);
        assert_eq!(wdt.feeds(), i);
        if out.reported == Some(false) {
            failed = true;
            assert!(matches!(
                node.sink().events.iter().rev().nth(1),
                Some(NodeEvent::SendFailed(_))
            ));
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(failed, "writes to a closed peer never failed");
}

#[test]
fn stalled_collector_times_out_within_send_bound() {
    let send_timeout = Duration::from_millis(300);
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let node_side = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    // Accepted, never read.
    let (_collector, _) = listener.accept().unwrap();

    // Fill both socket buffers so the next send has to wait.
    let mut filler = node_side.try_clone().unwrap();
    filler
        .set_write_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    let chunk = vec![0u8; 64 * 1024];
    let full = (0..10_000).any(|_| filler.write(&chunk).is_err());
    assert!(full, "socket buffers never filled");

    let link = TcpTransport::from_stream(node_side, send_timeout).unwrap();
    let (mut node, wdt) = node(SimAdc::new(2, 1000), 5, Some(link));

    let timed_out = SendError::Transport(TransportError::TimedOut);
    let mut seen = false;
    for i in 1..=50u64 {
        let started = Instant::now();
        let out = press_and_run(&mut node);
        let took = started.elapsed();
        assert_eq!(wdt.feeds(), i);

        let failure = node.sink().events.iter().rev().nth(1);
        if out.reported == Some(false) && failure == Some(&NodeEvent::SendFailed(timed_out)) {
            assert!(
                took < send_timeout + Duration::from_millis(700),
                "send held the loop for {:?}",
                took
            );
            seen = true;
            break;
        }
    }
    assert!(seen, "no send timed out against a stalled collector");
}

#[test]
fn read_failure_skips_to_feed() {
    let adc = SimAdc::new(2, 0);
    let level = adc.level();
    let (link, _collector) = loopback();
    let (mut node, wdt) = node(adc, 5, Some(link));

    level.fail();
    let out = press_and_run(&mut node);
    assert_eq!(out.raw, None);
    assert_eq!(out.reported, None);
    assert_eq!(wdt.feeds(), 1);
    assert!(
        node.sink()
            .events
            .contains(&NodeEvent::SampleFailed(SampleError::Busy))
    );
    assert_eq!(node.reporter().map(|r| r.sent()), Some(0));

    // Recovers on the next iteration.
    level.set(10);
    let out = press_and_run(&mut node);
    assert_eq!(out.reported, Some(true));
    assert_eq!(wdt.feeds(), 2);
}

#[test]
fn missing_calibration_skips_report() {
    let (link, _collector) = loopback();
    let (mut node, wdt) = node(SimAdc::new(2, 10).without_calibration(), 5, Some(link));

    let out = press_and_run(&mut node);
    assert_eq!(out.raw, Some(10));
    assert_eq!(out.millivolts, None);
    assert_eq!(out.reported, None);
    assert_eq!(wdt.feeds(), 1);
    assert!(
        node.sink()
            .events
            .contains(&NodeEvent::ConversionFailed(
                ConversionError::CalibrationUnavailable
            ))
    );
}

#[test]
fn presses_between_iterations_collapse() {
    let (mut node, _wdt) = node(SimAdc::new(2, 10), 1, None);
    for _ in 0..5 {
        node.gate().post(PRESS);
    }
    assert_eq!(node.run_iteration().woke_by, PRESS);
    assert_eq!(node.gate().peek(), 0);
    assert_eq!(node.iterations(), 1);
}
