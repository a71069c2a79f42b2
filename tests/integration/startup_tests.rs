//! Bring-up: every failure site aborts with its own exit status, and a good
//! boot hands back a loop that samples and reports.

use core::time::Duration;
use std::io::Read;
use std::net::TcpListener;

use battnode::adapters::adc::SimAdc;
use battnode::adapters::console::SimConsole;
use battnode::adapters::thread::SimNetwork;
use battnode::app::events::NodeEvent;
use battnode::app::startup::{Board, boot};
use battnode::config::NodeConfig;
use battnode::error::StartupError;
use battnode::events::PRESS;
use battnode::net::codec::{MEASUREMENT_LEN, Measurement};

use super::mock_hw::{CountingWdt, DeadAdc, GapWdt, ManualBus, Recorder};

const SEND: Duration = Duration::from_millis(500);

fn quick(network_enabled: bool) -> NodeConfig {
    let base = if network_enabled {
        NodeConfig::default()
    } else {
        NodeConfig::standalone()
    };
    let mut c = NodeConfig {
        loop_period_secs: 1,
        watchdog_timeout_ms: 5_000,
        send_timeout_ms: 500,
        connect_timeout_ms: 1_000,
        connect_settle_ms: 0,
        readiness_timeout_secs: 2,
        ..base
    };
    c.remote_addr.clear();
    c.remote_addr.push_str("::1").unwrap();
    c
}

fn board<A>(
    adc: A,
    watchdog: CountingWdt,
    network: SimNetwork,
) -> Board<A, CountingWdt, SimNetwork, SimConsole> {
    Board {
        adc,
        watchdog,
        network,
        console: SimConsole::new(),
    }
}

fn failure<T>(r: Result<T, StartupError>) -> StartupError {
    match r {
        Ok(_) => panic!("boot unexpectedly succeeded"),
        Err(e) => e,
    }
}

/// A loopback port with nobody listening.
fn closed_port() -> u16 {
    TcpListener::bind("[::1]:0")
        .and_then(|l| l.local_addr())
        .map_or(9, |a| a.port())
}

#[test]
fn invalid_config_is_rejected_before_anything_runs() {
    let cfg = NodeConfig {
        loop_period_secs: 0,
        ..quick(false)
    };
    let wdt = CountingWdt::new();
    let mut bus = ManualBus::new();
    let e = failure(boot(
        &cfg,
        board(SimAdc::new(2, 0), wdt.clone(), SimNetwork::broken()),
        &mut bus,
        Recorder::new(),
    ));
    assert!(matches!(e, StartupError::Config(_)));
    assert_eq!(e.exit_code(), 60);
    assert_eq!(bus.listener_count(), 0);
}

#[test]
fn watchdog_allocation_failure_exits_10() {
    let mut bus = ManualBus::new();
    let e = failure(boot(
        &quick(false),
        board(
            SimAdc::new(2, 0),
            CountingWdt::without_channels(),
            SimNetwork::broken(),
        ),
        &mut bus,
        Recorder::new(),
    ));
    assert!(matches!(e, StartupError::WatchdogChannel(_)));
    assert_eq!(e.exit_code(), 10);
    // Nothing past the watchdog ran.
    assert_eq!(bus.listener_count(), 0);
}

#[test]
fn adc_not_ready_exits_20() {
    let mut bus = ManualBus::new();
    let e = failure(boot(
        &quick(false),
        board(DeadAdc, CountingWdt::new(), SimNetwork::broken()),
        &mut bus,
        Recorder::new(),
    ));
    assert_eq!(e, StartupError::AdcNotReady);
    assert_eq!(e.exit_code(), 20);
    assert_eq!(bus.listener_count(), 1);
}

#[test]
fn network_start_failure_exits_30() {
    let e = failure(boot(
        &quick(true),
        board(SimAdc::new(2, 0), CountingWdt::new(), SimNetwork::broken()),
        &mut ManualBus::new(),
        Recorder::new(),
    ));
    assert!(matches!(e, StartupError::NetworkStart(_)));
    assert_eq!(e.exit_code(), 30);
}

#[test]
fn readiness_timeout_exits_31_and_feeds_while_waiting() {
    let cfg = NodeConfig {
        readiness_timeout_secs: 1,
        watchdog_timeout_ms: 2_000,
        ..quick(true)
    };
    let wdt = CountingWdt::new();
    let e = failure(boot(
        &cfg,
        board(SimAdc::new(2, 0), wdt.clone(), SimNetwork::never_ready(SEND)),
        &mut ManualBus::new(),
        Recorder::new(),
    ));
    assert_eq!(e, StartupError::NetworkNotReady { waited_secs: 1 });
    assert_eq!(e.exit_code(), 31);
    assert!(wdt.feeds() >= 1, "watchdog starved during readiness wait");
}

#[test]
fn zero_connect_timeout_is_a_config_error() {
    let cfg = NodeConfig {
        connect_timeout_ms: 0,
        ..quick(true)
    };
    let e = failure(boot(
        &cfg,
        board(
            SimAdc::new(2, 0),
            CountingWdt::new(),
            SimNetwork::new(Duration::ZERO, SEND),
        ),
        &mut ManualBus::new(),
        Recorder::new(),
    ));
    assert_eq!(e.exit_code(), 60);
}

#[test]
fn settle_longer_than_watchdog_is_fed_through() {
    let collector = TcpListener::bind("[::1]:0").ok();
    let port = collector
        .as_ref()
        .and_then(|l| l.local_addr().ok())
        .map_or_else(closed_port, |a| a.port());
    let cfg = NodeConfig {
        watchdog_timeout_ms: 1_600,
        send_timeout_ms: 500,
        connect_settle_ms: 2_000,
        remote_port: port,
        ..quick(true)
    };
    assert_eq!(cfg.validate(), Ok(()));

    let wdt = GapWdt::new();
    let booted = boot(
        &cfg,
        Board {
            adc: SimAdc::new(2, 0),
            watchdog: wdt.clone(),
            network: SimNetwork::new(Duration::ZERO, SEND),
            console: SimConsole::new(),
        },
        &mut ManualBus::new(),
        Recorder::new(),
    )
    .is_ok();

    // Without an IPv6 loopback the connect fails after the settle.
    assert_eq!(booted, collector.is_some());
    assert!(
        wdt.max_gap() < cfg.watchdog_timeout(),
        "longest unfed gap {:?}",
        wdt.max_gap()
    );
}

#[test]
fn console_suspend_failure_exits_40() {
    let cfg = NodeConfig {
        suspend_console: true,
        ..quick(false)
    };
    let e = failure(boot(
        &cfg,
        Board {
            adc: SimAdc::new(2, 0),
            watchdog: CountingWdt::new(),
            network: SimNetwork::broken(),
            console: SimConsole::failing(-5),
        },
        &mut ManualBus::new(),
        Recorder::new(),
    ));
    assert!(matches!(e, StartupError::ConsoleSuspend(_)));
    assert_eq!(e.exit_code(), 40);
}

#[test]
fn refused_connection_exits_51() {
    let cfg = NodeConfig {
        remote_port: closed_port(),
        ..quick(true)
    };
    let e = failure(boot(
        &cfg,
        board(
            SimAdc::new(2, 0),
            CountingWdt::new(),
            SimNetwork::new(Duration::ZERO, SEND),
        ),
        &mut ManualBus::new(),
        Recorder::new(),
    ));
    assert!(matches!(e, StartupError::Connect(_)));
    assert_eq!(e.exit_code(), 51);
}

#[test]
fn standalone_boot_never_touches_the_network() {
    let wdt = CountingWdt::new();
    let mut bus = ManualBus::new();
    // A broken stack would fail startup if it were used.
    let mut node = boot(
        &quick(false),
        board(SimAdc::new(2, 1000), wdt.clone(), SimNetwork::broken()),
        &mut bus,
        Recorder::new(),
    )
    .unwrap();
    assert!(!node.network_enabled());
    assert_eq!(node.sampler().prescale(), 1);

    bus.fire(true);
    let fed_at_boot = wdt.feeds();
    let out = node.run_iteration();

    assert_eq!(out.woke_by, PRESS);
    assert_eq!(out.raw, Some(1000));
    // 1000 * 3300 >> 12
    assert_eq!(out.millivolts, Some(805));
    assert_eq!(out.reported, None);
    assert_eq!(wdt.feeds(), fed_at_boot + 1);
    assert_eq!(node.sink().last(), Some(&NodeEvent::Fed { iteration: 1 }));
}

#[test]
fn releases_are_not_forwarded() {
    let mut bus = ManualBus::new();
    let node = boot(
        &quick(false),
        board(SimAdc::new(2, 0), CountingWdt::new(), SimNetwork::broken()),
        &mut bus,
        Recorder::new(),
    )
    .unwrap();
    bus.fire(false);
    assert_eq!(node.gate().peek(), 0);
    bus.fire(true);
    bus.fire(true);
    assert_eq!(node.gate().peek(), PRESS);
}

#[test]
fn subscribe_failure_is_not_fatal() {
    let mut bus = ManualBus::uninitialised();
    let mut node = boot(
        &quick(false),
        board(SimAdc::new(2, 400), CountingWdt::new(), SimNetwork::broken()),
        &mut bus,
        Recorder::new(),
    )
    .unwrap();

    // No press can arrive; the loop still samples on timeout.
    let out = node.run_iteration();
    assert_eq!(out.woke_by, 0);
    assert_eq!(out.raw, Some(400));
}

#[test]
fn networked_boot_reports_to_the_collector() {
    let Ok(collector) = TcpListener::bind("[::1]:0") else {
        // No IPv6 loopback on this host.
        return;
    };
    let cfg = NodeConfig {
        remote_port: collector.local_addr().unwrap().port(),
        ..quick(true)
    };
    let wdt = CountingWdt::new();
    let mut node = boot(
        &cfg,
        board(
            SimAdc::new(2, 1000),
            wdt.clone(),
            SimNetwork::new(Duration::ZERO, SEND),
        ),
        &mut ManualBus::new(),
        Recorder::new(),
    )
    .unwrap();
    assert!(node.network_enabled());
    assert_eq!(node.sampler().prescale(), 5);

    node.gate().post(PRESS);
    let out = node.run_iteration();
    // 1000 * 5 = 5000; 5000 * 3300 >> 12
    assert_eq!(out.millivolts, Some(4028));
    assert_eq!(out.reported, Some(true));

    let (mut stream, _) = collector.accept().unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let mut buf = [0u8; MEASUREMENT_LEN];
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(Measurement::decode(buf), Measurement(4028));
    assert_eq!(node.reporter().map(|r| r.sent()), Some(1));
}

#[test]
fn simulated_button_press_reaches_the_loop() {
    use battnode::drivers::button::{ButtonDriver, monotonic_ms};
    use battnode::drivers::hw_init::{self, BUTTON_EDGES};

    let pin = hw_init::init_button().unwrap();
    let mut button = ButtonDriver::new(pin, &BUTTON_EDGES);
    let mut node = boot(
        &quick(false),
        board(SimAdc::new(2, 0), CountingWdt::new(), SimNetwork::broken()),
        &mut button,
        Recorder::new(),
    )
    .unwrap();
    assert_eq!(button.listener_count(), 1);

    hw_init::simulate_button(true);
    std::thread::sleep(Duration::from_millis(80));
    assert!(button.tick(monotonic_ms()).is_some_and(|n| n.pressed));
    assert_eq!(node.gate().peek(), PRESS);

    hw_init::simulate_button(false);
    std::thread::sleep(Duration::from_millis(80));
    assert!(button.tick(monotonic_ms()).is_some_and(|n| !n.pressed));

    assert_eq!(node.run_iteration().woke_by, PRESS);
}
