//! Node configuration parameters
//!
//! All tunable parameters for the BattNode firmware.
//! Defaults match the reference deployment; values can be overridden from
//! NVS (postcard blob) or a JSON document at provisioning time.

use core::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Loop ---
    /// Maximum time the loop waits for a button event (seconds)
    pub loop_period_secs: u32,
    /// Power down the console UART once startup completes
    pub suspend_console: bool,

    // --- Sampling ---
    /// Voltage-divider pre-scaling multiplier applied to the raw sample
    pub prescale: i32,

    // --- Watchdog ---
    /// Watchdog timeout (milliseconds)
    pub watchdog_timeout_ms: u32,

    // --- Network ---
    /// Report each measurement over TCP
    pub network_enabled: bool,
    /// IPv6 address of the collector
    pub remote_addr: heapless::String<46>,
    /// TCP port of the collector
    pub remote_port: u16,
    /// Bound on the startup readiness wait (seconds, 0 = wait forever)
    pub readiness_timeout_secs: u32,
    /// Bound on a single measurement send (milliseconds)
    pub send_timeout_ms: u32,
    /// Bound on the initial connect (milliseconds)
    pub connect_timeout_ms: u32,
    /// Pause between readiness and the connect attempt (milliseconds)
    pub connect_settle_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let mut remote_addr = heapless::String::new();
        // Fits: 15 bytes into a 46-byte buffer.
        let _ = remote_addr.push_str("fd04:2240::1cef");

        Self {
            // Loop
            loop_period_secs: 10,
            suspend_console: false,

            // Sampling (VDDH / 5 at the SAADC input)
            prescale: 5,

            // Watchdog
            watchdog_timeout_ms: 30_000,

            // Network
            network_enabled: true,
            remote_addr,
            remote_port: 50_000,
            readiness_timeout_secs: 300,
            send_timeout_ms: 5_000,
            connect_timeout_ms: 10_000,
            connect_settle_ms: 2_000,
        }
    }
}

impl NodeConfig {
    /// Configuration for the build without networking (×1 divider).
    pub fn standalone() -> Self {
        Self {
            network_enabled: false,
            prescale: 1,
            ..Self::default()
        }
    }

    /// Parse a JSON override document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, &'static str> {
        serde_json::from_slice(bytes).map_err(|_| "malformed JSON config")
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.loop_period_secs))
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.watchdog_timeout_ms))
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.send_timeout_ms))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.connect_timeout_ms))
    }

    pub fn connect_settle(&self) -> Duration {
        Duration::from_millis(u64::from(self.connect_settle_ms))
    }

    /// `None` when the readiness wait is unbounded.
    pub fn readiness_timeout(&self) -> Option<Duration> {
        (self.readiness_timeout_secs > 0)
            .then(|| Duration::from_secs(u64::from(self.readiness_timeout_secs)))
    }

    /// Collector address, if `remote_addr` parses as IPv6.
    pub fn remote(&self) -> Option<SocketAddr> {
        let ip: Ipv6Addr = self.remote_addr.parse().ok()?;
        Some(SocketAddr::V6(SocketAddrV6::new(ip, self.remote_port, 0, 0)))
    }

    /// Reject values that would break the loop or starve the watchdog.
    ///
    /// The worst-case iteration is a full wait plus a full send, and it must
    /// fit inside one watchdog window. So must a full connect attempt. The
    /// settle pause is fed in slices and has no bound.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.loop_period_secs == 0 {
            return Err("loop_period_secs must be > 0");
        }
        if self.prescale <= 0 {
            return Err("prescale must be > 0");
        }
        if self.watchdog_timeout_ms == 0 {
            return Err("watchdog_timeout_ms must be > 0");
        }
        let mut budget = self.loop_period();
        if self.network_enabled {
            if self.remote().is_none() {
                return Err("remote_addr is not a valid IPv6 address");
            }
            if self.remote_port == 0 {
                return Err("remote_port must be > 0");
            }
            if self.send_timeout_ms == 0 {
                return Err("send_timeout_ms must be > 0");
            }
            if self.connect_timeout_ms == 0 {
                return Err("connect_timeout_ms must be > 0");
            }
            // Startup feeds right before connecting; the connect itself is
            // one unfed window.
            if self.connect_timeout() >= self.watchdog_timeout() {
                return Err("connect timeout exceeds watchdog timeout");
            }
            budget += self.send_timeout();
        }
        if budget >= self.watchdog_timeout() {
            return Err("loop period plus send timeout exceeds watchdog timeout");
        }
        Ok(())
    }
}
