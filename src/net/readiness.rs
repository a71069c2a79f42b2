//! Network-stack readiness.
//!
//! The stack adapter keeps three level bits in an [`EventFlags`] up to date
//! from its state-change callbacks. Startup blocks until all three are set.

use core::net::Ipv6Addr;
use core::time::Duration;
use std::time::Instant;

use log::{info, warn};

use crate::events::{EventBits, EventFlags};

/// The node has a Thread role (child, router or leader).
pub const ROLE_SET: EventBits = 1 << 0;
/// A routable (non link-local) IPv6 address is configured.
pub const ROUTABLE_ADDR_SET: EventBits = 1 << 1;
/// At least one neighbor is in the table.
pub const HAS_NEIGHBORS: EventBits = 1 << 2;

/// Composite condition gating the sampling loop.
pub const READY: EventBits = ROLE_SET | ROUTABLE_ADDR_SET | HAS_NEIGHBORS;

/// Block until [`READY`]. `None` waits forever.
///
/// On timeout returns the bits that were missing.
pub fn wait_until_ready(status: &EventFlags, timeout: Option<Duration>) -> Result<(), EventBits> {
    wait_until_ready_with(status, timeout, Duration::MAX, || {})
}

/// As [`wait_until_ready`], but wakes at least every `slice` to run `tick`
/// (the startup path feeds the watchdog there).
pub fn wait_until_ready_with(
    status: &EventFlags,
    timeout: Option<Duration>,
    slice: Duration,
    mut tick: impl FnMut(),
) -> Result<(), EventBits> {
    info!("waiting for network stack to be ready (bound: {:?})", timeout);
    let started = Instant::now();
    loop {
        let step = match timeout {
            Some(bound) => bound.saturating_sub(started.elapsed()).min(slice),
            None => slice,
        };
        let present = match status.wait_all(READY, Some(step)) {
            Ok(()) => return Ok(()),
            Err(present) => present,
        };
        tick();
        if timeout.is_some_and(|bound| started.elapsed() >= bound) {
            let missing = READY & !present;
            warn!("network not ready, missing {}", describe(missing));
            return Err(missing);
        }
    }
}

/// What the stack adapter observed on one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackSnapshot {
    /// Role is child, router or leader.
    pub attached: bool,
    pub addresses: heapless::Vec<Ipv6Addr, 8>,
    pub neighbors: usize,
}

/// Link-local and loopback addresses do not count as routable.
pub fn is_routable(addr: &Ipv6Addr) -> bool {
    !(addr.is_loopback() || addr.is_unspecified() || addr.is_unicast_link_local())
}

/// Readiness bits implied by `snapshot`.
pub fn evaluate(snapshot: &StackSnapshot) -> EventBits {
    let mut bits = 0;
    if snapshot.attached {
        bits |= ROLE_SET;
    }
    if snapshot.addresses.iter().any(is_routable) {
        bits |= ROUTABLE_ADDR_SET;
    }
    if snapshot.neighbors > 0 {
        bits |= HAS_NEIGHBORS;
    }
    bits
}

/// Make the readiness bits in `status` match `bits`: set what is present,
/// clear what was lost.
pub fn publish(status: &EventFlags, bits: EventBits) {
    let lost = READY & !bits;
    if lost != 0 {
        status.clear(lost);
    }
    if bits & READY != 0 {
        status.post(bits & READY);
    }
}

/// Human-readable list of readiness bits, for logs.
pub fn describe(bits: EventBits) -> heapless::String<48> {
    let mut out = heapless::String::new();
    for (bit, name) in [
        (ROLE_SET, "role"),
        (ROUTABLE_ADDR_SET, "routable-addr"),
        (HAS_NEIGHBORS, "neighbors"),
    ] {
        if bits & bit != 0 {
            if !out.is_empty() {
                let _ = out.push('|');
            }
            let _ = out.push_str(name);
        }
    }
    if out.is_empty() {
        let _ = out.push_str("none");
    }
    out
}
