//! Process-wide event flags.
//!
//! A small bitmask that producers set and the sampling loop consumes with a
//! bounded wait. The same primitive carries two kinds of signal:
//!
//! - **Button events** ([`PRESS`]): posted by the button listener from the
//!   debouncer thread, consumed with [`EventFlags::wait_any`] (clear-on-read).
//! - **Network readiness** ([`crate::net::readiness`]): a level that the
//!   stack adapter sets and clears, observed with [`EventFlags::wait_all`].
//!
//! ```text
//! ┌──────────────────┐ post(PRESS) ┌────────────┐ wait_any(PRESS, period) ┌───────────┐
//! │ Button debouncer │────────────▶│ EventFlags │◀────────────────────────│ Main loop │
//! └──────────────────┘             └────────────┘                         └───────────┘
//! ```
//!
//! Bits are a pure OR-accumulator: two posts before a wait are observed as
//! one. The bit value is merged atomically, so `post` never loses a set that
//! races with a consuming `wait_any`.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Bitmask carried by [`EventFlags`].
pub type EventBits = u32;

/// A button press was observed since the last consuming wait.
pub const PRESS: EventBits = 1 << 0;

/// Atomic bitmask with timed waits.
pub struct EventFlags {
    bits: AtomicU32,
    lock: Mutex<()>,
    changed: Condvar,
}

impl Default for EventFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFlags {
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
            lock: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    /// Merge `bits` into the flags and wake any waiter.
    pub fn post(&self, bits: EventBits) {
        if bits == 0 {
            return;
        }
        self.bits.fetch_or(bits, Ordering::AcqRel);
        // Notify under the lock so a waiter between its check and its
        // condvar wait cannot miss this post.
        let _guard = self.guard();
        self.changed.notify_all();
    }

    /// Clear `bits` without waking anyone (readiness lost, etc).
    pub fn clear(&self, bits: EventBits) {
        self.bits.fetch_and(!bits, Ordering::AcqRel);
    }

    /// Current flags, without consuming them.
    pub fn peek(&self) -> EventBits {
        self.bits.load(Ordering::Acquire)
    }

    /// Atomically clear the bits of `mask` and return the ones that were set.
    pub fn take(&self, mask: EventBits) -> EventBits {
        self.bits.fetch_and(!mask, Ordering::AcqRel) & mask
    }

    /// Block until any bit of `mask` is set or `timeout` elapses.
    ///
    /// Returns the observed bits (zero on timeout) and clears them.
    pub fn wait_any(&self, mask: EventBits, timeout: Duration) -> EventBits {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.guard();
        loop {
            let observed = self.take(mask);
            if observed != 0 {
                return observed;
            }
            match self.park(guard, deadline) {
                Some(g) => guard = g,
                None => return self.take(mask),
            }
        }
    }

    /// Block until every bit of `mask` is set. Bits are not cleared.
    ///
    /// `None` waits forever. On timeout returns the subset that was set.
    pub fn wait_all(&self, mask: EventBits, timeout: Option<Duration>) -> Result<(), EventBits> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let unbounded = timeout.is_none();
        let mut guard = self.guard();
        loop {
            let current = self.peek() & mask;
            if current == mask {
                return Ok(());
            }
            if unbounded {
                guard = self
                    .changed
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            }
            match self.park(guard, deadline) {
                Some(g) => guard = g,
                None if self.peek() & mask == mask => return Ok(()),
                None => return Err(self.peek() & mask),
            }
        }
    }

    /// Sleep on the condvar until woken or `deadline`. `None` once the
    /// deadline has passed.
    fn park<'a>(
        &self,
        guard: MutexGuard<'a, ()>,
        deadline: Option<Instant>,
    ) -> Option<MutexGuard<'a, ()>> {
        let Some(deadline) = deadline else {
            // Timeout too large to represent: treat as unbounded.
            return Some(
                self.changed
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
            );
        };
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        let (guard, _) = self
            .changed
            .wait_timeout(guard, deadline - now)
            .unwrap_or_else(PoisonError::into_inner);
        Some(guard)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
