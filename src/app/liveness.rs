//! Liveness keeper: owns the main loop's watchdog channel.

use core::time::Duration;

use log::{debug, info};

use crate::error::StartupError;

use super::ports::{WatchdogChannel, WatchdogPort};

pub struct LivenessKeeper<W> {
    watchdog: W,
    channel: WatchdogChannel,
    feeds: u64,
}

impl<W: WatchdogPort> LivenessKeeper<W> {
    /// Allocate a channel and arm the watchdog. Both failures are fatal.
    pub fn arm(mut watchdog: W, timeout: Duration) -> Result<Self, StartupError> {
        let channel = watchdog
            .allocate_channel(timeout)
            .map_err(StartupError::WatchdogChannel)?;
        watchdog.start().map_err(StartupError::WatchdogStart)?;
        info!("Watchdog: channel {} armed ({:?} timeout)", channel.0, timeout);
        Ok(Self {
            watchdog,
            channel,
            feeds: 0,
        })
    }

    /// Prove liveness.
    pub fn feed(&mut self) {
        debug!("feed watchdog (channel {})", self.channel.0);
        self.watchdog.feed(self.channel);
        self.feeds += 1;
    }

    pub fn channel(&self) -> WatchdogChannel {
        self.channel
    }

    pub fn feeds(&self) -> u64 {
        self.feeds
    }
}
