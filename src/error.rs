//! Error types for the BattNode firmware.
//!
//! Two tiers, matching how the firmware reacts to them:
//!
//! - **Steady-state** errors ([`SampleError`], [`ConversionError`],
//!   [`SendError`]) are logged by the sampling loop and the affected step is
//!   skipped. None of them may suppress the watchdog feed.
//! - **Startup** errors ([`StartupError`]) abort the process before the loop
//!   runs. Every failure site maps to its own exit status.
//!
//! All variants are `Copy` so they can be passed through the loop and the
//! event sink without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// One ADC acquisition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleError {
    /// The converter is still busy with a previous sequence.
    Busy,
    /// The driver reported an I/O error (raw driver return code).
    Io(i32),
    /// The ADC controller is not ready.
    NotReady,
    /// The channel could not be configured (raw driver return code).
    ChannelSetup(i32),
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "ADC busy"),
            Self::Io(rc) => write!(f, "ADC read failed (rc={rc})"),
            Self::NotReady => write!(f, "ADC controller not ready"),
            Self::ChannelSetup(rc) => write!(f, "ADC channel setup failed (rc={rc})"),
        }
    }
}

/// Raw sample could not be turned into millivolts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionError {
    /// No calibration data is available for the channel.
    CalibrationUnavailable,
    /// Pre-scaling or the calibrated transform overflowed `i32`.
    Overflow,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CalibrationUnavailable => write!(f, "value in mV not available"),
            Self::Overflow => write!(f, "millivolt conversion overflow"),
        }
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Failures of the byte transport underneath the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The write did not complete within the configured send timeout.
    TimedOut,
    /// The peer closed or reset the connection.
    Closed,
    /// Any other socket error.
    Io,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => write!(f, "timed out"),
            Self::Closed => write!(f, "connection closed"),
            Self::Io => write!(f, "socket error"),
        }
    }
}

/// A measurement could not be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The transport rejected the write.
    Transport(TransportError),
    /// Fewer bytes than a full measurement were accepted.
    ShortWrite { written: usize },
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "send failed: {e}"),
            Self::ShortWrite { written } => write!(f, "short write ({written} of 4 bytes)"),
        }
    }
}

impl From<TransportError> for SendError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Collaborator errors (startup only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogError {
    /// No free channel on the watchdog device.
    NoChannel(i32),
    /// The watchdog device refused to start.
    StartFailed(i32),
}

impl fmt::Display for WatchdogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChannel(rc) => write!(f, "no watchdog channel (rc={rc})"),
            Self::StartFailed(rc) => write!(f, "watchdog start failed (rc={rc})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// The network stack failed to start.
    StackStart(i32),
    /// The TCP connection attempt failed.
    Connect,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackStart(rc) => write!(f, "network stack start failed (rc={rc})"),
            Self::Connect => write!(f, "connect failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleError(pub i32);

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "console suspend failed (rc={})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

/// Fatal bring-up failure. The process exits with [`exit_code`](Self::exit_code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupError {
    WatchdogChannel(WatchdogError),
    WatchdogStart(WatchdogError),
    AdcNotReady,
    AdcChannelSetup(SampleError),
    NetworkStart(NetworkError),
    /// Readiness did not arrive within the configured bound.
    NetworkNotReady { waited_secs: u32 },
    ConsoleSuspend(ConsoleError),
    InvalidAddress,
    Connect(NetworkError),
    Config(&'static str),
}

impl StartupError {
    /// Process exit status for this failure site. Never zero.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::WatchdogChannel(_) => 10,
            Self::WatchdogStart(_) => 11,
            Self::AdcNotReady => 20,
            Self::AdcChannelSetup(_) => 21,
            Self::NetworkStart(_) => 30,
            Self::NetworkNotReady { .. } => 31,
            Self::ConsoleSuspend(_) => 40,
            Self::InvalidAddress => 50,
            Self::Connect(_) => 51,
            Self::Config(_) => 60,
        }
    }
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WatchdogChannel(e) => write!(f, "could not allocate main watchdog channel: {e}"),
            Self::WatchdogStart(e) => write!(f, "could not start watchdog: {e}"),
            Self::AdcNotReady => write!(f, "ADC controller device not ready"),
            Self::AdcChannelSetup(e) => write!(f, "could not setup battery ADC: {e}"),
            Self::NetworkStart(e) => write!(f, "could not start network stack: {e}"),
            Self::NetworkNotReady { waited_secs } => {
                write!(f, "network stack not ready after {waited_secs}s")
            }
            Self::ConsoleSuspend(e) => write!(f, "could not suspend the console: {e}"),
            Self::InvalidAddress => write!(f, "invalid address / address not supported"),
            Self::Connect(e) => write!(f, "connect failed: {e}"),
            Self::Config(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for StartupError {}
