//! Transport abstraction: any byte-oriented outbound channel.
//!
//! The reporter is generic over `Transport`, so the loop can be exercised
//! with an in-memory link in tests and a TCP socket on the device.
//!
//! [`TcpTransport`] uses `std::net`, which ESP-IDF backs with lwIP; the same
//! code runs on the host.

use core::net::SocketAddr;
use core::time::Duration;
use std::io::{self, Write};
use std::net::TcpStream;

use log::info;

use crate::error::TransportError;

/// Byte-oriented outbound channel.
pub trait Transport {
    /// Write `data` with a single send call.
    /// Returns the number of bytes the peer's socket accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;
}

/// Long-lived TCP stream to the collector.
///
/// Every write is bounded by the send timeout, so an unresponsive peer
/// cannot hold the sampling loop past its watchdog window.
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    pub fn connect(
        peer: SocketAddr,
        connect_timeout: Duration,
        send_timeout: Duration,
    ) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(&peer, connect_timeout)?;
        Self::from_stream(stream, send_timeout)
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream, send_timeout: Duration) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        stream.set_write_timeout(Some(send_timeout))?;
        stream.set_nodelay(true)?;
        info!("TCP: connected to {} (send timeout {:?})", peer, send_timeout);
        Ok(Self { stream, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.stream.write(data).map_err(map_io_error)
    }
}

fn map_io_error(e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::TimedOut,
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::WriteZero => TransportError::Closed,
        _ => TransportError::Io,
    }
}
