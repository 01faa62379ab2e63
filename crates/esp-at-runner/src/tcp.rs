//! TCP transport and wall-clock time.
//!
//! ESP-AT modules are usually wired to a UART; this module reaches one through
//! a serial-to-TCP bridge (ser2net, an ESP-Link, or a simulator exposing the
//! UART on a port). Bytes are passed through untouched.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use esp_at_protocol::{Clock, Transport, TransportError};
use tracing::{debug, trace};

/// Size of each read from the socket.
const READ_CHUNK: usize = 1024;

/// Back-off while the socket's send buffer is full.
const WRITE_BACKOFF: Duration = Duration::from_millis(1);

/// How long a write may make no progress before it fails.
pub const DEFAULT_WRITE_STALL_TIMEOUT: Duration = Duration::from_millis(500);

// ============================================================================
// Transport
// ============================================================================

/// A non-blocking TCP connection to a module's UART bridge.
///
/// Reads never block. A write waits on the calling thread while the send
/// buffer is full, for at most the stall timeout without progress.
pub struct TcpTransport {
    stream: TcpStream,
    closed: bool,
    write_stall_timeout: Duration,
}

impl TcpTransport {
    /// Connect to `address` (`host:port`), trying each resolved address.
    pub fn connect(address: &str, timeout: Duration) -> io::Result<Self> {
        let mut last_error = None;
        for addr in address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    debug!(%addr, "connected to module bridge");
                    return Self::from_stream(stream);
                }
                Err(e) => {
                    debug!(%addr, "connect failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                ErrorKind::AddrNotAvailable,
                format!("{} did not resolve to any address", address),
            )
        }))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(TcpTransport {
            stream,
            closed: false,
            write_stall_timeout: DEFAULT_WRITE_STALL_TIMEOUT,
        })
    }

    /// Fail a write that makes no progress for `timeout`.
    pub fn with_write_stall_timeout(mut self, timeout: Duration) -> Self {
        self.write_stall_timeout = timeout;
        self
    }

    /// Whether the peer has closed the connection.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Transport for TcpTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let mut written = 0;
        let mut stalled_since: Option<Instant> = None;
        while written < data.len() {
            match self.stream.write(&data[written..]) {
                Ok(0) => {
                    self.closed = true;
                    return Err(TransportError::Closed);
                }
                Ok(n) => {
                    written += n;
                    stalled_since = None;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    let since = *stalled_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= self.write_stall_timeout {
                        return Err(io::Error::new(
                            ErrorKind::TimedOut,
                            format!("write stalled after {} of {} bytes", written, data.len()),
                        )
                        .into());
                    }
                    thread::sleep(WRITE_BACKOFF);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        trace!("wrote {} bytes", data.len());
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let mut received = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.closed = true;
                    // Hand over what arrived before the close; report it next time.
                    if received.is_empty() {
                        return Err(TransportError::Closed);
                    }
                    break;
                }
                Ok(n) => received.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        if !received.is_empty() {
            trace!("read {} bytes", received.len());
        }
        Ok(received)
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Monotonic time since creation, sleeping the calling thread.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn sleep_ms(&self, ms: u64) {
        if ms > 0 {
            thread::sleep(Duration::from_millis(ms));
        }
    }
}
