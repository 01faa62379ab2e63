//! Collaborators the engine is generic over: a byte transport and a clock.
//!
//! The engine never blocks inside either: `read_available` must return
//! immediately, and all waiting goes through [`Clock::sleep_ms`] so a
//! cooperative scheduler (or a test clock) stays in control of time.
//! `write` is the one exception: it may hold the caller while the link
//! drains, and must give up after a bounded stall.

use crate::error::TransportError;

/// Byte-oriented link to the modem (usually a UART).
pub trait Transport {
    /// Write all of `data` to the modem.
    ///
    /// May wait for the link to accept bytes, but not indefinitely.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Return whatever bytes are buffered right now.
    ///
    /// Must not block. Returns an empty vector when nothing is ready.
    fn read_available(&mut self) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data)
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        (**self).read_available()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data)
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        (**self).read_available()
    }
}

/// Monotonic millisecond clock with a cooperative sleep.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin. Never decreases.
    fn now_ms(&self) -> u64;

    /// Yield for `ms` milliseconds.
    fn sleep_ms(&self, ms: u64);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn sleep_ms(&self, ms: u64) {
        (**self).sleep_ms(ms)
    }
}
