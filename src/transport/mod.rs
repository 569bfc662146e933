//! Transport contract consumed by the protocol engine
//!
//! A transport moves whole byte buffers with a per-call timeout and promises
//! nothing about ordering, integrity or delivery. Timeouts are in
//! milliseconds; [`crate::INFINITE_WAIT`] blocks without limit.

use std::io;

use thiserror::Error;

pub mod lossy;
pub mod memory;
pub mod scripted;
pub mod udp;

pub use lossy::{LossStats, LossyTransport};
pub use memory::MemoryTransport;
pub use scripted::ScriptedTransport;
pub use udp::UdpTransport;

/// Failure of a single transport call
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport operation timed out")]
    Timeout,

    #[error("transport link closed")]
    Closed,

    #[error("transport I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(err),
        }
    }
}

/// Raw, timeout-bounded packet I/O
pub trait Transport {
    /// Receive one buffer into `buf`, waiting at most `timeout_ms`
    ///
    /// Returns the number of bytes stored. Input longer than `buf` is truncated.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError>;

    /// Send `buf` as one unit, waiting at most `timeout_ms`
    fn write(&mut self, buf: &[u8], timeout_ms: u64) -> Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError> {
        (**self).read(buf, timeout_ms)
    }

    fn write(&mut self, buf: &[u8], timeout_ms: u64) -> Result<usize, TransportError> {
        (**self).write(buf, timeout_ms)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError> {
        (**self).read(buf, timeout_ms)
    }

    fn write(&mut self, buf: &[u8], timeout_ms: u64) -> Result<usize, TransportError> {
        (**self).write(buf, timeout_ms)
    }
}
