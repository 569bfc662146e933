//! In-process datagram link
//!
//! Two connected endpoints exchanging whole buffers over channels. Useful for
//! running both ends of the protocol inside one process.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use super::{Transport, TransportError};
use crate::INFINITE_WAIT;

/// One end of an in-memory link
#[derive(Debug)]
pub struct MemoryTransport {
    outbound: Sender<Vec<u8>>,
    inbound: Receiver<Vec<u8>>,
}

impl MemoryTransport {
    /// Create two endpoints wired to each other
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = unbounded();
        let (b_tx, a_rx) = unbounded();
        (
            Self { outbound: a_tx, inbound: a_rx },
            Self { outbound: b_tx, inbound: b_rx },
        )
    }

    /// Buffers waiting to be read on this end
    pub fn queued(&self) -> usize {
        self.inbound.len()
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError> {
        let bytes = if timeout_ms == INFINITE_WAIT {
            self.inbound.recv().map_err(|_| TransportError::Closed)?
        } else {
            self.inbound
                .recv_timeout(Duration::from_millis(timeout_ms))
                .map_err(|err| match err {
                    RecvTimeoutError::Timeout => TransportError::Timeout,
                    RecvTimeoutError::Disconnected => TransportError::Closed,
                })?
        };
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    fn write(&mut self, buf: &[u8], _timeout_ms: u64) -> Result<usize, TransportError> {
        self.outbound
            .send(buf.to_vec())
            .map_err(|_| TransportError::Closed)?;
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_exchange() {
        let (mut a, mut b) = MemoryTransport::pair();
        a.write(&[1, 2, 3], 10).unwrap();
        assert_eq!(b.queued(), 1);

        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf, 10).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);

        b.write(&[4], 10).unwrap();
        assert_eq!(a.read(&mut buf, INFINITE_WAIT).unwrap(), 1);
        assert_eq!(buf[0], 4);
    }

    #[test]
    fn test_read_timeout() {
        let (mut a, _b) = MemoryTransport::pair();
        let mut buf = [0u8; 8];
        assert!(matches!(a.read(&mut buf, 5), Err(TransportError::Timeout)));
    }

    #[test]
    fn test_closed_peer() {
        let (mut a, b) = MemoryTransport::pair();
        drop(b);
        let mut buf = [0u8; 8];
        assert!(matches!(a.read(&mut buf, 5), Err(TransportError::Closed)));
        assert!(matches!(a.write(&[1], 5), Err(TransportError::Closed)));
    }
}
