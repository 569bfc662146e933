//! Deterministic transport for exercising the protocol without a peer
//!
//! Inbound traffic is a queue of scripted events; outbound frames are
//! recorded for inspection.

use std::collections::VecDeque;

use super::{Transport, TransportError};

/// One scripted inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedRead {
    Frame(Vec<u8>),
    Timeout,
}

/// Scripted transport double
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    reads: VecDeque<ScriptedRead>,
    default_reply: Option<Vec<u8>>,
    failing_writes: usize,
    written: Vec<Vec<u8>>,
    read_timeouts: Vec<u64>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound buffer
    pub fn then_read(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.reads.push_back(ScriptedRead::Frame(bytes.into()));
        self
    }

    /// Queue an inbound timeout
    pub fn then_timeout(mut self) -> Self {
        self.reads.push_back(ScriptedRead::Timeout);
        self
    }

    /// Buffer returned by every read once the script is exhausted
    pub fn with_default_reply(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.default_reply = Some(bytes.into());
        self
    }

    /// Make the next `count` writes fail with a timeout
    pub fn with_failing_writes(mut self, count: usize) -> Self {
        self.failing_writes = count;
        self
    }

    /// Every buffer successfully written so far
    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }

    /// Timeouts passed to each read call, in order
    pub fn read_timeouts(&self) -> &[u64] {
        &self.read_timeouts
    }

    pub fn remaining_reads(&self) -> usize {
        self.reads.len()
    }
}

impl Transport for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError> {
        self.read_timeouts.push(timeout_ms);
        let bytes = match self.reads.pop_front() {
            Some(ScriptedRead::Frame(bytes)) => bytes,
            Some(ScriptedRead::Timeout) => return Err(TransportError::Timeout),
            None => match &self.default_reply {
                Some(reply) => reply.clone(),
                None => return Err(TransportError::Closed),
            },
        };
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    fn write(&mut self, buf: &[u8], _timeout_ms: u64) -> Result<usize, TransportError> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(TransportError::Timeout);
        }
        self.written.push(buf.to_vec());
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_order() {
        let mut transport = ScriptedTransport::new()
            .then_read(vec![1, 2])
            .then_timeout()
            .with_default_reply(vec![9]);
        let mut buf = [0u8; 4];

        assert_eq!(transport.read(&mut buf, 5).unwrap(), 2);
        assert_eq!(&buf[..2], &[1, 2]);
        assert!(matches!(transport.read(&mut buf, 6), Err(TransportError::Timeout)));
        assert_eq!(transport.read(&mut buf, 7).unwrap(), 1);
        assert_eq!(buf[0], 9);
        assert_eq!(transport.read_timeouts(), &[5, 6, 7]);
    }

    #[test]
    fn test_exhausted_script_closes() {
        let mut transport = ScriptedTransport::new();
        let mut buf = [0u8; 4];
        assert!(matches!(transport.read(&mut buf, 1), Err(TransportError::Closed)));
    }

    #[test]
    fn test_failing_writes() {
        let mut transport = ScriptedTransport::new().with_failing_writes(1);
        assert!(transport.write(&[1], 1).is_err());
        assert_eq!(transport.write(&[2], 1).unwrap(), 1);
        assert_eq!(transport.written(), &[vec![2]]);
    }

    #[test]
    fn test_truncates_to_buffer() {
        let mut transport = ScriptedTransport::new().then_read(vec![1, 2, 3, 4]);
        let mut buf = [0u8; 2];
        assert_eq!(transport.read(&mut buf, 1).unwrap(), 2);
    }
}
