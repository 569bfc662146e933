//! Fault-injecting transport decorator
//!
//! Drops or corrupts outbound buffers with fixed probabilities so the
//! retransmission paths can be exercised against a real peer. The random
//! source is seeded, which keeps every run reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use super::{Transport, TransportError};

/// What the decorator has done to outbound traffic so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LossStats {
    pub passed: u64,
    pub dropped: u64,
    pub corrupted: u64,
}

/// Wraps a transport and damages its outbound traffic
#[derive(Debug)]
pub struct LossyTransport<T> {
    inner: T,
    rng: StdRng,
    drop_rate: f64,
    corrupt_rate: f64,
    stats: LossStats,
}

impl<T: Transport> LossyTransport<T> {
    pub fn new(inner: T, seed: u64) -> Self {
        Self {
            inner,
            rng: StdRng::seed_from_u64(seed),
            drop_rate: 0.0,
            corrupt_rate: 0.0,
            stats: LossStats::default(),
        }
    }

    /// Probability that a written buffer silently vanishes
    pub fn with_drop_rate(mut self, rate: f64) -> Self {
        self.drop_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Probability that a written buffer arrives with one bit flipped
    pub fn with_corrupt_rate(mut self, rate: f64) -> Self {
        self.corrupt_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn stats(&self) -> LossStats {
        self.stats
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Transport> Transport for LossyTransport<T> {
    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError> {
        self.inner.read(buf, timeout_ms)
    }

    fn write(&mut self, buf: &[u8], timeout_ms: u64) -> Result<usize, TransportError> {
        if buf.is_empty() {
            return self.inner.write(buf, timeout_ms);
        }

        if self.rng.gen_bool(self.drop_rate) {
            self.stats.dropped += 1;
            trace!(len = buf.len(), "dropping outbound buffer");
            return Ok(buf.len());
        }

        if self.rng.gen_bool(self.corrupt_rate) {
            self.stats.corrupted += 1;
            let mut damaged = buf.to_vec();
            let index = self.rng.gen_range(0..damaged.len());
            let bit = self.rng.gen_range(0..8u8);
            damaged[index] ^= 1 << bit;
            trace!(len = buf.len(), index, bit, "corrupting outbound buffer");
            return self.inner.write(&damaged, timeout_ms);
        }

        self.stats.passed += 1;
        self.inner.write(buf, timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc_check;
    use crate::frame::encode_data;
    use crate::transport::ScriptedTransport;

    #[test]
    fn test_passthrough_by_default() {
        let mut lossy = LossyTransport::new(ScriptedTransport::new(), 1);
        for _ in 0..10 {
            lossy.write(&[1, 2, 3], 10).unwrap();
        }
        assert_eq!(lossy.stats(), LossStats { passed: 10, dropped: 0, corrupted: 0 });
        assert_eq!(lossy.inner().written().len(), 10);
    }

    #[test]
    fn test_drop_everything() {
        let mut lossy = LossyTransport::new(ScriptedTransport::new(), 2).with_drop_rate(1.0);
        assert_eq!(lossy.write(&[1, 2, 3], 10).unwrap(), 3);
        assert_eq!(lossy.stats().dropped, 1);
        assert!(lossy.into_inner().written().is_empty());
    }

    #[test]
    fn test_corruption_breaks_checksum() {
        let mut lossy =
            LossyTransport::new(ScriptedTransport::new(), 3).with_corrupt_rate(1.0);
        for seq in 1..=20u8 {
            lossy.write(&encode_data(seq, b"payload"), 10).unwrap();
        }
        assert_eq!(lossy.stats().corrupted, 20);
        assert!(lossy.inner().written().iter().all(|frame| !crc_check(frame)));
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let run = |seed| {
            let mut lossy = LossyTransport::new(ScriptedTransport::new(), seed)
                .with_drop_rate(0.3)
                .with_corrupt_rate(0.3);
            for _ in 0..100 {
                lossy.write(&[0xaa; 8], 10).unwrap();
            }
            lossy.stats()
        };
        assert_eq!(run(42), run(42));
    }
}
