#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Reproducible pseudo-random message
pub fn message(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen()).collect()
}

pub struct ThroughputStats {
    pub total_bytes: u64,
    pub total_time_ms: u64,
    pub throughput_mbps: f64,
    pub messages_per_sec: f64,
}

impl ThroughputStats {
    pub fn compute(total_bytes: u64, total_time_ms: u64, message_count: u64) -> Self {
        let elapsed_ms = total_time_ms.max(1) as f64;
        Self {
            total_bytes,
            total_time_ms,
            throughput_mbps: (total_bytes as f64 * 8.0) / (elapsed_ms * 1000.0),
            messages_per_sec: (message_count as f64 * 1000.0) / elapsed_ms,
        }
    }

    pub fn report(&self) -> String {
        format!(
            "THROUGHPUT:\n  Total Bytes: {}\n  Duration: {}ms\n  Throughput: {:.2} Mbps\n  Messages/sec: {:.0}",
            self.total_bytes, self.total_time_ms, self.throughput_mbps, self.messages_per_sec
        )
    }
}
