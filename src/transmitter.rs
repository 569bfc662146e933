//! Transmitter module - send path
//!
//! Splits a message into frames and pushes each one through the
//! stop-and-wait exchange. A message that fits one data frame travels alone;
//! anything larger is wrapped in SEQ_BEGIN / SEQ_END.

use std::time::Instant;

use tracing::debug;

use crate::ack_manager::{AckManager, RetryPolicy};
use crate::deadline::Deadline;
use crate::errors::Result;
use crate::frame::{ControlFrame, Frame};
use crate::transport::Transport;

/// Transmitter - turns messages into acknowledged frames
///
/// Stateless; sequence numbers restart at 1 for every message.
pub struct Transmitter;

impl Transmitter {
    /// Frames needed to carry `message` with `payload_capacity` bytes per data frame
    ///
    /// # Returns
    /// - nothing for an empty message
    /// - one data frame with sequence 1 when the message fits
    /// - SEQ_BEGIN, data frames 1..=N, SEQ_END otherwise
    pub fn plan(message: &[u8], payload_capacity: usize) -> Vec<Frame<'_>> {
        if message.is_empty() {
            return Vec::new();
        }

        if message.len() <= payload_capacity {
            return vec![Frame::Data { sequence: 1, payload: message }];
        }

        let chunks = message.chunks(payload_capacity);
        let mut frames = Vec::with_capacity(chunks.len() + 2);
        frames.push(Frame::Control(ControlFrame::SeqBegin));
        let mut sequence = 0u8;
        for payload in chunks {
            sequence = sequence.wrapping_add(1);
            frames.push(Frame::Data { sequence, payload });
        }
        frames.push(Frame::Control(ControlFrame::SeqEnd));
        frames
    }

    /// Deliver `message` to the peer, one acknowledged frame at a time
    ///
    /// # Arguments
    /// * `transport` - link to the peer
    /// * `message` - bytes to deliver
    /// * `payload_capacity` - data bytes per frame (MTU minus framing overhead)
    /// * `policy` - per-frame retry budget
    /// * `deadline` - bound for the whole message
    pub fn send_message<T: Transport + ?Sized>(
        transport: &mut T,
        message: &[u8],
        payload_capacity: usize,
        policy: &RetryPolicy,
        deadline: &Deadline,
    ) -> Result<TransmitMetrics> {
        let start = Instant::now();
        let mut metrics = TransmitMetrics::default();

        for frame in Self::plan(message, payload_capacity) {
            let encoded = frame.encode();
            let attempts = AckManager::send_reliable(transport, &encoded, policy, deadline)?;

            metrics.frames_sent += 1;
            metrics.retransmissions += u64::from(attempts.saturating_sub(1));
            if let Frame::Data { payload, .. } = frame {
                metrics.bytes_sent += payload.len() as u64;
            }
        }

        metrics.total_us = start.elapsed().as_micros() as u64;
        debug!(
            len = message.len(),
            frames = metrics.frames_sent,
            retransmissions = metrics.retransmissions,
            "message sent"
        );
        Ok(metrics)
    }
}

/// TransmitterBuilder - Fluent interface for send-side configuration
///
/// Collects the MTU and retry settings used by the engine's write path.
#[derive(Debug, Clone)]
pub struct TransmitterBuilder {
    mtu: usize,
    policy: RetryPolicy,
}

impl TransmitterBuilder {
    /// Create a new TransmitterBuilder with defaults
    pub fn new() -> Self {
        Self {
            mtu: crate::DEFAULT_MTU,
            policy: RetryPolicy::default(),
        }
    }

    /// Set the largest encoded data frame, framing overhead included
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set transmissions per frame
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts;
        self
    }

    /// Set the per-attempt ACK timeout in milliseconds
    pub fn with_ack_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.policy.ack_timeout_ms = timeout_ms;
        self
    }

    /// Grow the ACK timeout by `multiplier` per attempt, capped at `max_ms`
    pub fn with_backoff(mut self, multiplier: u64, max_ms: u64) -> Self {
        self.policy.backoff_multiplier = multiplier;
        self.policy.max_ack_timeout_ms = max_ms;
        self
    }

    /// Get the configured MTU
    pub fn get_mtu(&self) -> usize {
        self.mtu
    }

    /// Get the configured retry policy
    pub fn get_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub(crate) fn into_parts(self) -> (usize, RetryPolicy) {
        (self.mtu, self.policy)
    }
}

impl Default for TransmitterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Performance metrics for one sent message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmitMetrics {
    /// Frames acknowledged by the peer, control frames included
    pub frames_sent: u64,

    /// Transmissions beyond the first for all frames
    pub retransmissions: u64,

    /// Payload bytes delivered
    pub bytes_sent: u64,

    /// Total operation time in microseconds
    pub total_us: u64,
}
