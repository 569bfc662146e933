//! ACK Manager module - stop-and-wait reliability
//!
//! Sends one frame, waits for its acknowledgment and retransmits on NACK,
//! silence or a damaged reply. Every attempt gets a short sub-timeout; the
//! caller's overall deadline bounds the whole loop.

use std::time::Instant;

use tracing::{trace, warn};

use crate::deadline::Deadline;
use crate::errors::{Result, SprotError};
use crate::frame::{encode_control, ControlFrame, CONTROL_FRAME_SIZE};
use crate::transport::{Transport, TransportError};

/// Reply observed while waiting for an acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Ack,
    Nack,
    /// Timeout, wrong size, bad checksum or an unexpected frame
    Missing,
}

/// Retry budget and per-attempt timing for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Transmissions per frame before giving up
    pub max_attempts: u32,

    /// Sub-timeout of the first attempt
    pub ack_timeout_ms: u64,

    /// Growth factor of the sub-timeout per attempt; 1 keeps it fixed
    pub backoff_multiplier: u64,

    /// Upper bound of the sub-timeout
    pub max_ack_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::MAX_SEND_ATTEMPTS,
            ack_timeout_ms: crate::ACK_TIMEOUT_MS,
            backoff_multiplier: 1,
            max_ack_timeout_ms: crate::ACK_TIMEOUT_MS * 10,
        }
    }
}

/// ACK Manager - acknowledgment and retransmission logic
///
/// Stateless; the transport and the retry policy are passed in.
pub struct AckManager;

impl AckManager {
    /// Send a single control frame once
    ///
    /// Used by the receive path to answer frames. Replies are never retried;
    /// the peer retransmits if the reply is lost.
    pub fn send_control<T: Transport + ?Sized>(
        transport: &mut T,
        kind: ControlFrame,
        timeout_ms: u64,
    ) -> Result<()> {
        let frame = encode_control(kind);
        let written = transport
            .write(&frame, timeout_ms)
            .map_err(|e| SprotError::WriteFailed(format!("{:?} reply: {}", kind, e)))?;
        if written != frame.len() {
            return Err(SprotError::WriteFailed(format!(
                "{:?} reply: {} of {} bytes written",
                kind,
                written,
                frame.len()
            )));
        }
        trace!(reply = ?kind, "frame out");
        Ok(())
    }

    pub fn send_ack<T: Transport + ?Sized>(transport: &mut T, timeout_ms: u64) -> Result<()> {
        Self::send_control(transport, ControlFrame::Ack, timeout_ms)
    }

    pub fn send_nack<T: Transport + ?Sized>(transport: &mut T, timeout_ms: u64) -> Result<()> {
        Self::send_control(transport, ControlFrame::Nack, timeout_ms)
    }

    /// Wait up to `timeout_ms` for the peer's verdict on the last frame
    ///
    /// Only an exact 2-byte control frame with a valid checksum counts as a reply.
    pub fn wait_for_ack<T: Transport + ?Sized>(
        transport: &mut T,
        buffer: &mut [u8],
        timeout_ms: u64,
    ) -> std::result::Result<AckStatus, TransportError> {
        let received = match transport.read(buffer, timeout_ms) {
            Ok(received) => received,
            Err(TransportError::Timeout) => return Ok(AckStatus::Missing),
            Err(e) => return Err(e),
        };

        let reply = &buffer[..received];
        if reply.len() != CONTROL_FRAME_SIZE || !crate::crc::crc_check(reply) {
            return Ok(AckStatus::Missing);
        }

        Ok(match ControlFrame::from_byte(reply[0]) {
            Some(ControlFrame::Ack) => AckStatus::Ack,
            Some(ControlFrame::Nack) => AckStatus::Nack,
            _ => AckStatus::Missing,
        })
    }

    /// Sub-timeout for a given attempt
    ///
    /// Formula: min(base_ms * multiplier ^ attempt, max_delay_ms)
    pub fn calculate_backoff_ms(
        attempt: u32,
        base_ms: u64,
        multiplier: u64,
        max_delay_ms: u64,
    ) -> u64 {
        let backoff = base_ms.saturating_mul(multiplier.saturating_pow(attempt));
        backoff.min(max_delay_ms)
    }

    /// Transmit `frame` until acknowledged
    ///
    /// Returns the number of transmissions used.
    ///
    /// # Errors
    /// - `Timeout` once `deadline` passes, whatever attempts remain
    /// - `WriteFailed` when the retry budget is spent
    pub fn send_reliable<T: Transport + ?Sized>(
        transport: &mut T,
        frame: &[u8],
        policy: &RetryPolicy,
        deadline: &Deadline,
    ) -> Result<u32> {
        let mut state = RetransmissionState::new();
        let mut reply = [0u8; 256];

        while !state.is_exhausted(policy) {
            deadline.check()?;

            let timeout_ms = deadline.clamp_ms(state.next_timeout_ms(policy));
            state.record_attempt();

            match transport.write(frame, timeout_ms) {
                Ok(written) if written == frame.len() => {}
                Ok(written) => {
                    warn!(attempt = state.attempt, written, len = frame.len(), "short write");
                    continue;
                }
                Err(e) => {
                    warn!(attempt = state.attempt, error = %e, "frame write failed");
                    continue;
                }
            }

            match Self::wait_for_ack(transport, &mut reply, timeout_ms) {
                Ok(AckStatus::Ack) => {
                    trace!(attempt = state.attempt, rtt_us = state.elapsed_us(), "acknowledged");
                    return Ok(state.attempt);
                }
                Ok(status) => {
                    warn!(attempt = state.attempt, ?status, len = frame.len(), "no ACK, retransmitting");
                }
                Err(e) => {
                    warn!(attempt = state.attempt, error = %e, "reading ACK failed");
                }
            }
        }

        deadline.check()?;
        Err(SprotError::WriteFailed(format!(
            "frame of {} bytes not acknowledged after {} attempts",
            frame.len(),
            state.attempt
        )))
    }
}

/// Retransmission state tracker
///
/// Attempt counter for a single frame.
#[derive(Debug, Clone)]
pub struct RetransmissionState {
    /// Transmissions made so far
    pub attempt: u32,

    /// Time of the first transmission
    pub started: Instant,
}

impl RetransmissionState {
    pub fn new() -> Self {
        Self { attempt: 0, started: Instant::now() }
    }

    pub fn record_attempt(&mut self) {
        self.attempt += 1;
    }

    /// Sub-timeout for the upcoming attempt
    pub fn next_timeout_ms(&self, policy: &RetryPolicy) -> u64 {
        AckManager::calculate_backoff_ms(
            self.attempt,
            policy.ack_timeout_ms,
            policy.backoff_multiplier,
            policy.max_ack_timeout_ms,
        )
    }

    pub fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempt >= policy.max_attempts
    }

    pub fn elapsed_us(&self) -> u64 {
        self.started.elapsed().as_micros() as u64
    }
}

impl Default for RetransmissionState {
    fn default() -> Self {
        Self::new()
    }
}
