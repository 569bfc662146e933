use std::time::Instant;

use tracing::{debug, warn};

use crate::ack_manager::AckManager;
use crate::crc::crc_check;
use crate::deadline::Deadline;
use crate::errors::{Result, SprotError};
use crate::frame::{decode, ControlFrame};
use crate::state::{ExchangeState, Mode, Outcome};
use crate::transport::{Transport, TransportError};

/// How a receive loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Message,
    Switched(Mode),
}

pub struct Receiver;

impl Receiver {
    /// Read frames until a message completes or the peer switches our role
    pub fn receive<T: Transport + ?Sized>(
        transport: &mut T,
        state: &mut ExchangeState,
        frame_buf: &mut [u8],
        reply_timeout_ms: u64,
        deadline: &Deadline,
        metrics: &mut ReceiveMetrics,
    ) -> Result<Received> {
        let start = Instant::now();

        let received = loop {
            deadline.check()?;

            let len = match transport.read(frame_buf, deadline.remaining_ms()) {
                Ok(len) => len,
                Err(TransportError::Timeout) => continue,
                Err(e) => return Err(SprotError::ReadFailed(e.to_string())),
            };
            metrics.frames_received += 1;

            let bytes = &frame_buf[..len];
            let step = if crc_check(bytes) {
                state.on_frame(decode(bytes)?)
            } else {
                warn!(len, "checksum mismatch");
                state.on_corrupt()
            };

            Self::reply(transport, step.reply, reply_timeout_ms, metrics)?;

            match step.outcome {
                Outcome::Continue => {}
                Outcome::Complete => break Received::Message,
                Outcome::Switched(mode) => break Received::Switched(mode),
            }
        };

        metrics.bytes_received = state.buffered().len() as u64;
        metrics.total_us += start.elapsed().as_micros() as u64;
        debug!(?received, bytes = metrics.bytes_received, "receive loop done");
        Ok(received)
    }

    fn reply<T: Transport + ?Sized>(
        transport: &mut T,
        kind: ControlFrame,
        timeout_ms: u64,
        metrics: &mut ReceiveMetrics,
    ) -> Result<()> {
        AckManager::send_control(transport, kind, timeout_ms).map_err(SprotError::into_read_failure)?;
        match kind {
            ControlFrame::Nack => metrics.nacks_sent += 1,
            _ => metrics.acks_sent += 1,
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ReceiverBuilder {
    recv_buf_reserve: usize,
    reply_timeout_ms: u64,
}

impl ReceiverBuilder {
    pub fn new() -> Self {
        Self {
            recv_buf_reserve: crate::DEFAULT_RECV_BUF_RESERVE,
            reply_timeout_ms: crate::ACK_TIMEOUT_MS,
        }
    }

    pub fn with_recv_buf_reserve(mut self, reserve: usize) -> Self {
        self.recv_buf_reserve = reserve;
        self
    }

    pub fn with_reply_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.reply_timeout_ms = timeout_ms;
        self
    }

    pub fn get_recv_buf_reserve(&self) -> usize {
        self.recv_buf_reserve
    }

    pub fn get_reply_timeout_ms(&self) -> u64 {
        self.reply_timeout_ms
    }
}

impl Default for ReceiverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveMetrics {
    pub frames_received: u64,

    pub acks_sent: u64,

    pub nacks_sent: u64,

    pub bytes_received: u64,

    pub total_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc7;
    use crate::frame::{encode_control, encode_data};
    use crate::transport::ScriptedTransport;

    fn run(transport: &mut ScriptedTransport, state: &mut ExchangeState) -> Result<Received> {
        let mut frame_buf = [0u8; 64];
        let mut metrics = ReceiveMetrics::default();
        Receiver::receive(
            transport,
            state,
            &mut frame_buf,
            crate::ACK_TIMEOUT_MS,
            &Deadline::never(),
            &mut metrics,
        )
    }

    #[test]
    fn test_receiver_builder() {
        let builder = ReceiverBuilder::new()
            .with_recv_buf_reserve(2048)
            .with_reply_timeout_ms(50);

        assert_eq!(builder.get_recv_buf_reserve(), 2048);
        assert_eq!(builder.get_reply_timeout_ms(), 50);
    }

    #[test]
    fn test_corrupt_then_valid() {
        let mut bad = encode_data(1, b"hi");
        bad[2] ^= 0x01;
        let mut transport = ScriptedTransport::new()
            .then_read(bad)
            .then_timeout()
            .then_read(encode_data(1, b"hi"));
        let mut state = ExchangeState::new(16);

        let mut frame_buf = [0u8; 64];
        let mut metrics = ReceiveMetrics::default();
        let received = Receiver::receive(
            &mut transport,
            &mut state,
            &mut frame_buf,
            crate::ACK_TIMEOUT_MS,
            &Deadline::never(),
            &mut metrics,
        )
        .unwrap();

        assert_eq!(received, Received::Message);
        assert_eq!(state.buffered(), b"hi");
        assert_eq!(
            transport.written(),
            &[
                encode_control(ControlFrame::Nack).to_vec(),
                encode_control(ControlFrame::Ack).to_vec()
            ]
        );
        assert_eq!(metrics.frames_received, 2);
        assert_eq!(metrics.nacks_sent, 1);
        assert_eq!(metrics.acks_sent, 1);
        assert_eq!(metrics.bytes_received, 2);
    }

    #[test]
    fn test_short_data_frame_is_invalid() {
        let mut transport =
            ScriptedTransport::new().then_read(vec![0x10, crc7(&[0x10])]);
        let mut state = ExchangeState::new(16);
        assert!(matches!(
            run(&mut transport, &mut state),
            Err(SprotError::InvalidFrame { length: 2 })
        ));
    }

    #[test]
    fn test_switch_ends_loop() {
        let mut transport = ScriptedTransport::new()
            .then_read(encode_control(ControlFrame::SetSend));
        let mut state = ExchangeState::new(16);
        state.set_mode(Mode::Receiver);
        assert_eq!(
            run(&mut transport, &mut state).unwrap(),
            Received::Switched(Mode::Sender)
        );
    }

    #[test]
    fn test_transport_failure_is_read_failure() {
        let mut transport = ScriptedTransport::new();
        let mut state = ExchangeState::new(16);
        assert!(matches!(
            run(&mut transport, &mut state),
            Err(SprotError::ReadFailed(_))
        ));
    }

    #[test]
    fn test_reply_failure_is_read_failure() {
        let mut transport = ScriptedTransport::new()
            .with_failing_writes(1)
            .then_read(encode_data(1, b"x"));
        let mut state = ExchangeState::new(16);
        assert!(matches!(
            run(&mut transport, &mut state),
            Err(SprotError::ReadFailed(_))
        ));
    }

    #[test]
    fn test_deadline_stops_silent_link() {
        let mut transport = ScriptedTransport::new().then_timeout().then_timeout();
        let mut state = ExchangeState::new(16);
        let mut frame_buf = [0u8; 64];
        let mut metrics = ReceiveMetrics::default();
        let result = Receiver::receive(
            &mut transport,
            &mut state,
            &mut frame_buf,
            crate::ACK_TIMEOUT_MS,
            &Deadline::after_ms(0),
            &mut metrics,
        );
        assert!(matches!(result, Err(SprotError::Timeout)));
    }
}
