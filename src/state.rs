//! Exchange state machine
//!
//! All protocol state of one engine instance lives in [`ExchangeState`] and is
//! changed only through [`ExchangeState::on_frame`] and friends. Nothing here
//! touches a transport, so every transition can be driven directly in tests.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::errors::{Result, SprotError};
use crate::frame::{ControlFrame, Frame};

/// Role of an engine instance within an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Not fixed yet; the first read or write decides
    Undefined,
    /// Emits DATA frames ("client" role)
    Sender,
    /// Accepts DATA frames ("server" role)
    Receiver,
}

/// Whether the engine may renegotiate its role on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Switching {
    /// Wait for the peer's SET_SEND / SET_RECV when the role does not match
    #[default]
    Auto,
    /// Role mismatch is an `IncorrectMode` error
    Manual,
}

/// What the receive loop should do after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Keep reading frames
    Continue,
    /// A whole message sits in the reassembly buffer
    Complete,
    /// The peer switched this instance into the given role
    Switched(Mode),
}

/// Reply to send for a frame plus the resulting loop outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub reply: ControlFrame,
    pub outcome: Outcome,
}

impl Step {
    fn ack(outcome: Outcome) -> Self {
        Self { reply: ControlFrame::Ack, outcome }
    }

    fn nack() -> Self {
        Self { reply: ControlFrame::Nack, outcome: Outcome::Continue }
    }
}

/// Per-instance protocol state
#[derive(Debug)]
pub struct ExchangeState {
    mode: Mode,
    /// Last accepted data sequence number of the current exchange
    sequence: u8,
    in_sequence: bool,
    buffer: Vec<u8>,
    reserve: usize,
    /// Completed messages not yet handed to a caller
    pending: VecDeque<Vec<u8>>,
}

impl ExchangeState {
    pub fn new(reserve: usize) -> Self {
        Self {
            mode: Mode::Undefined,
            sequence: 0,
            in_sequence: false,
            buffer: Vec::with_capacity(reserve),
            reserve,
            pending: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            debug!(from = ?self.mode, to = ?mode, "mode change");
            self.mode = mode;
        }
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn in_sequence(&self) -> bool {
        self.in_sequence
    }

    /// Bytes reassembled so far in the current exchange
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Start a fresh exchange; pending messages survive
    pub fn reset(&mut self) {
        self.sequence = 0;
        self.in_sequence = false;
        self.buffer.clear();
        if self.buffer.capacity() > self.reserve {
            self.buffer.shrink_to(self.reserve);
        }
    }

    /// A frame failed its checksum
    pub fn on_corrupt(&mut self) -> Step {
        Step::nack()
    }

    /// Single transition function for checksum-valid frames
    pub fn on_frame(&mut self, frame: Frame<'_>) -> Step {
        trace!(frame = %frame.describe(), sequence = self.sequence, "frame in");
        match frame {
            // Stray acknowledgments and unknown types get a plain ACK.
            // TODO: confirm whether peers rely on this reply or it only masks stale ACKs.
            Frame::Control(ControlFrame::Ack | ControlFrame::Nack) | Frame::Unknown(_) => {
                Step::ack(Outcome::Continue)
            }
            Frame::Control(ControlFrame::SeqBegin) => {
                self.in_sequence = true;
                Step::ack(Outcome::Continue)
            }
            Frame::Control(ControlFrame::SeqEnd) => {
                self.in_sequence = false;
                Step::ack(Outcome::Complete)
            }
            Frame::Control(ControlFrame::SetSend) => self.on_switch(Mode::Sender),
            Frame::Control(ControlFrame::SetRecv) => self.on_switch(Mode::Receiver),
            Frame::Data { sequence, payload } => self.on_data(sequence, payload),
        }
    }

    fn on_switch(&mut self, target: Mode) -> Step {
        self.reset();
        if self.mode == target {
            return Step::ack(Outcome::Continue);
        }
        self.set_mode(target);
        Step::ack(Outcome::Switched(target))
    }

    fn on_data(&mut self, sequence: u8, payload: &[u8]) -> Step {
        // Already applied; the ACK was probably lost.
        if sequence == self.sequence {
            return Step::ack(Outcome::Continue);
        }

        if sequence != self.sequence.wrapping_add(1) {
            return Step::nack();
        }

        self.sequence = sequence;
        self.buffer.extend_from_slice(payload);

        if self.in_sequence {
            Step::ack(Outcome::Continue)
        } else {
            Step::ack(Outcome::Complete)
        }
    }

    /// Copy the oldest pending message into `out`
    ///
    /// Returns `None` when nothing is pending. On overflow the message stays queued.
    pub fn deliver_pending(&mut self, out: &mut [u8]) -> Option<Result<usize>> {
        let message = self.pending.front()?;
        if message.len() > out.len() {
            return Some(Err(SprotError::BufferOverflow {
                required: message.len(),
                available: out.len(),
            }));
        }
        let len = message.len();
        out[..len].copy_from_slice(message);
        self.pending.pop_front();
        Some(Ok(len))
    }

    /// Hand the reassembled message to the caller
    ///
    /// The size check happens once, on the complete message. A message that
    /// does not fit is queued so a later call with a bigger buffer can take it.
    pub fn deliver(&mut self, out: &mut [u8]) -> Result<usize> {
        let len = self.buffer.len();
        if len > out.len() {
            self.stash();
            return Err(SprotError::BufferOverflow {
                required: len,
                available: out.len(),
            });
        }
        out[..len].copy_from_slice(&self.buffer);
        self.reset();
        Ok(len)
    }

    /// Move the reassembled message to the pending queue
    pub fn stash(&mut self) {
        let message = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.reserve));
        debug!(len = message.len(), "message held for a later read");
        self.pending.push_back(message);
        self.sequence = 0;
        self.in_sequence = false;
    }
}
