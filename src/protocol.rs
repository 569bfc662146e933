//! Protocol engine
//!
//! [`Protocol`] turns an unreliable packet [`Transport`] into a half-duplex
//! message pipe: whole messages arrive exactly once, in order, checked by
//! CRC-7, or the call fails with a typed error. One instance serves one
//! calling thread; each `read`/`write` is a self-contained exchange.

use tracing::{debug, info, warn};

use crate::ack_manager::{AckManager, RetryPolicy};
use crate::deadline::Deadline;
use crate::errors::{Result, SprotError};
use crate::frame::{encode_control, ControlFrame, DATA_FRAME_OVERHEAD};
use crate::receiver::{ReceiveMetrics, Received, Receiver, ReceiverBuilder};
use crate::state::{ExchangeState, Mode, Switching};
use crate::transmitter::{TransmitMetrics, Transmitter, TransmitterBuilder};
use crate::transport::Transport;

/// Largest MTU a single datagram can carry
pub const MAX_MTU: usize = 65_535;

/// Validated engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub switching: Switching,

    /// Largest encoded data frame; payload per frame is `mtu - 3`
    pub mtu: usize,

    /// Capacity kept reserved for reassembly
    pub recv_buf_reserve: usize,

    /// Timeout for ACK/NACK replies on the receive path
    pub reply_timeout_ms: u64,

    pub retry: RetryPolicy,
}

impl ProtocolConfig {
    /// Payload bytes carried by a full data frame
    pub fn payload_capacity(&self) -> usize {
        self.mtu - DATA_FRAME_OVERHEAD
    }

    fn validate(&self) -> Result<()> {
        if self.mtu <= DATA_FRAME_OVERHEAD || self.mtu > MAX_MTU {
            return Err(SprotError::IncorrectParameter(format!(
                "mtu must be in {}..={}, got {}",
                DATA_FRAME_OVERHEAD + 1,
                MAX_MTU,
                self.mtu
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(SprotError::IncorrectParameter(
                "at least one send attempt is required".into(),
            ));
        }
        if self.retry.ack_timeout_ms == 0 || self.reply_timeout_ms == 0 {
            return Err(SprotError::IncorrectParameter(
                "ACK and reply timeouts must be at least 1 ms".into(),
            ));
        }
        if self.retry.backoff_multiplier == 0 {
            return Err(SprotError::IncorrectParameter(
                "backoff multiplier must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolBuilder::new().config()
    }
}

/// ProtocolBuilder - Fluent interface for engine configuration
#[derive(Debug, Clone, Default)]
pub struct ProtocolBuilder {
    switching: Switching,
    transmitter: TransmitterBuilder,
    receiver: ReceiverBuilder,
}

impl ProtocolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Automatic or manual role switching
    pub fn with_switching(mut self, switching: Switching) -> Self {
        self.switching = switching;
        self
    }

    /// Largest encoded data frame in bytes; both peers must agree on it
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.transmitter = self.transmitter.with_mtu(mtu);
        self
    }

    pub fn with_recv_buf_reserve(mut self, reserve: usize) -> Self {
        self.receiver = self.receiver.with_recv_buf_reserve(reserve);
        self
    }

    /// Transmissions per frame before a write gives up
    pub fn with_send_attempts(mut self, attempts: u32) -> Self {
        self.transmitter = self.transmitter.with_max_attempts(attempts);
        self
    }

    /// Per-attempt ACK timeout; also used for replies on the receive path
    pub fn with_ack_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.transmitter = self.transmitter.with_ack_timeout_ms(timeout_ms);
        self.receiver = self.receiver.with_reply_timeout_ms(timeout_ms);
        self
    }

    /// Grow the ACK timeout by `multiplier` per attempt, capped at `max_ms`
    pub fn with_ack_backoff(mut self, multiplier: u64, max_ms: u64) -> Self {
        self.transmitter = self.transmitter.with_backoff(multiplier, max_ms);
        self
    }

    fn config(&self) -> ProtocolConfig {
        let (mtu, retry) = self.transmitter.clone().into_parts();
        ProtocolConfig {
            switching: self.switching,
            mtu,
            recv_buf_reserve: self.receiver.get_recv_buf_reserve(),
            reply_timeout_ms: self.receiver.get_reply_timeout_ms(),
            retry,
        }
    }

    /// Validate the settings and wrap `transport`
    ///
    /// # Errors
    /// `IncorrectParameter` when a setting is out of range.
    pub fn build<T: Transport>(self, transport: T) -> Result<Protocol<T>> {
        let config = self.config();
        config.validate()?;
        Ok(Protocol::with_config(transport, config))
    }
}

/// Reliable segmented messaging engine over a [`Transport`]
#[derive(Debug)]
pub struct Protocol<T: Transport> {
    transport: T,
    config: ProtocolConfig,
    state: ExchangeState,
    frame_buf: Vec<u8>,
    last_transmit: Option<TransmitMetrics>,
    last_receive: Option<ReceiveMetrics>,
}

impl<T: Transport> Protocol<T> {
    /// Engine with default settings and automatic role switching
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ProtocolConfig::default())
    }

    fn with_config(transport: T, config: ProtocolConfig) -> Self {
        Self {
            transport,
            state: ExchangeState::new(config.recv_buf_reserve),
            frame_buf: vec![0u8; config.mtu],
            config,
            last_transmit: None,
            last_receive: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    pub fn switching(&self) -> Switching {
        self.config.switching
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// True if a message is held from an earlier overflow or role wait
    pub fn has_pending_message(&self) -> bool {
        self.state.has_pending()
    }

    pub fn last_transmit_metrics(&self) -> Option<&TransmitMetrics> {
        self.last_transmit.as_ref()
    }

    pub fn last_receive_metrics(&self) -> Option<&ReceiveMetrics> {
        self.last_receive.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Receive one whole message into `buf`
    ///
    /// A fresh instance becomes the receiver. A sender instance waits for the
    /// peer's SET_RECV under [`Switching::Auto`] and fails under
    /// [`Switching::Manual`].
    ///
    /// Returns the message length. `Ok(0)` means the peer handed over the
    /// sending role instead of sending data; [`Protocol::mode`] is then
    /// [`Mode::Sender`].
    ///
    /// # Errors
    /// - `BufferOverflow` if the complete message is larger than `buf`; the
    ///   message is kept and the next `read` with a big enough buffer returns it
    /// - `Timeout` once `timeout_ms` elapses
    /// - `IncorrectMode`, `ReadFailed`, `InvalidFrame`
    pub fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize> {
        if let Some(delivered) = self.state.deliver_pending(buf) {
            return delivered;
        }

        self.state.reset();
        let deadline = Deadline::after_ms(timeout_ms);

        let result = self.read_exchange(buf, &deadline);
        self.state.reset();
        result.map_err(SprotError::into_read_failure)
    }

    fn read_exchange(&mut self, buf: &mut [u8], deadline: &Deadline) -> Result<usize> {
        self.resolve_mode(Mode::Receiver, "read", deadline)?;

        match self.receive(deadline)? {
            Received::Message => self.state.deliver(buf),
            Received::Switched(mode) => {
                info!(?mode, "peer switched roles during read");
                Ok(0)
            }
        }
    }

    /// Deliver `message` to the peer
    ///
    /// Messages up to `mtu - 3` bytes travel as one data frame, larger ones
    /// are segmented. A fresh instance becomes the sender. A receiver
    /// instance waits for the peer's SET_SEND under [`Switching::Auto`].
    ///
    /// Returns `message.len()`; a message is never reported as partly sent.
    ///
    /// # Errors
    /// - `WriteFailed` when a frame exhausts its retry budget
    /// - `Timeout` once `timeout_ms` elapses
    /// - `IncorrectMode`
    pub fn write(&mut self, message: &[u8], timeout_ms: u64) -> Result<usize> {
        self.state.reset();
        let deadline = Deadline::after_ms(timeout_ms);

        let result = self.write_exchange(message, &deadline);
        self.state.reset();
        result.map_err(SprotError::into_write_failure)
    }

    fn write_exchange(&mut self, message: &[u8], deadline: &Deadline) -> Result<usize> {
        self.resolve_mode(Mode::Sender, "write", deadline)?;

        let metrics = Transmitter::send_message(
            &mut self.transport,
            message,
            self.config.payload_capacity(),
            &self.config.retry,
            deadline,
        )?;
        self.last_transmit = Some(metrics);
        Ok(message.len())
    }

    /// Block until the peer sends SET_SEND, making this instance the sender
    ///
    /// Returns at once if already the sender.
    pub fn wait_send_mode(&mut self, timeout_ms: u64) -> Result<()> {
        let deadline = Deadline::after_ms(timeout_ms);
        self.state.reset();
        let result = self.await_mode(Mode::Sender, "wait for send mode", &deadline);
        self.state.reset();
        result
    }

    /// Block until the peer sends SET_RECV, making this instance the receiver
    ///
    /// Returns at once if already the receiver.
    pub fn wait_recv_mode(&mut self, timeout_ms: u64) -> Result<()> {
        let deadline = Deadline::after_ms(timeout_ms);
        self.state.reset();
        let result = self.await_mode(Mode::Receiver, "wait for receive mode", &deadline);
        self.state.reset();
        result
    }

    /// Hand the sending role to the peer
    ///
    /// Transmits SET_SEND and waits for its ACK, then becomes the receiver.
    /// The peer must be inside a read (or `wait_send_mode`) to answer.
    pub fn switch_to_recv(&mut self, timeout_ms: u64) -> Result<()> {
        self.request_switch(ControlFrame::SetSend, Mode::Receiver, timeout_ms)
    }

    /// Take the sending role from the peer
    ///
    /// Transmits SET_RECV and waits for its ACK, then becomes the sender.
    /// The peer must be waiting for receive mode to answer.
    pub fn switch_to_send(&mut self, timeout_ms: u64) -> Result<()> {
        self.request_switch(ControlFrame::SetRecv, Mode::Sender, timeout_ms)
    }

    fn request_switch(&mut self, request: ControlFrame, local: Mode, timeout_ms: u64) -> Result<()> {
        let deadline = Deadline::after_ms(timeout_ms);
        self.state.reset();
        AckManager::send_reliable(
            &mut self.transport,
            &encode_control(request),
            &self.config.retry,
            &deadline,
        )?;
        info!(?request, mode = ?local, "role switch acknowledged by peer");
        self.state.set_mode(local);
        Ok(())
    }

    /// Make sure the instance is in `target` before an exchange starts
    fn resolve_mode(&mut self, target: Mode, operation: &'static str, deadline: &Deadline) -> Result<()> {
        let mode = self.state.mode();
        if mode == target {
            return Ok(());
        }
        if mode == Mode::Undefined {
            self.state.set_mode(target);
            return Ok(());
        }

        match self.config.switching {
            Switching::Manual => Err(SprotError::IncorrectMode { operation, mode }),
            Switching::Auto => {
                debug!(?mode, ?target, operation, "waiting for peer to switch roles");
                self.await_mode(target, operation, deadline)?;
                self.state.reset();
                Ok(())
            }
        }
    }

    /// Run the receive loop until the peer switches this instance into `target`
    ///
    /// A message that completes instead is queued for the next `read` and the
    /// wait fails with `IncorrectMode`.
    fn await_mode(&mut self, target: Mode, operation: &'static str, deadline: &Deadline) -> Result<()> {
        if self.state.mode() == target {
            return Ok(());
        }

        match self.receive(deadline)? {
            Received::Switched(mode) if mode == target => Ok(()),
            Received::Switched(mode) => Err(SprotError::IncorrectMode { operation, mode }),
            Received::Message => {
                warn!(
                    len = self.state.buffered().len(),
                    "message arrived while waiting for a role switch"
                );
                self.state.stash();
                Err(SprotError::IncorrectMode {
                    operation,
                    mode: self.state.mode(),
                })
            }
        }
    }

    fn receive(&mut self, deadline: &Deadline) -> Result<Received> {
        let mut metrics = ReceiveMetrics::default();
        let received = Receiver::receive(
            &mut self.transport,
            &mut self.state,
            &mut self.frame_buf,
            self.config.reply_timeout_ms,
            deadline,
            &mut metrics,
        )?;
        self.last_receive = Some(metrics);
        Ok(received)
    }
}
