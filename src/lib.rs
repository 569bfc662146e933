//! Sprot Core - reliable segmented messaging over unreliable links
//!
//! A stop-and-wait engine that sits on top of any datagram-like
//! [`Transport`] and delivers whole messages exactly once and in order.
//! Every frame is protected by a CRC-7 and individually acknowledged;
//! messages larger than one frame are wrapped in SEQ_BEGIN / SEQ_END.
//!
//! The link is half-duplex: one side is the sender, the other the receiver,
//! and the roles are exchanged with the SET_SEND / SET_RECV control frames.
//!
//! ```no_run
//! use sprot_core::{Protocol, UdpTransport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = UdpTransport::bind("127.0.0.1:7000", "127.0.0.1:7001")?;
//! let mut protocol = Protocol::new(transport);
//! protocol.write(b"hello", 1_000)?;
//! # Ok(())
//! # }
//! ```

pub mod ack_manager;
pub mod crc;
pub mod deadline;
pub mod errors;
pub mod frame;
pub mod protocol;
pub mod receiver;
pub mod state;
pub mod transmitter;
pub mod transport;

pub use errors::{Result, SprotError};
pub use protocol::{Protocol, ProtocolBuilder, ProtocolConfig};
pub use receiver::ReceiveMetrics;
pub use state::{Mode, Switching};
pub use transmitter::TransmitMetrics;
pub use transport::{
    LossStats, LossyTransport, MemoryTransport, ScriptedTransport, Transport, TransportError,
    UdpTransport,
};

/// Default largest encoded data frame in bytes
pub const DEFAULT_MTU: usize = 1024;

/// Default capacity kept reserved for message reassembly
pub const DEFAULT_RECV_BUF_RESERVE: usize = 3 * 1024 * 1024;

/// ACK timeout per transmission attempt in milliseconds
pub const ACK_TIMEOUT_MS: u64 = 200;

/// Transmissions per frame before a write fails
pub const MAX_SEND_ATTEMPTS: u32 = 5;

/// Timeout value meaning "block without limit"
pub const INFINITE_WAIT: u64 = u64::MAX;
