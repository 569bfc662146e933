//! Error types for sprot protocol operations
//!
//! Only failures the protocol cannot absorb itself are represented here.
//! Corrupted, duplicate and out-of-order frames are handled inside the
//! ACK/NACK exchange and never reach the caller.

use thiserror::Error;

use crate::state::Mode;

/// Result type alias for sprot operations
pub type Result<T> = std::result::Result<T, SprotError>;

/// Sprot protocol error enumeration
///
/// Closed set of failure kinds a caller of [`crate::Protocol`] can observe.
/// Callers are expected to retry the whole logical operation after any of them.
#[derive(Debug, Error)]
pub enum SprotError {
    /// Invalid argument or configuration value
    #[error("incorrect parameter: {0}")]
    IncorrectParameter(String),

    /// Role mismatch under manual switching, or a role wait that ended without a switch
    #[error("incorrect mode: cannot {operation} while in {mode:?} mode")]
    IncorrectMode { operation: &'static str, mode: Mode },

    /// Overall deadline of a read/write call exceeded
    #[error("timeout while reading or writing")]
    Timeout,

    /// Transport write error or per-frame retry budget exhausted
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Transport read error
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// Frame passed its checksum but cannot be a valid frame
    #[error("invalid frame: {length} bytes received, data frames need at least 3")]
    InvalidFrame { length: usize },

    /// Reassembled message does not fit the destination buffer
    #[error("buffer too small: required {required}, available {available}")]
    BufferOverflow { required: usize, available: usize },
}

impl SprotError {
    /// Report write-side failures raised while serving a read as read failures
    pub(crate) fn into_read_failure(self) -> Self {
        match self {
            Self::WriteFailed(msg) => Self::ReadFailed(msg),
            other => other,
        }
    }

    /// Report read-side failures raised while serving a write as write failures
    pub(crate) fn into_write_failure(self) -> Self {
        match self {
            Self::ReadFailed(msg) => Self::WriteFailed(msg),
            other => other,
        }
    }

    /// True for failures worth retrying at the message level
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::WriteFailed(_) | Self::ReadFailed(_)
        )
    }
}
