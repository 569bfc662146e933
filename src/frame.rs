//! Wire frames exchanged with the transport
//!
//! Two shapes travel on the wire:
//!
//! - control frame, 2 bytes: `[type][crc7(type)]`
//! - data frame, `payload + 3` bytes: `[0x10][sequence][payload...][crc7(all preceding)]`
//!
//! The checksum is always the last byte. Sequence numbers are one byte and
//! wrap modulo 256.

use crate::crc::{crc7, crc_check};
use crate::errors::{Result, SprotError};

/// Type byte of a data frame
pub const DATA_FRAME_TYPE: u8 = 0x10;

/// Size of every control frame
pub const CONTROL_FRAME_SIZE: usize = 2;

/// Bytes a data frame adds around its payload: type, sequence number, checksum
pub const DATA_FRAME_OVERHEAD: usize = 3;

/// Control frame types and their wire values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlFrame {
    Ack = 0x0a,
    Nack = 0x0b,
    /// Opens a multi-frame message
    SeqBegin = 0x0c,
    /// Closes a multi-frame message
    SeqEnd = 0x0d,
    /// Tells the peer to become the sender
    SetSend = 0x0e,
    /// Tells the peer to become the receiver
    SetRecv = 0x0f,
}

impl ControlFrame {
    /// Map a type byte to a control frame, if it is one
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0a => Some(Self::Ack),
            0x0b => Some(Self::Nack),
            0x0c => Some(Self::SeqBegin),
            0x0d => Some(Self::SeqEnd),
            0x0e => Some(Self::SetSend),
            0x0f => Some(Self::SetRecv),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A decoded frame borrowing its payload from the receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Control(ControlFrame),
    Data { sequence: u8, payload: &'a [u8] },
    /// Checksum-valid frame with a type byte this protocol does not define
    Unknown(u8),
}

impl<'a> Frame<'a> {
    /// Number of bytes this frame occupies on the wire
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Data { payload, .. } => payload.len() + DATA_FRAME_OVERHEAD,
            Self::Control(_) | Self::Unknown(_) => CONTROL_FRAME_SIZE,
        }
    }

    /// Encode into a fresh buffer, checksum included
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Self::Control(kind) => encode_control(kind).to_vec(),
            Self::Data { sequence, payload } => encode_data(sequence, payload),
            Self::Unknown(byte) => vec![byte, crc7(&[byte])],
        }
    }

    /// Short label used in log output
    pub fn describe(&self) -> String {
        match self {
            Self::Control(kind) => format!("{:?}", kind),
            Self::Data { sequence, payload } => {
                format!("Data(seq={}, {} bytes)", sequence, payload.len())
            }
            Self::Unknown(byte) => format!("Unknown({:#04x})", byte),
        }
    }
}

/// Encode a 2-byte control frame
pub fn encode_control(kind: ControlFrame) -> [u8; CONTROL_FRAME_SIZE] {
    let byte = kind.as_byte();
    [byte, crc7(&[byte])]
}

/// Encode a data frame of `payload.len() + 3` bytes
pub fn encode_data(sequence: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + DATA_FRAME_OVERHEAD);
    frame.push(DATA_FRAME_TYPE);
    frame.push(sequence);
    frame.extend_from_slice(payload);
    frame.push(crc7(&frame));
    frame
}

/// Decode a received buffer by its type byte
///
/// The checksum is not verified here, see [`verify`].
///
/// # Errors
/// `InvalidFrame` for an empty buffer or a data-typed buffer shorter than 3 bytes.
pub fn decode(bytes: &[u8]) -> Result<Frame<'_>> {
    let Some(&kind) = bytes.first() else {
        return Err(SprotError::InvalidFrame { length: 0 });
    };

    if kind == DATA_FRAME_TYPE {
        if bytes.len() < DATA_FRAME_OVERHEAD {
            return Err(SprotError::InvalidFrame { length: bytes.len() });
        }
        return Ok(Frame::Data {
            sequence: bytes[1],
            payload: &bytes[2..bytes.len() - 1],
        });
    }

    Ok(match ControlFrame::from_byte(kind) {
        Some(control) => Frame::Control(control),
        None => Frame::Unknown(kind),
    })
}

/// True if the trailing checksum byte matches the rest of the buffer
pub fn verify(bytes: &[u8]) -> bool {
    crc_check(bytes)
}

/// True if `bytes` is exactly a valid control frame of the given kind
pub fn is_control(bytes: &[u8], kind: ControlFrame) -> bool {
    bytes.len() == CONTROL_FRAME_SIZE && bytes[0] == kind.as_byte() && verify(bytes)
}
