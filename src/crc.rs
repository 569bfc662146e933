//! CRC-7 checksum protecting every frame
//!
//! Reflected, table-driven CRC with polynomial 0x91. The checksum of a frame
//! covers every byte except the trailing checksum byte itself. The table is
//! built at compile time, so there is no global initialisation at runtime.

/// Generator polynomial (reflected form)
pub const CRC7_POLY: u8 = 0x91;

static CRC7_TABLE: [u8; 256] = build_table();

const fn byte_crc(mut byte: u8) -> u8 {
    let mut bit = 0;
    while bit < 8 {
        if byte & 1 != 0 {
            byte ^= CRC7_POLY;
        }
        byte >>= 1;
        bit += 1;
    }
    byte
}

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = byte_crc(i as u8);
        i += 1;
    }
    table
}

/// Compute the CRC-7 of `bytes`
pub fn crc7(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |crc, &byte| CRC7_TABLE[(crc ^ byte) as usize])
}

/// Check a complete frame: the last byte must be the CRC-7 of all preceding bytes
///
/// An empty buffer is never valid.
pub fn crc_check(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((&checksum, body)) => crc7(body) == checksum,
        None => false,
    }
}
