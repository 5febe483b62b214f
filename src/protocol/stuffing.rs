//! Start-byte elimination for frame payloads.
//!
//! A consistent-overhead run-length encoding removes every occurrence of
//! the reserved start byte from a payload. A code byte precedes each run of
//! literal bytes: a code `c < 0xFF` means `c - 1` literals followed by an
//! implicit start byte (unless the run ends the input), while `0xFF` means
//! 254 literals with no implicit start byte. The number of start bytes
//! replaced travels out-of-band in the frame's stuffing index field.

use crate::error::StuffingError;

use super::{MAX_STUFFING_INDEX, START_BYTE};

/// Result of stuffing a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stuffed {
    /// Encoded bytes; contains no occurrence of the start byte.
    pub bytes: Vec<u8>,
    /// Number of start bytes replaced in the input (fits in 6 bits).
    pub index: u8,
}

/// Encode `input` so that the result contains no start byte.
///
/// Fails with [`StuffingError::IndexOverflow`] when the input holds more
/// start bytes than the 6-bit index field can record.
pub fn encode(input: &[u8]) -> Result<Stuffed, StuffingError> {
    let mut bytes = Vec::with_capacity(input.len() + 2);
    bytes.push(0x00); // Placeholder for the first code
    let mut code_ptr = 0;
    let mut code: u8 = 1;
    let mut index: usize = 0;

    for &byte in input {
        if byte == START_BYTE {
            bytes[code_ptr] = code;
            code = 1;
            bytes.push(0x00);
            code_ptr = bytes.len() - 1;
            index += 1;
        } else {
            bytes.push(byte);
            code += 1;
            if code == 0xFF {
                // Maximum run length; flush without consuming an index slot
                bytes[code_ptr] = code;
                code = 1;
                bytes.push(0x00);
                code_ptr = bytes.len() - 1;
            }
        }
    }

    bytes[code_ptr] = code;

    if index > MAX_STUFFING_INDEX {
        return Err(StuffingError::IndexOverflow {
            count: index,
            max: MAX_STUFFING_INDEX,
        });
    }

    debug_assert!(
        bytes.iter().all(|&b| b != START_BYTE),
        "stuffing left a start byte in the output"
    );

    Ok(Stuffed {
        bytes,
        index: index as u8,
    })
}

/// Invert [`encode`], reconstructing the original payload.
///
/// `index` is the start-byte count recorded at encode time; decoding fails
/// when the implied count disagrees.
pub fn decode(encoded: &[u8], index: u8) -> Result<Vec<u8>, StuffingError> {
    let mut decoded = Vec::with_capacity(encoded.len());
    let mut seen: u8 = 0;
    let mut i = 0;

    while i < encoded.len() {
        let code = encoded[i];
        if code == 0 {
            return Err(StuffingError::ZeroCode);
        }
        i += 1;
        for _ in 1..code {
            if i >= encoded.len() {
                return Err(StuffingError::Truncated);
            }
            decoded.push(encoded[i]);
            i += 1;
        }
        if code < 0xFF && i < encoded.len() {
            if seen == index {
                return Err(StuffingError::IndexMismatch {
                    expected: index,
                    decoded: index.saturating_add(1),
                });
            }
            decoded.push(START_BYTE);
            seen += 1;
        }
    }

    if seen != index {
        return Err(StuffingError::IndexMismatch {
            expected: index,
            decoded: seen,
        });
    }

    Ok(decoded)
}
