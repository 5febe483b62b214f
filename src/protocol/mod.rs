//! Wire protocol for Aerolink.
//!
//! Defines the frame format, the byte-stuffing transformation, the checksum
//! primitives, and the application message layouts.
//!
//! ## Frame Format
//!
//! ```text
//! ┌────────────┬──────────────────────┬──────────────────────┬─────────────┬────────────┐
//! │ Start (1)  │ Len:6 | LenChk:2 (1) │ Idx:6 | StfChk:2 (1) │ Stuffed (N) │ CRC-8 (1)  │
//! └────────────┴──────────────────────┴──────────────────────┴─────────────┴────────────┘
//! ```
//!
//! The stuffed payload contains no occurrence of the start byte, so frame
//! boundaries remain unambiguous on a byte stream. The trailing CRC-8 is
//! computed over the *unstuffed* payload.

pub mod checksum;
pub mod frame;
pub mod message;
pub mod stuffing;

pub use frame::Frame;
pub use message::{Acknowledgment, Command, Header, Message, Telemetry, TelemetryKind};

/// Reserved frame delimiter; eliminated from payloads by stuffing.
pub const START_BYTE: u8 = 0xAA;

/// Maximum unstuffed payload length per frame.
pub const MAX_PAYLOAD_LEN: usize = 28;

/// Maximum number of start bytes the stuffing index field can record.
pub const MAX_STUFFING_INDEX: usize = 63;

/// Fixed per-frame overhead: start byte, length byte, stuffing byte, the
/// leading stuffing code byte, and the trailing CRC.
pub const FRAME_OVERHEAD: usize = 5;

/// Minimum size of a parseable frame (empty stuffed section).
pub const MIN_FRAME_LEN: usize = 4;

/// Total on-wire size of a frame carrying `payload_len` unstuffed bytes.
///
/// Payloads are bounded well below the stuffing code-flush threshold, so
/// the stuffed section is always exactly one byte longer than the payload.
pub fn frame_wire_len(payload_len: usize) -> usize {
    payload_len + FRAME_OVERHEAD
}
