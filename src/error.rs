//! Error types for Aerolink.

use std::io;

use thiserror::Error;

/// Result type alias for Aerolink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Aerolink.
#[derive(Error, Debug)]
pub enum Error {
    // Codec errors
    #[error("stuffing error: {0}")]
    Stuffing(#[from] StuffingError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("message error: {0}")]
    Message(#[from] MessageError),

    // Transport errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    // Engine errors
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Byte-stuffing codec errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuffingError {
    #[error("code byte is zero")]
    ZeroCode,

    #[error("run extends past end of input")]
    Truncated,

    #[error("start-byte index mismatch: expected {expected}, decoded {decoded}")]
    IndexMismatch { expected: u8, decoded: u8 },

    #[error("too many start bytes to stuff: {count} (max {max})")]
    IndexOverflow { count: usize, max: usize },
}

/// Frame assembly and disassembly errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: {len} bytes")]
    TooShort { len: usize },

    #[error("invalid start byte: {0:#04x}")]
    BadStartByte(u8),

    #[error("length checksum mismatch: expected {expected}, got {got}")]
    BadLengthChecksum { expected: u8, got: u8 },

    #[error("stuffing checksum mismatch: expected {expected}, got {got}")]
    BadStuffingChecksum { expected: u8, got: u8 },

    #[error("payload length mismatch: header says {expected}, decoded {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("CRC mismatch: computed {computed:#04x}, got {got:#04x}")]
    BadCrc { computed: u8, got: u8 },

    #[error("payload too long: {size} bytes (max {max})")]
    PayloadTooLong { size: usize, max: usize },

    #[error("stuffing index overflow: {index} (max {max})")]
    StuffingOverflow { index: usize, max: usize },

    #[error("stuffing error: {0}")]
    Stuffing(#[from] StuffingError),
}

/// Application message codec errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageError {
    #[error("unexpected payload descriptor: {0:#04x}")]
    BadDescriptor(u8),

    #[error("message truncated: {len} bytes (need {need})")]
    Truncated { len: usize, need: usize },

    #[error("command payload too long: {size} bytes (max {max})")]
    PayloadTooLong { size: usize, max: usize },
}

/// Transport layer errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("radio I/O failure: {0}")]
    IoFailure(String),

    #[error("transport closed")]
    Closed,
}

/// Protocol engine errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("command number is the reserved invalid sentinel")]
    InvalidCommand,

    #[error("engine is not running")]
    NotRunning,
}

impl Error {
    /// Check if the error is recoverable (the session survives, only the
    /// offending frame or send attempt is lost).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Stuffing(_)
                | Error::Frame(_)
                | Error::Message(_)
                | Error::Transport(TransportError::IoFailure(_))
        )
    }
}
