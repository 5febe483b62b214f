//! Core types used throughout Aerolink.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Station identifier carried in the 4-bit sender/receiver header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct NodeId(u8);

impl NodeId {
    /// Create a new identifier; the value is masked to 4 bits.
    pub fn new(id: u8) -> Self {
        Self(id & 0x0F)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl From<u8> for NodeId {
    fn from(id: u8) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One-byte identifier selecting a specific command action.
///
/// Doubles as the acknowledgment correlator: an ack carries the number of
/// the command it acknowledges. Zero is the reserved invalid sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CommandNumber(u8);

impl CommandNumber {
    /// Reserved sentinel; never a valid command.
    pub const INVALID: Self = Self(0);

    /// Fin actuation test.
    pub const FIN_TEST: Self = Self(101);

    pub fn new(n: u8) -> Self {
        Self(n)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// A command is valid when its number is not the reserved sentinel.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl From<u8> for CommandNumber {
    fn from(n: u8) -> Self {
        Self(n)
    }
}

impl fmt::Display for CommandNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload descriptor identifying the message kind inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Descriptor {
    /// Command from ground to vehicle.
    Command = 0x01,
    /// Acknowledgment of a received command.
    Acknowledgment = 0x02,
    /// Primary telemetry stream.
    TelemetryA = 0x10,
    /// Secondary telemetry stream.
    TelemetryB = 0x11,
}

impl Descriptor {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Command),
            0x02 => Some(Self::Acknowledgment),
            0x10 => Some(Self::TelemetryA),
            0x11 => Some(Self::TelemetryB),
            _ => None,
        }
    }

    /// Check if this descriptor selects a telemetry message.
    pub fn is_telemetry(self) -> bool {
        matches!(self, Self::TelemetryA | Self::TelemetryB)
    }
}

/// Protocol events surfaced to the user through the event callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// An outstanding command was acknowledged by the peer.
    CommandAcked(CommandNumber),
    /// A command exhausted its retries without an acknowledgment.
    CommandGaveUp(CommandNumber),
    /// An inbound frame carried a descriptor this endpoint does not know.
    UnknownDescriptor(u8),
    /// An acknowledgment arrived for a command that is not outstanding.
    UnexpectedAck(CommandNumber),
}

impl fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandAcked(n) => write!(f, "command {n} acked"),
            Self::CommandGaveUp(n) => write!(f, "command {n} gave up"),
            Self::UnknownDescriptor(b) => write!(f, "unknown descriptor {b:#04x}"),
            Self::UnexpectedAck(n) => write!(f, "unexpected ack for command {n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_masks_to_four_bits() {
        assert_eq!(NodeId::new(0x1F).get(), 0x0F);
        assert_eq!(NodeId::new(3).get(), 3);
    }

    #[test]
    fn command_number_validity() {
        assert!(!CommandNumber::INVALID.is_valid());
        assert!(CommandNumber::FIN_TEST.is_valid());
        assert!(CommandNumber::new(7).is_valid());
    }

    #[test]
    fn descriptor_round_trip() {
        for d in [
            Descriptor::Command,
            Descriptor::Acknowledgment,
            Descriptor::TelemetryA,
            Descriptor::TelemetryB,
        ] {
            assert_eq!(Descriptor::from_u8(d as u8), Some(d));
        }
        assert_eq!(Descriptor::from_u8(0x42), None);
    }
}
