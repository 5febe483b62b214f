//! Application messages layered over the frame codec.
//!
//! Every message opens with a packed sender/receiver header byte and a
//! descriptor byte selecting the kind. Multi-byte integers are big-endian.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::error::MessageError;
use crate::types::{CommandNumber, Descriptor, NodeId};

/// Fixed wire size of a telemetry message.
pub const TELEMETRY_WIRE_LEN: usize = 28;

/// Header, descriptor, command number, and payload length bytes.
pub const COMMAND_HEADER_LEN: usize = 4;

/// Header, descriptor, and acknowledged command number.
pub const ACK_WIRE_LEN: usize = 3;

/// Maximum command payload at the message layer; the frame layer bounds it
/// further.
pub const MAX_COMMAND_PAYLOAD: usize = 255;

/// Sender and receiver identifiers packed into a single byte.
///
/// The receiver occupies the high nibble: `(receiver << 4) | sender`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub sender: NodeId,
    pub receiver: NodeId,
}

impl Header {
    pub fn new(sender: impl Into<NodeId>, receiver: impl Into<NodeId>) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
        }
    }

    /// Pack into the on-wire byte.
    pub fn pack(self) -> u8 {
        (self.receiver.get() << 4) | (self.sender.get() & 0x0F)
    }

    /// Unpack from the on-wire byte.
    pub fn unpack(byte: u8) -> Self {
        Self {
            sender: NodeId::new(byte & 0x0F),
            receiver: NodeId::new(byte >> 4),
        }
    }

    /// Header for a reply flowing in the opposite direction.
    pub fn reply(self) -> Self {
        Self {
            sender: self.receiver,
            receiver: self.sender,
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.sender, self.receiver)
    }
}

/// A command directed at the remote endpoint.
///
/// Owned by the reliable-send engine while awaiting acknowledgment. The
/// priority steers queueing only; it is not part of the wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub header: Header,
    pub number: CommandNumber,
    pub payload: Vec<u8>,
    pub priority: i32,
}

impl Command {
    pub fn new(
        sender: impl Into<NodeId>,
        receiver: impl Into<NodeId>,
        number: CommandNumber,
        payload: Vec<u8>,
    ) -> Result<Self, MessageError> {
        if payload.len() > MAX_COMMAND_PAYLOAD {
            return Err(MessageError::PayloadTooLong {
                size: payload.len(),
                max: MAX_COMMAND_PAYLOAD,
            });
        }
        Ok(Self {
            header: Header::new(sender, receiver),
            number,
            payload,
            priority: 0,
        })
    }

    /// Builder-style priority assignment (higher = more urgent).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// A command is valid when its number is not the reserved sentinel.
    pub fn is_valid(&self) -> bool {
        self.number.is_valid()
    }

    /// Encode to message bytes for framing.
    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        if self.payload.len() > MAX_COMMAND_PAYLOAD {
            return Err(MessageError::PayloadTooLong {
                size: self.payload.len(),
                max: MAX_COMMAND_PAYLOAD,
            });
        }
        let mut encoded = Vec::with_capacity(COMMAND_HEADER_LEN + self.payload.len());
        encoded.push(self.header.pack());
        encoded.push(Descriptor::Command as u8);
        encoded.push(self.number.get());
        encoded.push(self.payload.len() as u8);
        encoded.extend_from_slice(&self.payload);
        Ok(encoded)
    }

    /// Decode from message bytes.
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        if data.len() < COMMAND_HEADER_LEN {
            return Err(MessageError::Truncated {
                len: data.len(),
                need: COMMAND_HEADER_LEN,
            });
        }
        if data[1] != Descriptor::Command as u8 {
            return Err(MessageError::BadDescriptor(data[1]));
        }
        let payload_len = data[3] as usize;
        if data.len() < COMMAND_HEADER_LEN + payload_len {
            return Err(MessageError::Truncated {
                len: data.len(),
                need: COMMAND_HEADER_LEN + payload_len,
            });
        }
        Ok(Self {
            header: Header::unpack(data[0]),
            number: CommandNumber::new(data[2]),
            payload: data[COMMAND_HEADER_LEN..COMMAND_HEADER_LEN + payload_len].to_vec(),
            priority: 0,
        })
    }
}

/// Selector between the two telemetry streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelemetryKind {
    #[default]
    A,
    B,
}

impl TelemetryKind {
    pub fn descriptor(self) -> Descriptor {
        match self {
            Self::A => Descriptor::TelemetryA,
            Self::B => Descriptor::TelemetryB,
        }
    }

    pub fn from_descriptor(d: Descriptor) -> Option<Self> {
        match d {
            Descriptor::TelemetryA => Some(Self::A),
            Descriptor::TelemetryB => Some(Self::B),
            _ => None,
        }
    }
}

/// Vehicle state report.
///
/// Voltages in millivolts, positions in meters, velocities in decimeters
/// per second, accelerations in centimeters per second squared. The memory
/// log carries major, communication, and data log fill percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Telemetry {
    pub header: Header,
    pub kind: TelemetryKind,
    pub voltage1: u16,
    pub voltage2: u16,
    pub pos_x: i16,
    pub pos_y: i16,
    pub pos_z: i16,
    pub vel_x: i16,
    pub vel_y: i16,
    pub vel_z: i16,
    pub acc_x: i16,
    pub acc_y: i16,
    pub acc_z: i16,
    pub memory_log: [u8; 3],
    pub status_flags: u8,
}

impl Telemetry {
    /// Encode to the fixed 28-byte wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; TELEMETRY_WIRE_LEN];
        buf[0] = self.header.pack();
        buf[1] = self.kind.descriptor() as u8;
        BigEndian::write_u16(&mut buf[2..4], self.voltage1);
        BigEndian::write_u16(&mut buf[4..6], self.voltage2);
        BigEndian::write_i16(&mut buf[6..8], self.pos_x);
        BigEndian::write_i16(&mut buf[8..10], self.pos_y);
        BigEndian::write_i16(&mut buf[10..12], self.pos_z);
        BigEndian::write_i16(&mut buf[12..14], self.vel_x);
        BigEndian::write_i16(&mut buf[14..16], self.vel_y);
        BigEndian::write_i16(&mut buf[16..18], self.vel_z);
        BigEndian::write_i16(&mut buf[18..20], self.acc_x);
        BigEndian::write_i16(&mut buf[20..22], self.acc_y);
        BigEndian::write_i16(&mut buf[22..24], self.acc_z);
        buf[24..27].copy_from_slice(&self.memory_log);
        buf[27] = self.status_flags;
        buf
    }

    /// Decode from message bytes.
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        if data.len() < TELEMETRY_WIRE_LEN {
            return Err(MessageError::Truncated {
                len: data.len(),
                need: TELEMETRY_WIRE_LEN,
            });
        }
        let kind = Descriptor::from_u8(data[1])
            .and_then(TelemetryKind::from_descriptor)
            .ok_or(MessageError::BadDescriptor(data[1]))?;
        let mut memory_log = [0u8; 3];
        memory_log.copy_from_slice(&data[24..27]);
        Ok(Self {
            header: Header::unpack(data[0]),
            kind,
            voltage1: BigEndian::read_u16(&data[2..4]),
            voltage2: BigEndian::read_u16(&data[4..6]),
            pos_x: BigEndian::read_i16(&data[6..8]),
            pos_y: BigEndian::read_i16(&data[8..10]),
            pos_z: BigEndian::read_i16(&data[10..12]),
            vel_x: BigEndian::read_i16(&data[12..14]),
            vel_y: BigEndian::read_i16(&data[14..16]),
            vel_z: BigEndian::read_i16(&data[16..18]),
            acc_x: BigEndian::read_i16(&data[18..20]),
            acc_y: BigEndian::read_i16(&data[20..22]),
            acc_z: BigEndian::read_i16(&data[22..24]),
            memory_log,
            status_flags: data[27],
        })
    }
}

/// Acknowledgment of a received command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledgment {
    pub header: Header,
    pub acked: CommandNumber,
}

impl Acknowledgment {
    pub fn new(header: Header, acked: CommandNumber) -> Self {
        Self { header, acked }
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![
            self.header.pack(),
            Descriptor::Acknowledgment as u8,
            self.acked.get(),
        ]
    }

    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        if data.len() < ACK_WIRE_LEN {
            return Err(MessageError::Truncated {
                len: data.len(),
                need: ACK_WIRE_LEN,
            });
        }
        if data[1] != Descriptor::Acknowledgment as u8 {
            return Err(MessageError::BadDescriptor(data[1]));
        }
        Ok(Self {
            header: Header::unpack(data[0]),
            acked: CommandNumber::new(data[2]),
        })
    }
}

/// Any application message, decoded by descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Command(Command),
    Telemetry(Telemetry),
    Acknowledgment(Acknowledgment),
}

impl Message {
    /// Decode message bytes, dispatching on the descriptor at offset 1.
    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        if data.len() < 2 {
            return Err(MessageError::Truncated {
                len: data.len(),
                need: 2,
            });
        }
        match Descriptor::from_u8(data[1]) {
            Some(Descriptor::Command) => Command::decode(data).map(Self::Command),
            Some(Descriptor::Acknowledgment) => {
                Acknowledgment::decode(data).map(Self::Acknowledgment)
            }
            Some(d) if d.is_telemetry() => Telemetry::decode(data).map(Self::Telemetry),
            _ => Err(MessageError::BadDescriptor(data[1])),
        }
    }

    pub fn descriptor(&self) -> Descriptor {
        match self {
            Self::Command(_) => Descriptor::Command,
            Self::Acknowledgment(_) => Descriptor::Acknowledgment,
            Self::Telemetry(t) => t.kind.descriptor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_packs_receiver_high() {
        let header = Header::new(1, 2);
        assert_eq!(header.pack(), 0x21);
        assert_eq!(Header::unpack(0x21), header);
    }

    #[test]
    fn header_reply_swaps_direction() {
        let header = Header::new(3, 7);
        assert_eq!(header.reply(), Header::new(7, 3));
    }

    #[test]
    fn command_wire_form() {
        let cmd = Command::new(1, 2, CommandNumber::FIN_TEST, vec![0x01, 0x02, 0x03]).unwrap();
        assert_eq!(
            cmd.encode().unwrap(),
            vec![0x21, 0x01, 0x65, 0x03, 0x01, 0x02, 0x03]
        );
    }

    #[test]
    fn command_round_trip() {
        let cmd = Command::new(4, 9, CommandNumber::new(42), vec![0xDE, 0xAD]).unwrap();
        let decoded = Command::decode(&cmd.encode().unwrap()).unwrap();
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn command_empty_payload_round_trip() {
        let cmd = Command::new(0, 15, CommandNumber::new(1), vec![]).unwrap();
        assert_eq!(Command::decode(&cmd.encode().unwrap()).unwrap(), cmd);
    }

    #[test]
    fn command_rejects_oversize_payload() {
        assert!(matches!(
            Command::new(1, 2, CommandNumber::new(5), vec![0u8; 256]),
            Err(MessageError::PayloadTooLong { .. })
        ));
    }

    #[test]
    fn command_rejects_wrong_descriptor() {
        let mut bytes = Command::new(1, 2, CommandNumber::new(5), vec![])
            .unwrap()
            .encode()
            .unwrap();
        bytes[1] = Descriptor::Acknowledgment as u8;
        assert!(matches!(
            Command::decode(&bytes),
            Err(MessageError::BadDescriptor(0x02))
        ));
    }

    #[test]
    fn command_rejects_short_payload() {
        // Header claims 3 payload bytes but only 1 follows.
        let bytes = [0x21, 0x01, 0x65, 0x03, 0x01];
        assert!(matches!(
            Command::decode(&bytes),
            Err(MessageError::Truncated { .. })
        ));
    }

    fn sample_telemetry() -> Telemetry {
        Telemetry {
            header: Header::new(2, 1),
            kind: TelemetryKind::B,
            voltage1: 11_850,
            voltage2: 7_400,
            pos_x: -120,
            pos_y: 45,
            pos_z: 2_310,
            vel_x: -3,
            vel_y: 0,
            vel_z: 194,
            acc_x: 12,
            acc_y: -8,
            acc_z: -981,
            memory_log: [61, 12, 47],
            status_flags: 0b1010_0001,
        }
    }

    #[test]
    fn telemetry_is_fixed_size() {
        assert_eq!(sample_telemetry().encode().len(), TELEMETRY_WIRE_LEN);
    }

    #[test]
    fn telemetry_round_trip() {
        let telemetry = sample_telemetry();
        let decoded = Telemetry::decode(&telemetry.encode()).unwrap();
        assert_eq!(decoded, telemetry);
    }

    #[test]
    fn telemetry_negative_values_survive() {
        let mut telemetry = sample_telemetry();
        telemetry.pos_x = i16::MIN;
        telemetry.acc_z = i16::MAX;
        let decoded = Telemetry::decode(&telemetry.encode()).unwrap();
        assert_eq!(decoded.pos_x, i16::MIN);
        assert_eq!(decoded.acc_z, i16::MAX);
    }

    #[test]
    fn telemetry_rejects_short_input() {
        let bytes = sample_telemetry().encode();
        assert!(matches!(
            Telemetry::decode(&bytes[..TELEMETRY_WIRE_LEN - 1]),
            Err(MessageError::Truncated { .. })
        ));
    }

    #[test]
    fn ack_round_trip() {
        let ack = Acknowledgment::new(Header::new(2, 1), CommandNumber::FIN_TEST);
        assert_eq!(ack.encode(), vec![0x12, 0x02, 0x65]);
        assert_eq!(Acknowledgment::decode(&ack.encode()).unwrap(), ack);
    }

    #[test]
    fn message_dispatch() {
        let cmd = Command::new(1, 2, CommandNumber::new(9), vec![7]).unwrap();
        assert!(matches!(
            Message::decode(&cmd.encode().unwrap()),
            Ok(Message::Command(_))
        ));

        let telemetry = sample_telemetry();
        assert!(matches!(
            Message::decode(&telemetry.encode()),
            Ok(Message::Telemetry(_))
        ));

        let ack = Acknowledgment::new(Header::new(1, 2), CommandNumber::new(9));
        assert!(matches!(
            Message::decode(&ack.encode()),
            Ok(Message::Acknowledgment(_))
        ));

        assert!(matches!(
            Message::decode(&[0x21, 0x7F, 0x00]),
            Err(MessageError::BadDescriptor(0x7F))
        ));
    }
}
