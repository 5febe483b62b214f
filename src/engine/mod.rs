//! Protocol engine: inbound routing and outbound transmission.
//!
//! Outbound, the engine encodes messages, frames them, and hands them to
//! the transport; commands are additionally recorded with the reliable-send
//! engine. Inbound, it disassembles each frame and routes by descriptor:
//! commands and telemetry go to user callbacks, acknowledgments to the
//! reliable-send engine. Decode failures never propagate — they are
//! counted and dropped.

pub mod callbacks;
pub mod reliability;

pub use callbacks::Callbacks;
pub use reliability::{AckOutcome, ReliableSender};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::diagnostics::Diagnostics;
use crate::error::{EngineError, Result};
use crate::protocol::message::{Acknowledgment, Command, Telemetry};
use crate::protocol::Frame;
use crate::telemetry::TelemetryBuffer;
use crate::transport::TransportAdapter;
use crate::types::{Descriptor, LinkEvent};

/// Encode a message payload into its complete on-wire frame.
pub(crate) fn frame_payload(payload: Vec<u8>) -> Result<Vec<u8>> {
    Ok(Frame::new(payload)?.assemble()?)
}

/// Routes traffic between the transport, the reliable-send engine, and the
/// user callbacks.
pub struct ProtocolEngine {
    transport: Arc<TransportAdapter>,
    reliable: Arc<ReliableSender>,
    callbacks: Arc<Callbacks>,
    diagnostics: Arc<Diagnostics>,
    telemetry: Arc<TelemetryBuffer>,
}

impl ProtocolEngine {
    pub fn new(
        transport: Arc<TransportAdapter>,
        reliable: Arc<ReliableSender>,
        callbacks: Arc<Callbacks>,
        diagnostics: Arc<Diagnostics>,
        telemetry: Arc<TelemetryBuffer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            reliable,
            callbacks,
            diagnostics,
            telemetry,
        })
    }

    /// Install this engine as the transport's inbound frame handler.
    pub fn attach(self: &Arc<Self>) {
        let me = Arc::clone(self);
        self.transport
            .set_frame_handler(Arc::new(move |frame| me.handle_frame(frame)));
    }

    /// Validate, frame, and transmit a command, recording it for
    /// retransmission until acknowledged.
    ///
    /// Returns false when the command's number is already outstanding.
    pub fn send_command(&self, command: &Command) -> Result<bool> {
        if !command.is_valid() {
            return Err(EngineError::InvalidCommand.into());
        }
        let wire = frame_payload(command.encode()?)?;
        if !self.reliable.submit(command.clone(), command.priority) {
            debug!(number = %command.number, "command already outstanding");
            return Ok(false);
        }
        self.transport.send(wire)?;
        self.diagnostics.frame_sent();
        Ok(true)
    }

    /// Frame and transmit a telemetry record. Fire-and-forget.
    pub fn send_telemetry(&self, telemetry: &Telemetry) -> Result<()> {
        let wire = frame_payload(telemetry.encode())?;
        self.transport.send(wire)?;
        self.diagnostics.frame_sent();
        Ok(())
    }

    /// Frame and transmit an acknowledgment for a received command.
    fn send_ack(&self, command: &Command) {
        let ack = Acknowledgment::new(command.header.reply(), command.number);
        let sent =
            frame_payload(ack.encode()).and_then(|wire| self.transport.send(wire).map_err(Into::into));
        match sent {
            Ok(()) => self.diagnostics.frame_sent(),
            Err(e) => {
                warn!(error = %e, number = %command.number, "failed to send ack");
                self.diagnostics.transport_error();
            }
        }
    }

    /// Process one raw inbound frame. Runs on the receive worker.
    fn handle_frame(&self, raw: &[u8]) {
        self.diagnostics.frame_received();

        let frame = match Frame::disassemble(raw) {
            Ok(frame) => frame,
            Err(e) => {
                self.diagnostics.decode_error();
                debug!(error = %e, len = raw.len(), "dropping undecodable frame");
                return;
            }
        };

        let payload = frame.payload();
        if payload.len() < 2 {
            self.diagnostics.decode_error();
            debug!(len = payload.len(), "dropping frame with short payload");
            return;
        }

        match Descriptor::from_u8(payload[1]) {
            Some(Descriptor::Command) => match Command::decode(payload) {
                Ok(command) => {
                    debug!(number = %command.number, header = %command.header, "command received");
                    self.send_ack(&command);
                    self.callbacks.invoke_command(&command);
                }
                Err(e) => {
                    self.diagnostics.decode_error();
                    debug!(error = %e, "dropping malformed command");
                }
            },
            Some(d) if d.is_telemetry() => match Telemetry::decode(payload) {
                Ok(telemetry) => {
                    self.telemetry.push(telemetry);
                    self.callbacks.invoke_telemetry(&telemetry);
                }
                Err(e) => {
                    self.diagnostics.decode_error();
                    debug!(error = %e, "dropping malformed telemetry");
                }
            },
            Some(Descriptor::Acknowledgment) => match Acknowledgment::decode(payload) {
                Ok(ack) => {
                    let event = match self.reliable.ack(ack.acked) {
                        AckOutcome::Acked => LinkEvent::CommandAcked(ack.acked),
                        AckOutcome::Unexpected => LinkEvent::UnexpectedAck(ack.acked),
                    };
                    self.callbacks.invoke_event(event);
                }
                Err(e) => {
                    self.diagnostics.decode_error();
                    debug!(error = %e, "dropping malformed acknowledgment");
                }
            },
            _ => {
                self.diagnostics.unknown_descriptor();
                warn!(descriptor = payload[1], "unknown payload descriptor");
                self.callbacks
                    .invoke_event(LinkEvent::UnknownDescriptor(payload[1]));
            }
        }

        if self.diagnostics.should_report() {
            self.callbacks
                .invoke_diagnostics(&self.diagnostics.snapshot());
        }
    }
}
