//! # Aerolink
//!
//! Bidirectional, reliable command-and-telemetry link between a ground
//! station and an airborne vehicle over a low-bandwidth radio.
//!
//! Aerolink layers three things on top of a byte-oriented radio driver:
//! a self-synchronizing framed packet codec, an application protocol of
//! Command / Telemetry / Acknowledgment messages, and a retransmission
//! engine that drives commands to completion under lossy conditions.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Application / User                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │   AeroLink facade  (callbacks, telemetry buffer, config)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Protocol engine          │       Reliable-send engine      │
//! │  (descriptor routing)     │  (priority queue, retries, ack) │
//! ├─────────────────────────────────────────────────────────────┤
//! │   Message codec  (Command / Telemetry / Acknowledgment)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │   Frame codec  (start byte, stuffing, checksums, CRC-8)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │   Transport adapter  (send queue, receive reassembly)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │   RadioDriver  (serial link, vendor module, loopback)       │
//! └─────────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)] // Wire fields are bounded before casting
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)] // ASCII diagrams in docs

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod link;
pub mod protocol;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use config::LinkConfig;
pub use error::{Error, Result};
pub use link::AeroLink;
pub use types::{CommandNumber, Descriptor, LinkEvent, NodeId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::LinkConfig;
    pub use crate::diagnostics::{Diagnostics, DiagnosticsSnapshot};
    pub use crate::engine::{Callbacks, ProtocolEngine, ReliableSender};
    pub use crate::error::{Error, Result};
    pub use crate::link::AeroLink;
    pub use crate::protocol::message::{
        Acknowledgment, Command, Header, Message, Telemetry, TelemetryKind,
    };
    pub use crate::telemetry::TelemetryBuffer;
    pub use crate::transport::{
        loopback_pair, LoopbackRadio, RadioConfig, RadioDriver, RadioStatus, TransportAdapter,
    };
    pub use crate::types::{CommandNumber, Descriptor, LinkEvent, NodeId};
}
