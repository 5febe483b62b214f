//! Transport layer for Aerolink.
//!
//! The core talks to hardware through the [`RadioDriver`] trait; vendor
//! modules (serial modems, packet radios) implement it out of tree. The
//! [`TransportAdapter`] owns the send queue and the worker threads that
//! shuttle frames between the protocol engine and the driver.

mod adapter;
mod loopback;

pub use adapter::{FrameHandler, TransportAdapter};
pub use loopback::{loopback_pair, LoopbackRadio};

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Radio module configuration; opaque to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Operating frequency in Hertz.
    #[serde(default = "default_frequency")]
    pub frequency_hz: u32,

    /// Communication speed in bits per second.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Transmission power level (0-100).
    #[serde(default = "default_power_level")]
    pub power_level: u8,

    /// Radio channel to operate on.
    #[serde(default = "default_channel")]
    pub channel: u8,

    /// Modulation mode (e.g. "afsk", "fsk", "ook").
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_frequency() -> u32 {
    915_000_000
}
fn default_baud_rate() -> u32 {
    57_600
}
fn default_power_level() -> u8 {
    50
}
fn default_channel() -> u8 {
    1
}
fn default_mode() -> String {
    "afsk".to_string()
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            frequency_hz: default_frequency(),
            baud_rate: default_baud_rate(),
            power_level: default_power_level(),
            channel: default_channel(),
            mode: default_mode(),
        }
    }
}

/// Radio status metrics reported by a driver.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RadioStatus {
    pub initialized: bool,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub transmit_errors: u64,
    pub receive_errors: u64,
    /// Current signal strength (RSSI), dBm.
    pub rssi: i32,
}

/// Byte transport consumed by the core.
///
/// Implementations deliver whatever the link hands them — one complete
/// frame per call or an arbitrary slice of a byte stream; the adapter
/// reassembles at start-byte boundaries either way.
pub trait RadioDriver: Send + Sync {
    /// Prepare the link; called once before any traffic.
    fn initialize(&self) -> Result<(), TransportError>;

    /// Transmit one complete assembled frame.
    fn send_frame(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Next received byte sequence, or `None` when nothing arrived within
    /// the driver's short poll interval.
    fn receive_frame(&self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Apply radio parameters.
    fn configure(&self, config: &RadioConfig) -> Result<(), TransportError>;

    /// Current status metrics.
    fn status(&self) -> RadioStatus;
}
