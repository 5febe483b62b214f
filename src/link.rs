//! Top-level link facade wiring all components together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::LinkConfig;
use crate::diagnostics::{Diagnostics, DiagnosticsSnapshot, LinkQuality};
use crate::engine::{Callbacks, ProtocolEngine, ReliableSender};
use crate::error::{EngineError, Result};
use crate::protocol::message::{Command, Telemetry};
use crate::telemetry::TelemetryBuffer;
use crate::transport::{RadioDriver, RadioStatus, TransportAdapter};
use crate::types::CommandNumber;

/// One endpoint of the command-and-telemetry link.
///
/// Construct with a radio driver and a configuration, register callbacks,
/// then [`start`](Self::start). Dropping the link stops it.
pub struct AeroLink {
    config: LinkConfig,
    driver: Arc<dyn RadioDriver>,
    transport: Arc<TransportAdapter>,
    engine: Arc<ProtocolEngine>,
    reliable: Arc<ReliableSender>,
    callbacks: Arc<Callbacks>,
    diagnostics: Arc<Diagnostics>,
    telemetry: Arc<TelemetryBuffer>,
    running: AtomicBool,
}

impl AeroLink {
    pub fn new(driver: Arc<dyn RadioDriver>, config: LinkConfig) -> Result<Self> {
        config.validate()?;

        let callbacks = Arc::new(Callbacks::new());
        let diagnostics = Arc::new(Diagnostics::new(config.diagnostics_interval));
        let telemetry = Arc::new(TelemetryBuffer::new(config.telemetry_buffer_capacity));
        let transport = TransportAdapter::new(Arc::clone(&driver));
        let reliable = ReliableSender::new(
            Arc::clone(&transport),
            Arc::clone(&callbacks),
            Arc::clone(&diagnostics),
            config.max_retries,
            config.retry_interval,
        );
        let engine = ProtocolEngine::new(
            Arc::clone(&transport),
            Arc::clone(&reliable),
            Arc::clone(&callbacks),
            Arc::clone(&diagnostics),
            Arc::clone(&telemetry),
        );
        engine.attach();

        Ok(Self {
            config,
            driver,
            transport,
            engine,
            reliable,
            callbacks,
            diagnostics,
            telemetry,
            running: AtomicBool::new(false),
        })
    }

    /// Initialize the radio and spin up the worker threads.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.driver.initialize()?;
        self.driver.configure(&self.config.radio)?;
        self.transport.start()?;
        self.reliable.start()?;
        info!(
            local = self.config.local_id,
            remote = self.config.remote_id,
            "link started"
        );
        Ok(())
    }

    /// Stop all workers: reliable-send engine first, then transport.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.reliable.stop();
        self.transport.stop();
        info!("link stopped");
    }

    /// Build a command addressed from this endpoint to its peer.
    pub fn command(&self, number: CommandNumber, payload: Vec<u8>) -> Result<Command> {
        Ok(Command::new(
            self.config.local_id,
            self.config.remote_id,
            number,
            payload,
        )?)
    }

    /// Queue a command for reliable delivery at its own priority.
    ///
    /// Returns false when the command number is already outstanding.
    pub fn send_command(&self, command: &Command) -> Result<bool> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(EngineError::NotRunning.into());
        }
        self.engine.send_command(command)
    }

    /// Transmit a telemetry record without reliability.
    pub fn send_telemetry(&self, telemetry: &Telemetry) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(EngineError::NotRunning.into());
        }
        self.engine.send_telemetry(telemetry)
    }

    /// Most recent telemetry received from the peer, if any.
    pub fn latest_telemetry(&self) -> Option<Telemetry> {
        self.telemetry.latest()
    }

    /// The retained telemetry history.
    pub fn telemetry_buffer(&self) -> &TelemetryBuffer {
        &self.telemetry
    }

    /// Callback registration surface.
    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    /// Point-in-time diagnostics.
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Feed radio-quality figures into the diagnostics.
    pub fn update_link_quality(&self, quality: LinkQuality) {
        self.diagnostics.update_link_quality(quality);
    }

    /// Commands currently awaiting acknowledgment.
    pub fn pending_commands(&self) -> usize {
        self.reliable.pending_count()
    }

    /// Driver status passthrough.
    pub fn radio_status(&self) -> RadioStatus {
        self.driver.status()
    }

    /// Active configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}

impl Drop for AeroLink {
    fn drop(&mut self) {
        self.stop();
    }
}
