//! In-memory radio pair for tests, demos, and bench rigs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;

use crate::error::TransportError;

use super::{RadioConfig, RadioDriver, RadioStatus};

/// One endpoint of an in-memory radio link.
///
/// Frames sent on one endpoint appear at the other, unless outbound drop is
/// engaged — which models the vehicle flying out of range.
pub struct LoopbackRadio {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    poll_interval: Duration,
    initialized: AtomicBool,
    drop_outbound: AtomicBool,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    config: RwLock<RadioConfig>,
}

/// Create two connected loopback endpoints.
pub fn loopback_pair() -> (Arc<LoopbackRadio>, Arc<LoopbackRadio>) {
    let (a_tx, b_rx) = unbounded();
    let (b_tx, a_rx) = unbounded();
    (
        Arc::new(LoopbackRadio::new(a_tx, a_rx)),
        Arc::new(LoopbackRadio::new(b_tx, b_rx)),
    )
}

impl LoopbackRadio {
    fn new(tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>) -> Self {
        Self {
            tx,
            rx,
            poll_interval: Duration::from_millis(10),
            initialized: AtomicBool::new(false),
            drop_outbound: AtomicBool::new(false),
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            config: RwLock::new(RadioConfig::default()),
        }
    }

    /// Silently discard every outbound frame while engaged.
    pub fn set_drop_outbound(&self, drop: bool) {
        self.drop_outbound.store(drop, Ordering::SeqCst);
    }
}

impl RadioDriver for LoopbackRadio {
    fn initialize(&self) -> Result<(), TransportError> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn send_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.drop_outbound.load(Ordering::SeqCst) {
            // Lost on the air; the sender cannot tell.
            return Ok(());
        }
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.tx
            .send(frame.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn receive_frame(&self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.rx.recv_timeout(self.poll_interval) {
            Ok(frame) => {
                self.frames_received.fetch_add(1, Ordering::Relaxed);
                Ok(Some(frame))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn configure(&self, config: &RadioConfig) -> Result<(), TransportError> {
        *self.config.write() = config.clone();
        Ok(())
    }

    fn status(&self) -> RadioStatus {
        RadioStatus {
            initialized: self.initialized.load(Ordering::SeqCst),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            transmit_errors: 0,
            receive_errors: 0,
            rssi: -40,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_cross_the_pair() {
        let (ground, vehicle) = loopback_pair();
        ground.send_frame(&[1, 2, 3]).unwrap();
        assert_eq!(vehicle.receive_frame().unwrap(), Some(vec![1, 2, 3]));
        vehicle.send_frame(&[4]).unwrap();
        assert_eq!(ground.receive_frame().unwrap(), Some(vec![4]));
    }

    #[test]
    fn receive_times_out_when_idle() {
        let (ground, _vehicle) = loopback_pair();
        assert_eq!(ground.receive_frame().unwrap(), None);
    }

    #[test]
    fn dropped_frames_never_arrive() {
        let (ground, vehicle) = loopback_pair();
        ground.set_drop_outbound(true);
        ground.send_frame(&[9]).unwrap();
        assert_eq!(vehicle.receive_frame().unwrap(), None);
        assert_eq!(ground.status().frames_sent, 0);
    }

    #[test]
    fn disconnect_surfaces_closed() {
        let (ground, vehicle) = loopback_pair();
        drop(vehicle);
        assert_eq!(ground.send_frame(&[1]), Err(TransportError::Closed));
    }
}
