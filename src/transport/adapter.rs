//! Send queue and receive dispatch for a radio driver.
//!
//! One worker drains the outbound frame queue into the driver; another
//! polls the driver for inbound bytes, reassembles complete frames at
//! start-byte boundaries, and hands each frame to the registered handler
//! synchronously.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::{Buf, BytesMut};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::protocol::checksum::popcount_mod4;
use crate::protocol::{frame_wire_len, MAX_PAYLOAD_LEN, START_BYTE};

use super::RadioDriver;

/// Handler invoked on the receive worker with each complete inbound frame.
pub type FrameHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

struct SendQueue {
    frames: VecDeque<Vec<u8>>,
    open: bool,
}

/// Duplex byte-transport adapter around a [`RadioDriver`].
pub struct TransportAdapter {
    driver: Arc<dyn RadioDriver>,
    queue: Mutex<SendQueue>,
    queue_cv: Condvar,
    handler: Mutex<Option<FrameHandler>>,
    running: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TransportAdapter {
    pub fn new(driver: Arc<dyn RadioDriver>) -> Arc<Self> {
        Arc::new(Self {
            driver,
            queue: Mutex::new(SendQueue {
                frames: VecDeque::new(),
                open: false,
            }),
            queue_cv: Condvar::new(),
            handler: Mutex::new(None),
            running: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Register the handler invoked with each complete inbound frame.
    ///
    /// Safe to call at any time; replacement does not drop an in-flight
    /// invocation.
    pub fn set_frame_handler(&self, handler: FrameHandler) {
        *self.handler.lock() = Some(handler);
    }

    /// Enqueue one assembled frame for transmission. Non-blocking.
    pub fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        let mut queue = self.queue.lock();
        if !queue.open {
            return Err(TransportError::Closed);
        }
        queue.frames.push_back(frame);
        drop(queue);
        self.queue_cv.notify_one();
        Ok(())
    }

    /// Spawn the send and receive workers.
    pub fn start(self: &Arc<Self>) -> Result<(), TransportError> {
        {
            let mut queue = self.queue.lock();
            if queue.open {
                return Ok(());
            }
            queue.open = true;
        }
        self.running.store(true, Ordering::SeqCst);

        let sender = Arc::clone(self);
        let send_worker = std::thread::Builder::new()
            .name("aerolink-send".into())
            .spawn(move || sender.send_loop())
            .map_err(|e| TransportError::IoFailure(e.to_string()))?;

        let receiver = Arc::clone(self);
        let recv_worker = std::thread::Builder::new()
            .name("aerolink-recv".into())
            .spawn(move || receiver.recv_loop())
            .map_err(|e| TransportError::IoFailure(e.to_string()))?;

        self.workers.lock().extend([send_worker, recv_worker]);
        Ok(())
    }

    /// Stop both workers and join them.
    pub fn stop(&self) {
        {
            let mut queue = self.queue.lock();
            if !queue.open {
                return;
            }
            queue.open = false;
        }
        self.running.store(false, Ordering::SeqCst);
        self.queue_cv.notify_all();

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.join();
        }
    }

    /// Number of frames waiting in the send queue.
    pub fn backlog(&self) -> usize {
        self.queue.lock().frames.len()
    }

    fn send_loop(&self) {
        debug!("transport send worker started");
        loop {
            let frame = {
                let mut queue = self.queue.lock();
                loop {
                    if !queue.open {
                        debug!("transport send worker stopping");
                        return;
                    }
                    if let Some(frame) = queue.frames.pop_front() {
                        break frame;
                    }
                    self.queue_cv.wait(&mut queue);
                }
            };
            if let Err(e) = self.driver.send_frame(&frame) {
                warn!(error = %e, len = frame.len(), "radio send failed");
            }
        }
    }

    fn recv_loop(&self) {
        debug!("transport receive worker started");
        let mut buf = BytesMut::new();
        while self.running.load(Ordering::SeqCst) {
            match self.driver.receive_frame() {
                Ok(Some(chunk)) => {
                    buf.extend_from_slice(&chunk);
                    self.drain_frames(&mut buf);
                }
                Ok(None) => {}
                Err(TransportError::Closed) => {
                    debug!("radio link closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "radio receive failed");
                }
            }
        }
        debug!("transport receive worker stopped");
    }

    /// Carve complete frames out of the stream buffer and dispatch them.
    fn drain_frames(&self, buf: &mut BytesMut) {
        loop {
            match buf.iter().position(|&b| b == START_BYTE) {
                Some(0) => {}
                Some(skip) => {
                    trace!(skipped = skip, "resynchronizing to start byte");
                    buf.advance(skip);
                }
                None => {
                    buf.clear();
                    return;
                }
            }

            if buf.len() < 2 {
                return;
            }

            // Vet the length byte before trusting it for framing; a failed
            // check means this start byte was payload noise, not a frame
            // boundary.
            let length_byte = buf[1];
            let payload_len = ((length_byte >> 2) & 0x3F) as usize;
            let checksum_ok = (length_byte & 0x03) == popcount_mod4((length_byte >> 2) & 0x3F);
            if !checksum_ok || payload_len > MAX_PAYLOAD_LEN {
                trace!(length_byte, "rejecting false frame boundary");
                buf.advance(1);
                continue;
            }

            let total = frame_wire_len(payload_len);
            if buf.len() < total {
                return;
            }

            let frame = buf.split_to(total);
            self.dispatch(&frame);
        }
    }

    fn dispatch(&self, frame: &[u8]) {
        // Copy the handler out so registration never blocks on a slow
        // callback.
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Frame;
    use crate::transport::{RadioConfig, RadioStatus};
    use parking_lot::Mutex as PlMutex;
    use std::time::Duration;

    /// Driver that replays scripted byte chunks.
    struct ScriptedRadio {
        chunks: PlMutex<VecDeque<Vec<u8>>>,
        sent: PlMutex<Vec<Vec<u8>>>,
    }

    impl ScriptedRadio {
        fn new(chunks: Vec<Vec<u8>>) -> Arc<Self> {
            Arc::new(Self {
                chunks: PlMutex::new(chunks.into()),
                sent: PlMutex::new(Vec::new()),
            })
        }
    }

    impl RadioDriver for ScriptedRadio {
        fn initialize(&self) -> Result<(), TransportError> {
            Ok(())
        }

        fn send_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
            self.sent.lock().push(frame.to_vec());
            Ok(())
        }

        fn receive_frame(&self) -> Result<Option<Vec<u8>>, TransportError> {
            match self.chunks.lock().pop_front() {
                Some(chunk) => Ok(Some(chunk)),
                None => {
                    std::thread::sleep(Duration::from_millis(5));
                    Ok(None)
                }
            }
        }

        fn configure(&self, _config: &RadioConfig) -> Result<(), TransportError> {
            Ok(())
        }

        fn status(&self) -> RadioStatus {
            RadioStatus::default()
        }
    }

    fn wire_frame(payload: &[u8]) -> Vec<u8> {
        Frame::new(payload.to_vec()).unwrap().assemble().unwrap()
    }

    fn collect_frames(chunks: Vec<Vec<u8>>, expected: usize) -> Vec<Vec<u8>> {
        let radio = ScriptedRadio::new(chunks);
        let adapter = TransportAdapter::new(radio);
        let received = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        adapter.set_frame_handler(Arc::new(move |frame| {
            sink.lock().push(frame.to_vec());
        }));
        adapter.start().unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while received.lock().len() < expected && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        adapter.stop();
        let frames = received.lock().clone();
        frames
    }

    #[test]
    fn whole_frame_per_chunk() {
        let wire = wire_frame(&[1, 2, 3]);
        let frames = collect_frames(vec![wire.clone()], 1);
        assert_eq!(frames, vec![wire]);
    }

    #[test]
    fn split_frame_across_chunks() {
        let wire = wire_frame(&[9, 8, 7, 6]);
        let (a, b) = wire.split_at(3);
        let frames = collect_frames(vec![a.to_vec(), b.to_vec()], 1);
        assert_eq!(frames, vec![wire]);
    }

    #[test]
    fn two_frames_in_one_chunk() {
        let first = wire_frame(&[1]);
        let second = wire_frame(&[0xAA, 0xAA]);
        let mut chunk = first.clone();
        chunk.extend_from_slice(&second);
        let frames = collect_frames(vec![chunk], 2);
        assert_eq!(frames, vec![first, second]);
    }

    #[test]
    fn leading_noise_is_skipped() {
        let wire = wire_frame(&[5, 5, 5]);
        let mut chunk = vec![0x00, 0x13, 0x37];
        chunk.extend_from_slice(&wire);
        let frames = collect_frames(vec![chunk], 1);
        assert_eq!(frames, vec![wire]);
    }

    #[test]
    fn false_start_byte_resyncs() {
        // 0xAA followed by a length byte that flunks its checksum must not
        // swallow the real frame behind it.
        let wire = wire_frame(&[1, 2]);
        let mut chunk = vec![START_BYTE, 0xFF];
        chunk.extend_from_slice(&wire);
        let frames = collect_frames(vec![chunk], 1);
        assert_eq!(frames, vec![wire]);
    }

    #[test]
    fn send_after_stop_is_closed() {
        let radio = ScriptedRadio::new(vec![]);
        let adapter = TransportAdapter::new(radio);
        adapter.start().unwrap();
        adapter.stop();
        assert_eq!(adapter.send(vec![0xAA]), Err(TransportError::Closed));
    }

    #[test]
    fn queued_frames_reach_the_driver() {
        let radio = ScriptedRadio::new(vec![]);
        let adapter = TransportAdapter::new(Arc::clone(&radio) as Arc<dyn RadioDriver>);
        adapter.start().unwrap();
        let wire = wire_frame(&[0xAA, 1, 2]);
        adapter.send(wire.clone()).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while radio.sent.lock().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        adapter.stop();
        assert_eq!(*radio.sent.lock(), vec![wire]);
    }
}
