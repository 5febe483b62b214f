//! Reliable command delivery: priority queue, timeouts, retransmission.
//!
//! Pending commands live in two structures under one mutex: a binary heap
//! ordered by (priority desc, send time asc) that schedules work, and a map
//! keyed by command number that answers ack lookups in O(1). Acks remove
//! only the map record; the heap entry becomes a tombstone the worker skips
//! on pop, recognized by a stale generation counter.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::diagnostics::Diagnostics;
use crate::protocol::message::Command;
use crate::transport::TransportAdapter;
use crate::types::{CommandNumber, LinkEvent};

use super::callbacks::Callbacks;
use super::frame_payload;

/// Outcome of delivering an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The command was outstanding and is now complete.
    Acked,
    /// No such command was outstanding; duplicate or stray ack.
    Unexpected,
}

/// A command awaiting acknowledgment. Exclusively owned by the engine.
struct PendingCommand {
    command: Command,
    priority: i32,
    enqueued_at: Instant,
    last_send: Instant,
    retries: u32,
    generation: u64,
}

/// Scheduling entry. Highest priority wins; among equals, the earliest
/// send time goes first.
#[derive(Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    priority: i32,
    since: Instant,
    number: u8,
    generation: u64,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.since.cmp(&self.since))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

struct SenderState {
    queue: BinaryHeap<QueueEntry>,
    pending: HashMap<u8, PendingCommand>,
    next_generation: u64,
    running: bool,
}

/// Retransmission engine for outbound commands.
pub struct ReliableSender {
    state: Mutex<SenderState>,
    cv: Condvar,
    transport: Arc<TransportAdapter>,
    callbacks: Arc<Callbacks>,
    diagnostics: Arc<Diagnostics>,
    max_retries: u32,
    retry_interval: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReliableSender {
    pub fn new(
        transport: Arc<TransportAdapter>,
        callbacks: Arc<Callbacks>,
        diagnostics: Arc<Diagnostics>,
        max_retries: u32,
        retry_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SenderState {
                queue: BinaryHeap::new(),
                pending: HashMap::new(),
                next_generation: 0,
                running: false,
            }),
            cv: Condvar::new(),
            transport,
            callbacks,
            diagnostics,
            max_retries,
            retry_interval,
            worker: Mutex::new(None),
        })
    }

    /// Spawn the retransmission worker.
    pub fn start(self: &Arc<Self>) -> Result<(), std::io::Error> {
        {
            let mut state = self.state.lock();
            if state.running {
                return Ok(());
            }
            state.running = true;
        }
        let me = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("aerolink-retry".into())
            .spawn(move || me.worker_loop())?;
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Stop the worker and join it. Pending commands are retained.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
        }
        self.cv.notify_all();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }

    /// Track a command that the caller is transmitting right now.
    ///
    /// Returns false when the same command number is already outstanding;
    /// one instance per number at a time.
    pub fn submit(&self, command: Command, priority: i32) -> bool {
        let number = command.number.get();
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.pending.contains_key(&number) {
            return false;
        }
        let generation = state.next_generation;
        state.next_generation += 1;
        state.queue.push(QueueEntry {
            priority,
            since: now,
            number,
            generation,
        });
        state.pending.insert(
            number,
            PendingCommand {
                command,
                priority,
                enqueued_at: now,
                last_send: now,
                retries: 0,
                generation,
            },
        );
        drop(state);
        self.diagnostics.command_submitted();
        self.cv.notify_one();
        true
    }

    /// Complete the command bearing `number`, if it is outstanding.
    pub fn ack(&self, number: CommandNumber) -> AckOutcome {
        let removed = self.state.lock().pending.remove(&number.get());
        match removed {
            Some(record) => {
                self.diagnostics
                    .record_ack_latency(record.last_send.elapsed());
                self.diagnostics.command_acked();
                debug!(%number, retries = record.retries, "command acknowledged");
                self.cv.notify_one();
                AckOutcome::Acked
            }
            None => {
                self.diagnostics.unexpected_ack();
                debug!(%number, "ack for command that is not outstanding");
                AckOutcome::Unexpected
            }
        }
    }

    /// Number of commands currently awaiting acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Time a command has been outstanding, if it is.
    pub fn outstanding_for(&self, number: CommandNumber) -> Option<Duration> {
        self.state
            .lock()
            .pending
            .get(&number.get())
            .map(|record| record.enqueued_at.elapsed())
    }

    fn worker_loop(&self) {
        debug!("reliable-send worker started");
        loop {
            let gave_up = {
                let mut state = self.state.lock();
                loop {
                    if !state.running {
                        debug!("reliable-send worker stopping");
                        return;
                    }
                    let Some(&top) = state.queue.peek() else {
                        self.cv.wait(&mut state);
                        continue;
                    };
                    let now = Instant::now();
                    let (due, retries) = match state.pending.get(&top.number) {
                        Some(record) if record.generation == top.generation => {
                            (record.last_send + self.retry_interval, record.retries)
                        }
                        _ => {
                            // Tombstone: the record was acked or superseded.
                            state.queue.pop();
                            continue;
                        }
                    };
                    if now < due {
                        self.cv.wait_until(&mut state, due);
                        continue;
                    }
                    state.queue.pop();
                    if retries >= self.max_retries {
                        if let Some(record) = state.pending.remove(&top.number) {
                            self.diagnostics.command_gave_up();
                            warn!(
                                number = %record.command.number,
                                retries = record.retries,
                                "command gave up without acknowledgment"
                            );
                        }
                        break top.number;
                    }
                    self.retransmit(&mut state, top.number, now);
                }
            };
            // Event dispatch happens outside the lock so a callback may
            // re-enter submit().
            self.callbacks
                .invoke_event(LinkEvent::CommandGaveUp(CommandNumber::new(gave_up)));
        }
    }

    /// Retransmit the command through the full frame assembly pipeline and
    /// reschedule it.
    fn retransmit(&self, state: &mut SenderState, number: u8, now: Instant) {
        let generation = state.next_generation;
        state.next_generation += 1;
        let Some(record) = state.pending.get_mut(&number) else {
            return;
        };
        record.retries += 1;
        record.last_send = now;
        record.generation = generation;
        self.diagnostics.retransmission();
        debug!(
            number = %record.command.number,
            retry = record.retries,
            "retransmitting command"
        );

        match record
            .command
            .encode()
            .map_err(crate::Error::from)
            .and_then(|bytes| frame_payload(bytes))
        {
            Ok(wire) => {
                if let Err(e) = self.transport.send(wire) {
                    warn!(error = %e, number, "retransmission send failed");
                    self.diagnostics.transport_error();
                } else {
                    self.diagnostics.frame_sent();
                }
            }
            Err(e) => {
                // Commands are validated at submit; an unframeable one is a
                // bug upstream. Keep the record so it ages out via retries.
                warn!(error = %e, number, "command could not be framed");
            }
        }

        state.queue.push(QueueEntry {
            priority: record.priority,
            since: now,
            number,
            generation,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::Header;

    fn entry(priority: i32, since: Instant, number: u8) -> QueueEntry {
        QueueEntry {
            priority,
            since,
            number,
            generation: 0,
        }
    }

    #[test]
    fn heap_orders_by_priority_then_age() {
        let base = Instant::now();
        let mut heap = BinaryHeap::new();
        heap.push(entry(1, base, 1));
        heap.push(entry(9, base + Duration::from_millis(1), 2));
        heap.push(entry(9, base + Duration::from_millis(2), 3));

        assert_eq!(heap.pop().map(|e| e.number), Some(2));
        assert_eq!(heap.pop().map(|e| e.number), Some(3));
        assert_eq!(heap.pop().map(|e| e.number), Some(1));
    }

    #[test]
    fn submit_rejects_duplicate_number() {
        let (ground, _vehicle) = crate::transport::loopback_pair();
        let transport = TransportAdapter::new(ground);
        let sender = ReliableSender::new(
            transport,
            Arc::new(Callbacks::new()),
            Arc::new(Diagnostics::default()),
            5,
            Duration::from_millis(500),
        );
        let command = Command {
            header: Header::new(1, 2),
            number: CommandNumber::FIN_TEST,
            payload: vec![],
            priority: 0,
        };
        assert!(sender.submit(command.clone(), 0));
        assert!(!sender.submit(command.clone(), 3));
        assert_eq!(sender.pending_count(), 1);

        assert_eq!(sender.ack(CommandNumber::FIN_TEST), AckOutcome::Acked);
        assert_eq!(sender.pending_count(), 0);
        // Completed; the number is free again.
        assert!(sender.submit(command, 0));
    }

    #[test]
    fn duplicate_ack_is_unexpected() {
        let (ground, _vehicle) = crate::transport::loopback_pair();
        let transport = TransportAdapter::new(ground);
        let sender = ReliableSender::new(
            transport,
            Arc::new(Callbacks::new()),
            Arc::new(Diagnostics::default()),
            5,
            Duration::from_millis(500),
        );
        let command = Command {
            header: Header::new(1, 2),
            number: CommandNumber::new(33),
            payload: vec![],
            priority: 0,
        };
        assert!(sender.submit(command, 0));
        assert_eq!(sender.ack(CommandNumber::new(33)), AckOutcome::Acked);
        assert_eq!(sender.ack(CommandNumber::new(33)), AckOutcome::Unexpected);
    }
}
