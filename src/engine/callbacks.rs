//! User callback registration and dispatch.
//!
//! Each slot sits behind its own mutex so registration is race-free at any
//! time; dispatch copies the callback out and releases the lock first, so
//! a concurrent replacement never drops an in-flight invocation.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::diagnostics::DiagnosticsSnapshot;
use crate::protocol::message::{Command, Telemetry};
use crate::types::LinkEvent;

pub type CommandCallback = Arc<dyn Fn(&Command) + Send + Sync>;
pub type TelemetryCallback = Arc<dyn Fn(&Telemetry) + Send + Sync>;
pub type DiagnosticsCallback = Arc<dyn Fn(&DiagnosticsSnapshot) + Send + Sync>;
pub type EventCallback = Arc<dyn Fn(LinkEvent) + Send + Sync>;

/// Hooks the user registers to observe link activity.
///
/// Callbacks run on the core's worker threads and should return promptly;
/// an integration that needs a specific thread can forward into its own
/// queue.
#[derive(Default)]
pub struct Callbacks {
    command: Mutex<Option<CommandCallback>>,
    telemetry: Mutex<Option<TelemetryCallback>>,
    diagnostics: Mutex<Option<DiagnosticsCallback>>,
    event: Mutex<Option<EventCallback>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoked for each inbound valid command.
    pub fn set_command_callback(&self, cb: impl Fn(&Command) + Send + Sync + 'static) {
        *self.command.lock() = Some(Arc::new(cb));
    }

    /// Invoked for each inbound valid telemetry record.
    pub fn set_telemetry_callback(&self, cb: impl Fn(&Telemetry) + Send + Sync + 'static) {
        *self.telemetry.lock() = Some(Arc::new(cb));
    }

    /// Invoked on rate-limited diagnostics updates.
    pub fn set_diagnostics_callback(
        &self,
        cb: impl Fn(&DiagnosticsSnapshot) + Send + Sync + 'static,
    ) {
        *self.diagnostics.lock() = Some(Arc::new(cb));
    }

    /// Invoked on protocol events (acks, give-ups, unknown descriptors).
    pub fn set_event_callback(&self, cb: impl Fn(LinkEvent) + Send + Sync + 'static) {
        *self.event.lock() = Some(Arc::new(cb));
    }

    pub(crate) fn invoke_command(&self, command: &Command) {
        let cb = self.command.lock().clone();
        if let Some(cb) = cb {
            cb(command);
        }
    }

    pub(crate) fn invoke_telemetry(&self, telemetry: &Telemetry) {
        let cb = self.telemetry.lock().clone();
        if let Some(cb) = cb {
            cb(telemetry);
        }
    }

    pub(crate) fn invoke_diagnostics(&self, snapshot: &DiagnosticsSnapshot) {
        let cb = self.diagnostics.lock().clone();
        if let Some(cb) = cb {
            cb(snapshot);
        }
    }

    pub(crate) fn invoke_event(&self, event: LinkEvent) {
        let cb = self.event.lock().clone();
        if let Some(cb) = cb {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommandNumber;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn unregistered_slots_are_noops() {
        let callbacks = Callbacks::new();
        callbacks.invoke_event(LinkEvent::UnknownDescriptor(0x7F));
        callbacks.invoke_diagnostics(&DiagnosticsSnapshot::default());
    }

    #[test]
    fn registered_callback_fires() {
        let callbacks = Callbacks::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        callbacks.set_event_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        callbacks.invoke_event(LinkEvent::CommandAcked(CommandNumber::FIN_TEST));
        callbacks.invoke_event(LinkEvent::CommandGaveUp(CommandNumber::FIN_TEST));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn replacement_takes_effect() {
        let callbacks = Callbacks::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        callbacks.set_event_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        callbacks.invoke_event(LinkEvent::UnknownDescriptor(1));

        let counter = Arc::clone(&second);
        callbacks.set_event_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        callbacks.invoke_event(LinkEvent::UnknownDescriptor(2));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}
