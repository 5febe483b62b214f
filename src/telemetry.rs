//! Ring buffer for received telemetry records.

use parking_lot::Mutex;

use crate::protocol::message::Telemetry;

struct Inner {
    slots: Vec<Telemetry>,
    head: usize,
    len: usize,
}

/// Thread-safe circular buffer holding the most recent telemetry.
///
/// Once full, each push overwrites the oldest record.
pub struct TelemetryBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl TelemetryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                slots: vec![Telemetry::default(); capacity],
                head: 0,
                len: 0,
            }),
            capacity,
        }
    }

    /// Append a record, overwriting the oldest when full.
    pub fn push(&self, telemetry: Telemetry) {
        let mut inner = self.inner.lock();
        let head = inner.head;
        inner.slots[head] = telemetry;
        inner.head = (head + 1) % self.capacity;
        if inner.len < self.capacity {
            inner.len += 1;
        }
    }

    /// Most recent record, if any.
    pub fn latest(&self) -> Option<Telemetry> {
        let inner = self.inner.lock();
        if inner.len == 0 {
            return None;
        }
        let index = (inner.head + self.capacity - 1) % self.capacity;
        Some(inner.slots[index])
    }

    /// Record at `index`, where 0 is the oldest retained record.
    pub fn get(&self, index: usize) -> Option<Telemetry> {
        let inner = self.inner.lock();
        if index >= inner.len {
            return None;
        }
        let actual = (inner.head + self.capacity - inner.len + index) % self.capacity;
        Some(inner.slots[actual])
    }

    /// All retained records, oldest first.
    pub fn snapshot(&self) -> Vec<Telemetry> {
        let inner = self.inner.lock();
        (0..inner.len)
            .map(|i| inner.slots[(inner.head + self.capacity - inner.len + i) % self.capacity])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry_with_voltage(v: u16) -> Telemetry {
        Telemetry {
            voltage1: v,
            ..Telemetry::default()
        }
    }

    #[test]
    fn empty_buffer() {
        let buffer = TelemetryBuffer::new(4);
        assert!(buffer.is_empty());
        assert_eq!(buffer.latest(), None);
        assert_eq!(buffer.get(0), None);
    }

    #[test]
    fn latest_tracks_newest() {
        let buffer = TelemetryBuffer::new(4);
        buffer.push(telemetry_with_voltage(1));
        buffer.push(telemetry_with_voltage(2));
        assert_eq!(buffer.latest().map(|t| t.voltage1), Some(2));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn wraps_and_overwrites_oldest() {
        let buffer = TelemetryBuffer::new(3);
        for v in 1..=5 {
            buffer.push(telemetry_with_voltage(v));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.get(0).map(|t| t.voltage1), Some(3));
        assert_eq!(buffer.get(2).map(|t| t.voltage1), Some(5));
        assert_eq!(buffer.latest().map(|t| t.voltage1), Some(5));
        assert_eq!(
            buffer
                .snapshot()
                .iter()
                .map(|t| t.voltage1)
                .collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let buffer = TelemetryBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push(telemetry_with_voltage(7));
        assert_eq!(buffer.latest().map(|t| t.voltage1), Some(7));
    }
}
