//! Link diagnostics: traffic counters, quality metrics, latency tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Radio-quality figures, updated by the driver or the embedder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkQuality {
    /// Signal-to-noise ratio, dB.
    pub snr_db: f64,
    /// Bit error rate estimate.
    pub bit_error_rate: f64,
    /// Carrier-to-interference ratio, dB.
    pub carrier_to_interference: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct LatencyStats {
    total: Duration,
    min: Option<Duration>,
    max: Duration,
    count: u64,
}

impl LatencyStats {
    fn record(&mut self, sample: Duration) {
        self.total += sample;
        self.min = Some(self.min.map_or(sample, |m| m.min(sample)));
        self.max = self.max.max(sample);
        self.count += 1;
    }

    fn average(&self) -> Option<Duration> {
        (self.count > 0).then(|| self.total / self.count as u32)
    }
}

/// Point-in-time copy of all diagnostics, delivered to the user callback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub decode_errors: u64,
    pub unknown_descriptors: u64,
    pub commands_submitted: u64,
    pub retransmissions: u64,
    pub commands_acked: u64,
    pub commands_gave_up: u64,
    pub unexpected_acks: u64,
    pub transport_errors: u64,
    pub link: LinkQuality,
    pub ack_latency_min: Option<Duration>,
    pub ack_latency_avg: Option<Duration>,
    pub ack_latency_max: Option<Duration>,
}

impl DiagnosticsSnapshot {
    /// Fraction of submitted commands that exhausted their retries.
    pub fn give_up_rate(&self) -> f64 {
        if self.commands_submitted == 0 {
            0.0
        } else {
            self.commands_gave_up as f64 / self.commands_submitted as f64
        }
    }
}

/// Shared diagnostics sink for all link components.
///
/// Counters are atomic; the aggregate metrics sit behind their own small
/// mutexes so hot paths never contend on one lock.
pub struct Diagnostics {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    decode_errors: AtomicU64,
    unknown_descriptors: AtomicU64,
    commands_submitted: AtomicU64,
    retransmissions: AtomicU64,
    commands_acked: AtomicU64,
    commands_gave_up: AtomicU64,
    unexpected_acks: AtomicU64,
    transport_errors: AtomicU64,
    link: Mutex<LinkQuality>,
    latency: Mutex<LatencyStats>,
    report_interval: Duration,
    last_report: Mutex<Option<Instant>>,
}

impl Diagnostics {
    pub fn new(report_interval: Duration) -> Self {
        Self {
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            unknown_descriptors: AtomicU64::new(0),
            commands_submitted: AtomicU64::new(0),
            retransmissions: AtomicU64::new(0),
            commands_acked: AtomicU64::new(0),
            commands_gave_up: AtomicU64::new(0),
            unexpected_acks: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            link: Mutex::new(LinkQuality::default()),
            latency: Mutex::new(LatencyStats::default()),
            report_interval,
            last_report: Mutex::new(None),
        }
    }

    pub fn frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unknown_descriptor(&self) {
        self.unknown_descriptors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_submitted(&self) {
        self.commands_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retransmission(&self) {
        self.retransmissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_acked(&self) {
        self.commands_acked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_gave_up(&self) {
        self.commands_gave_up.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unexpected_ack(&self) {
        self.unexpected_acks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the radio-quality figures.
    pub fn update_link_quality(&self, quality: LinkQuality) {
        *self.link.lock() = quality;
    }

    /// Record one submit-to-ack latency sample.
    pub fn record_ack_latency(&self, sample: Duration) {
        self.latency.lock().record(sample);
    }

    /// Copy out the current state.
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let latency = *self.latency.lock();
        DiagnosticsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unknown_descriptors: self.unknown_descriptors.load(Ordering::Relaxed),
            commands_submitted: self.commands_submitted.load(Ordering::Relaxed),
            retransmissions: self.retransmissions.load(Ordering::Relaxed),
            commands_acked: self.commands_acked.load(Ordering::Relaxed),
            commands_gave_up: self.commands_gave_up.load(Ordering::Relaxed),
            unexpected_acks: self.unexpected_acks.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            link: *self.link.lock(),
            ack_latency_min: latency.min,
            ack_latency_avg: latency.average(),
            ack_latency_max: (latency.count > 0).then_some(latency.max),
        }
    }

    /// Rate limiter for user-facing diagnostics reports. Returns true at
    /// most once per report interval.
    pub fn should_report(&self) -> bool {
        let mut last = self.last_report.lock();
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.report_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let diag = Diagnostics::default();
        diag.frame_sent();
        diag.frame_sent();
        diag.frame_received();
        diag.decode_error();
        let snap = diag.snapshot();
        assert_eq!(snap.frames_sent, 2);
        assert_eq!(snap.frames_received, 1);
        assert_eq!(snap.decode_errors, 1);
    }

    #[test]
    fn latency_aggregates() {
        let diag = Diagnostics::default();
        diag.record_ack_latency(Duration::from_millis(10));
        diag.record_ack_latency(Duration::from_millis(30));
        let snap = diag.snapshot();
        assert_eq!(snap.ack_latency_min, Some(Duration::from_millis(10)));
        assert_eq!(snap.ack_latency_avg, Some(Duration::from_millis(20)));
        assert_eq!(snap.ack_latency_max, Some(Duration::from_millis(30)));
    }

    #[test]
    fn no_latency_before_first_sample() {
        let snap = Diagnostics::default().snapshot();
        assert_eq!(snap.ack_latency_min, None);
        assert_eq!(snap.ack_latency_avg, None);
        assert_eq!(snap.ack_latency_max, None);
    }

    #[test]
    fn give_up_rate() {
        let diag = Diagnostics::default();
        assert_eq!(diag.snapshot().give_up_rate(), 0.0);
        diag.command_submitted();
        diag.command_submitted();
        diag.command_gave_up();
        assert!((diag.snapshot().give_up_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn report_rate_limit() {
        let diag = Diagnostics::new(Duration::from_secs(60));
        assert!(diag.should_report());
        assert!(!diag.should_report());
    }
}
