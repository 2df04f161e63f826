//! Traffic counters feeding the network load calculation.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct TrafficMetrics {
    sent_bytes: AtomicU64,
    messages_sent: AtomicU64,
    received_bytes: AtomicU64,
    messages_received: AtomicU64,
}

/// Counts accumulated since the previous `take`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficSample {
    pub sent_bytes: u64,
    pub messages_sent: u64,
    pub received_bytes: u64,
    pub messages_received: u64,
}

impl TrafficSample {
    pub fn add(&mut self, other: &TrafficSample) {
        self.sent_bytes += other.sent_bytes;
        self.messages_sent += other.messages_sent;
        self.received_bytes += other.received_bytes;
        self.messages_received += other.messages_received;
    }
}

impl TrafficMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, bytes: usize) {
        self.sent_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.received_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Read and reset all counters.
    pub fn take(&self) -> TrafficSample {
        TrafficSample {
            sent_bytes: self.sent_bytes.swap(0, Ordering::Relaxed),
            messages_sent: self.messages_sent.swap(0, Ordering::Relaxed),
            received_bytes: self.received_bytes.swap(0, Ordering::Relaxed),
            messages_received: self.messages_received.swap(0, Ordering::Relaxed),
        }
    }
}
