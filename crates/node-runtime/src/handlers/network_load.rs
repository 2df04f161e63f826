//! Periodic recalculation of the local network load.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use vn_02_data_store::DataStore;
use vn_04_envelope::{EnvelopePayloadMessage, LoadInputs, NetworkLoad, NetworkLoadSnapshot};

use crate::network::{Node, TrafficMetrics, TrafficSample};

/// Traffic older than this no longer counts.
pub const LOAD_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Delay before the first update after start.
pub const INITIAL_DELAY: Duration = Duration::from_secs(15);

/// Change in load that is worth telling connected peers about.
pub const SIGNIFICANT_CHANGE: f64 = 0.05;

pub struct NetworkLoadService {
    loads: Arc<NetworkLoadSnapshot>,
    metrics: Arc<TrafficMetrics>,
    store: Arc<DataStore>,
    nodes: Vec<Arc<Node>>,
    difficulty_adjustment_factor: f64,
    samples: Mutex<VecDeque<(Instant, TrafficSample)>>,
}

impl NetworkLoadService {
    pub fn new(
        loads: Arc<NetworkLoadSnapshot>,
        metrics: Arc<TrafficMetrics>,
        store: Arc<DataStore>,
        nodes: Vec<Arc<Node>>,
        difficulty_adjustment_factor: f64,
    ) -> Self {
        Self {
            loads,
            metrics,
            store,
            nodes,
            difficulty_adjustment_factor,
            samples: Mutex::new(VecDeque::new()),
        }
    }

    /// Fold the latest traffic into the window and publish the new load.
    pub fn update(&self) -> NetworkLoad {
        let traffic = self.record_traffic(Instant::now());
        let inputs = LoadInputs {
            num_connections: self.nodes.iter().map(|node| node.connection_count()).sum(),
            sent_bytes: traffic.sent_bytes,
            messages_sent: traffic.messages_sent,
            received_bytes: traffic.received_bytes,
            messages_received: traffic.messages_received,
            database_size_bytes: self.database_size(),
        };
        let load = NetworkLoad::calculate(&inputs, self.difficulty_adjustment_factor);
        self.loads.update(load);
        info!(
            load = load.load,
            connections = inputs.num_connections,
            messages_sent = inputs.messages_sent,
            messages_received = inputs.messages_received,
            database_bytes = inputs.database_size_bytes,
            "[node] Network load updated"
        );
        load
    }

    /// Take the counters since the last call and sum the window.
    fn record_traffic(&self, now: Instant) -> TrafficSample {
        let mut samples = self.samples.lock();
        samples.push_back((now, self.metrics.take()));
        while let Some((at, _)) = samples.front() {
            if now.duration_since(*at) > LOAD_WINDOW {
                samples.pop_front();
            } else {
                break;
            }
        }
        samples.iter().fold(TrafficSample::default(), |mut total, (_, sample)| {
            total.add(sample);
            total
        })
    }

    /// Serialized size of everything stored, tombstones included.
    fn database_size(&self) -> u64 {
        self.store
            .snapshot()
            .iter()
            .filter_map(|entry| self.store.request(entry.kind, &entry.key))
            .map(|request| request.serialized_size() as u64)
            .sum()
    }

    async fn announce(&self, load: NetworkLoad) {
        let mut sent = 0;
        for node in &self.nodes {
            let request = EnvelopePayloadMessage::NetworkLoadExchangeRequest {
                nonce: rand::random(),
                network_load: load,
            };
            sent += node.broadcast(request).await;
        }
        debug!(peers = sent, "[node] Announced network load");
    }

    pub fn spawn(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + INITIAL_DELAY.min(interval);
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let previous = self.loads.current();
                        let load = self.update();
                        if is_significant(previous, load) {
                            self.announce(load).await;
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("[node] Network load service stopped");
        })
    }
}

fn is_significant(previous: NetworkLoad, current: NetworkLoad) -> bool {
    (current.load - previous.load).abs() >= SIGNIFICANT_CHANGE
        || current.difficulty_adjustment_factor != previous.difficulty_adjustment_factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{ManualTimeSource, Timestamp};
    use vn_02_data_store::StoreConfig;

    fn service() -> NetworkLoadService {
        let time = Arc::new(ManualTimeSource::new(Timestamp::from_millis(1_000)));
        NetworkLoadService::new(
            Arc::new(NetworkLoadSnapshot::default()),
            Arc::new(TrafficMetrics::new()),
            Arc::new(DataStore::new(StoreConfig::for_testing(), time)),
            Vec::new(),
            1.0,
        )
    }

    #[test]
    fn test_idle_node_has_zero_load() {
        let service = service();
        let load = service.update();
        assert_eq!(load.load, 0.0);
        assert_eq!(service.loads.current(), load);
        assert_eq!(service.loads.previous(), Some(NetworkLoad::INITIAL));
    }

    #[test]
    fn test_traffic_raises_load() {
        let service = service();
        for _ in 0..1000 {
            service.metrics.record_received(10);
        }
        // 1000 messages received is the full 0.1 weight.
        let load = service.update();
        assert!((load.load - 0.1).abs() < 0.01, "load {}", load.load);
    }

    #[test]
    fn test_window_drops_old_samples() {
        let service = service();
        let start = Instant::now();
        service.metrics.record_sent(500);
        assert_eq!(service.record_traffic(start).sent_bytes, 500);

        service.metrics.record_sent(20);
        let later = start + LOAD_WINDOW + Duration::from_secs(1);
        assert_eq!(service.record_traffic(later).sent_bytes, 20);
    }

    #[test]
    fn test_significant_change() {
        let a = NetworkLoad::new(0.10, 1.0);
        assert!(!is_significant(a, NetworkLoad::new(0.12, 1.0)));
        assert!(is_significant(a, NetworkLoad::new(0.20, 1.0)));
        assert!(is_significant(a, NetworkLoad::new(0.10, 2.0)));
    }
}
