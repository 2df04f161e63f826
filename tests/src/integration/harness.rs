//! Runtime fixtures shared by the integration tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use node_runtime::{ConfidentialListener, NodeConfig, NodeRuntime, ReceivedMessage};
use parking_lot::Mutex;
use shared_crypto::Ed25519KeyPair;
use shared_types::{Address, TransportType};
use tempfile::TempDir;
use tokio_test::assert_ok;

/// A started runtime that owns its data directory.
pub struct TestRuntime {
    pub runtime: NodeRuntime,
    pub identity: Ed25519KeyPair,
    pub inbox: Arc<Inbox>,
    _dir: TempDir,
}

impl TestRuntime {
    pub fn address(&self) -> Address {
        match self.runtime.node(TransportType::Clear).and_then(|node| node.address()) {
            Some(address) => address,
            None => panic!("runtime is not listening on clear-net"),
        }
    }
}

pub fn config(data_dir: &Path, seeds: Vec<Address>) -> NodeConfig {
    let mut config = NodeConfig::for_testing(data_dir);
    config.network.seed_addresses = seeds;
    config
}

pub async fn start(seeds: Vec<Address>) -> TestRuntime {
    start_as(Ed25519KeyPair::generate(), seeds).await
}

pub async fn start_as(identity: Ed25519KeyPair, seeds: Vec<Address>) -> TestRuntime {
    start_with(identity, seeds, |_| {}).await
}

pub async fn start_with<F>(identity: Ed25519KeyPair, seeds: Vec<Address>, configure: F) -> TestRuntime
where
    F: FnOnce(&mut NodeConfig),
{
    let dir = assert_ok!(TempDir::new());
    let mut config = config(dir.path(), seeds);
    configure(&mut config);
    let runtime = assert_ok!(NodeRuntime::new(config, identity.clone()));
    let inbox = Arc::new(Inbox::default());
    runtime.confidential().add_listener(inbox.clone());
    assert_ok!(runtime.start().await);
    TestRuntime {
        runtime,
        identity,
        inbox,
        _dir: dir,
    }
}

pub async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..150 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within 3s");
}

#[derive(Default)]
pub struct Inbox(Mutex<Vec<ReceivedMessage>>);

impl Inbox {
    pub fn messages(&self) -> Vec<ReceivedMessage> {
        self.0.lock().clone()
    }
}

impl ConfidentialListener for Inbox {
    fn on_message(&self, message: &ReceivedMessage) {
        self.0.lock().push(message.clone());
    }
}
