//! In-process peers for reconciliation tests.

use crate::domain::errors::InventoryError;
use crate::domain::inventory::{InventoryRequest, InventoryResponse};
use crate::ports::outbound::{InventoryPeer, StoreView};
use crate::service::inventory::InventoryService;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Answers from another node's inventory service, without a network.
pub struct LocalPeer<S: StoreView + ?Sized> {
    pub name: String,
    pub service: Arc<InventoryService<S>>,
    /// Artificial latency per request.
    pub delay: Option<Duration>,
    /// Filter sizes of requests seen, in order.
    pub seen: Mutex<Vec<usize>>,
}

impl<S: StoreView + ?Sized> LocalPeer<S> {
    pub fn new(name: &str, service: Arc<InventoryService<S>>) -> Self {
        Self {
            name: name.to_string(),
            service,
            delay: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl<S: StoreView + ?Sized + 'static> InventoryPeer for LocalPeer<S> {
    fn label(&self) -> String {
        self.name.clone()
    }

    async fn request_inventory(
        &self,
        request: InventoryRequest,
    ) -> Result<InventoryResponse, InventoryError> {
        self.seen.lock().push(request.filter.len());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.service.handle_request(request)
    }
}
