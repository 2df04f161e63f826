//! Requester-side driver: rounds per peer, peers in parallel.

use crate::domain::errors::InventoryError;
use crate::domain::inventory::{IngestReport, InventoryRequest, InventoryResponse};
use crate::ports::outbound::{InventoryPeer, StoreView};
use crate::service::inventory::InventoryService;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};
use vn_01_transport::CancelToken;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub peer: String,
    pub rounds: usize,
    /// The last response fit within the budget.
    pub complete: bool,
    pub ingest: IngestReport,
}

impl<S: StoreView + ?Sized> InventoryService<S> {
    /// Pull missing entries from `peer` until a response fits the budget or
    /// `max_rounds` is reached.
    ///
    /// Entries of rounds that finished before a cancellation stay applied.
    pub async fn reconcile_with(
        &self,
        peer: &dyn InventoryPeer,
        cancel: &CancelToken,
    ) -> Result<ReconcileReport, InventoryError> {
        let label = peer.label();
        let mut report = ReconcileReport {
            peer: label.clone(),
            ..ReconcileReport::default()
        };

        while report.rounds < self.config.max_rounds {
            let nonce: u64 = rand::random();
            let request = InventoryRequest {
                filter: self.build_filter(),
                nonce,
            };
            let response = self.request_bounded(peer, &label, request, cancel).await?;
            if response.request_nonce != nonce {
                return Err(InventoryError::NonceMismatch {
                    expected: nonce,
                    got: response.request_nonce,
                });
            }

            report.rounds += 1;
            let more = response.inventory.max_size_reached;
            report.ingest.merge(self.ingest(response.inventory));
            if !more {
                report.complete = true;
                break;
            }
        }

        info!(
            peer = %label,
            rounds = report.rounds,
            stored = report.ingest.stored,
            complete = report.complete,
            "[vn-03] Reconciliation finished"
        );
        Ok(report)
    }

    async fn request_bounded(
        &self,
        peer: &dyn InventoryPeer,
        label: &str,
        request: InventoryRequest,
        cancel: &CancelToken,
    ) -> Result<InventoryResponse, InventoryError> {
        let timeout = self.config.request_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InventoryError::Cancelled { peer: label.to_string() }),
            result = tokio::time::timeout(timeout, peer.request_inventory(request)) => match result {
                Ok(response) => response,
                Err(_) => Err(InventoryError::Timeout {
                    peer: label.to_string(),
                    after_ms: timeout.as_millis() as u64,
                }),
            },
        }
    }

    /// Reconcile with up to `max_peers` peers concurrently.
    pub async fn reconcile_all(
        &self,
        peers: &[Arc<dyn InventoryPeer>],
        cancel: &CancelToken,
    ) -> Vec<Result<ReconcileReport, InventoryError>> {
        let rounds = peers
            .iter()
            .take(self.config.max_peers)
            .map(|peer| self.reconcile_with(peer.as_ref(), cancel));
        let results = join_all(rounds).await;
        for result in &results {
            if let Err(err) = result {
                warn!(error = %err, "[vn-03] Reconciliation failed");
            }
        }
        results
    }
}
