//! # Confidential Messaging
//!
//! Sealed peer-to-peer messages with a mailbox fallback.
//!
//! ## Flow
//!
//! 1. Sender seals the payload for the recipient's key
//! 2. Direct delivery is tried over each transport the recipient announces
//! 3. If no address accepts it and mailbox metadata was given, the sealed
//!    message is stored as a mailbox entry and gossiped
//! 4. The recipient opens direct messages on arrival and acknowledges them
//! 5. Mailbox entries addressed to the recipient are opened when they reach
//!    its store, then removed with a receiver-signed remove request

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use shared_crypto::{open, seal, sha256, ConfidentialData, Ed25519KeyPair, Ed25519PublicKey};
use shared_types::{key_id, Address, MetaData, NetworkId, TransportType};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vn_02_data_store::{
    DataRequest, DataStore, EntryKind, MailboxData, MailboxEntry, RemoveRequest, StorageKey,
    StoreEvent,
};
use vn_04_envelope::{ConfidentialMessage, EnvelopePayloadMessage};

use crate::errors::NodeError;
use crate::network::{Connection, MessageListener, Node};

/// How a message reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Direct,
    Mailbox,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub payload: Vec<u8>,
    pub sender: Ed25519PublicKey,
    pub delivery: Delivery,
}

/// Where an outgoing message ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { address: Address },
    StoredInMailbox { key: StorageKey },
}

pub trait ConfidentialListener: Send + Sync {
    fn on_message(&self, message: &ReceivedMessage);
}

/// Handler for sealed messages addressed to one identity.
pub struct ConfidentialMessageService {
    identity: Arc<Ed25519KeyPair>,
    key_id: String,
    nodes: BTreeMap<TransportType, Arc<Node>>,
    store: Arc<DataStore>,
    listeners: RwLock<Vec<Arc<dyn ConfidentialListener>>>,
}

impl ConfidentialMessageService {
    pub fn new(
        identity: Arc<Ed25519KeyPair>,
        nodes: BTreeMap<TransportType, Arc<Node>>,
        store: Arc<DataStore>,
    ) -> Self {
        let key_id = key_id(identity.public_key().as_bytes());
        Self {
            identity,
            key_id,
            nodes,
            store,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn add_listener(&self, listener: Arc<dyn ConfidentialListener>) {
        self.listeners.write().push(listener);
    }

    /// Seal `payload` for `recipient` and deliver it.
    ///
    /// Without `mailbox` metadata an unreachable recipient is an error.
    pub async fn confidential_send(
        &self,
        payload: &[u8],
        recipient: &NetworkId,
        mailbox: Option<MetaData>,
    ) -> Result<SendOutcome, NodeError> {
        let recipient_key = Ed25519PublicKey::from_bytes(*recipient.public_key())?;
        let sealed = seal(payload, &recipient_key, &self.identity)?;
        let message = ConfidentialMessage {
            sealed: sealed.clone(),
            receiver_key_id: recipient.key_id(),
        };

        let mut last_error = None;
        for (transport, address) in recipient.addresses() {
            let Some(node) = self.nodes.get(transport) else {
                continue;
            };
            let attempt = async {
                let connection = node.connect(address).await?;
                connection
                    .send(EnvelopePayloadMessage::ConfidentialMessage(message.clone()))
                    .await
            };
            match attempt.await {
                Ok(()) => {
                    debug!(%address, "[node] Confidential message sent");
                    return Ok(SendOutcome::Sent {
                        address: address.clone(),
                    });
                }
                Err(e) => {
                    debug!(%address, error = %e, "[node] Direct delivery failed");
                    last_error = Some(e);
                }
            }
        }

        match mailbox {
            Some(metadata) => self.store_in_mailbox(sealed, metadata).await,
            None => Err(last_error.unwrap_or_else(|| NodeError::NoRoute(recipient.key_id()))),
        }
    }

    async fn store_in_mailbox(
        &self,
        sealed: ConfidentialData,
        metadata: MetaData,
    ) -> Result<SendOutcome, NodeError> {
        let message_id = hex::encode(sha256(&sealed.ciphertext));
        let entry = MailboxEntry::sign(
            MailboxData::new(metadata, message_id, sealed),
            &self.identity,
            1,
            self.store.now(),
        );
        let key = entry.key();
        let request = DataRequest::AddMailbox(entry);
        let outcome = self.store.apply(request.clone())?;
        if outcome.is_stored() {
            let sent = self.broadcast(request).await;
            info!(%key, peers = sent, "[node] Message stored in mailbox");
        }
        Ok(SendOutcome::StoredInMailbox { key })
    }

    async fn broadcast(&self, request: DataRequest) -> usize {
        let mut sent = 0;
        for node in self.nodes.values() {
            sent += node
                .broadcast(EnvelopePayloadMessage::DataRequest(request.clone()))
                .await;
        }
        sent
    }

    fn deliver(&self, message: ReceivedMessage) {
        let listeners = self.listeners.read().clone();
        if listeners.is_empty() {
            debug!(delivery = ?message.delivery, "[node] No confidential listener");
        }
        for listener in listeners {
            listener.on_message(&message);
        }
    }

    // =========================================================================
    // MAILBOX
    // =========================================================================

    /// Open, deliver and remove a mailbox entry addressed to us.
    ///
    /// Returns `false` for entries meant for someone else or already consumed.
    pub async fn handle_mailbox_entry(&self, key: StorageKey, entry: &MailboxEntry) -> bool {
        if *entry.receiver() != self.identity.public_key() {
            return false;
        }
        if self.store.sequence_number(EntryKind::Mailbox, &key) != Some(entry.sequence_number) {
            debug!(%key, "[node] Mailbox entry already consumed");
            return false;
        }
        match open(&entry.data.sealed, &self.identity) {
            Ok(payload) => self.deliver(ReceivedMessage {
                payload,
                sender: *entry.sender(),
                delivery: Delivery::Mailbox,
            }),
            Err(e) => warn!(%key, error = %e, "[node] Cannot open mailbox message"),
        }

        let remove = RemoveRequest::sign(
            EntryKind::Mailbox,
            key,
            entry.data.metadata.clone(),
            &self.identity,
            entry.sequence_number.saturating_add(1),
            self.store.now(),
        );
        let request = DataRequest::RemoveMailbox(remove);
        match self.store.apply(request.clone()) {
            Ok(outcome) if outcome.is_stored() => {
                self.broadcast(request).await;
            }
            Ok(outcome) => debug!(?outcome, "[node] Mailbox removal not stored"),
            Err(e) => warn!(error = %e, "[node] Mailbox removal rejected"),
        }
        true
    }

    /// Mailbox entries for us already in the store.
    pub async fn drain_mailbox(&self) -> usize {
        let mut handled = 0;
        for entry in self.store.snapshot_of(EntryKind::Mailbox) {
            if entry.is_tombstone {
                continue;
            }
            if let Some(DataRequest::AddMailbox(mailbox)) =
                self.store.request(EntryKind::Mailbox, &entry.key)
            {
                if self.handle_mailbox_entry(entry.key, &mailbox).await {
                    handled += 1;
                }
            }
        }
        handled
    }

    /// Watch the store for mailbox entries addressed to us.
    pub fn spawn_mailbox_listener(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut events = self.store.subscribe();
        tokio::spawn(async move {
            let drained = service.drain_mailbox().await;
            if drained > 0 {
                info!(count = drained, "[node] Delivered stored mailbox messages");
            }
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    event = events.recv() => match event {
                        Ok(StoreEvent::Added {
                            key,
                            request: DataRequest::AddMailbox(entry),
                            ..
                        }) => {
                            service.handle_mailbox_entry(key, &entry).await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "[node] Mailbox listener lagged, rescanning");
                            service.drain_mailbox().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            debug!("[node] Mailbox listener stopped");
        })
    }
}

impl MessageListener for ConfidentialMessageService {
    fn on_message(&self, connection: &Arc<Connection>, message: &EnvelopePayloadMessage) {
        match message {
            EnvelopePayloadMessage::ConfidentialMessage(message) => {
                if message.receiver_key_id != self.key_id {
                    debug!(key_id = %message.receiver_key_id, "[node] Message for another identity");
                    return;
                }
                let payload = match open(&message.sealed, &self.identity) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(peer = %connection.peer_address(), error = %e, "[node] Cannot open message");
                        return;
                    }
                };
                self.deliver(ReceivedMessage {
                    payload,
                    sender: message.sealed.sender_public_key,
                    delivery: Delivery::Direct,
                });

                let ack = EnvelopePayloadMessage::Ack {
                    message_id: hex::encode(sha256(&message.sealed.ciphertext)),
                };
                let connection = Arc::clone(connection);
                tokio::spawn(async move {
                    if let Err(e) = connection.send(ack).await {
                        debug!(error = %e, "[node] Ack not sent");
                    }
                });
            }
            EnvelopePayloadMessage::Ack { message_id } => {
                debug!(peer = %connection.peer_address(), %message_id, "[node] Message acknowledged");
            }
            _ => {}
        }
    }
}
