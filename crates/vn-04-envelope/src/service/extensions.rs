//! Decoders for external payload types, keyed by type id.

use crate::domain::errors::EnvelopeError;
use crate::domain::payload::ExternalPayload;
use crate::ports::outbound::ExtensionDecoder;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Default, Clone)]
pub struct ExtensionRegistry {
    decoders: HashMap<String, Arc<dyn ExtensionDecoder>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder, replacing any earlier one for the same type id.
    pub fn register(&mut self, decoder: Arc<dyn ExtensionDecoder>) {
        let type_id = decoder.payload_type().to_string();
        if self.decoders.insert(type_id.clone(), decoder).is_some() {
            warn!(type_id = %type_id, "[vn-04] Replaced extension decoder");
        }
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.decoders.contains_key(type_id)
    }

    pub fn type_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.decoders.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn decode(&self, payload: &ExternalPayload) -> Result<Box<dyn Any + Send>, EnvelopeError> {
        self.decoders
            .get(&payload.type_id)
            .ok_or_else(|| EnvelopeError::UnknownExtension(payload.type_id.clone()))?
            .decode(&payload.bytes)
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("type_ids", &self.type_ids())
            .finish()
    }
}
