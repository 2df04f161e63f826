//! Hashcash authorization.
//!
//! The sender mints work bound to the payload digest and to a challenge
//! derived from the receiver's address and the per-connection message
//! counter. The difficulty scales with the message's cost factor and the
//! receiver's advertised load:
//!
//! ```text
//! difficulty = clamp(TARGET * clamp(cost) * clamp(load) * adjustment, MIN, MAX)
//! ```
//!
//! The receiver accepts work sized for its current or its previous load,
//! within `DIFFICULTY_TOLERANCE`, because the sender may not have seen the
//! latest load exchange yet.

use crate::domain::envelope::AuthorizationToken;
use crate::domain::errors::AuthorizationError;
use crate::domain::network_load::{NetworkLoad, NetworkLoadSnapshot};
use crate::domain::payload::EnvelopePayloadMessage;
use crate::ports::inbound::AuthorizationService;
use crate::service::codec::payload_digest;
use parking_lot::Mutex;
use shared_crypto::{sha256_many, Hash256, ProofOfWork};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const MIN_MESSAGE_COST: f64 = 0.01;
pub const MIN_LOAD: f64 = 0.01;
pub const MIN_DIFFICULTY: f64 = 128.0;
pub const TARGET_DIFFICULTY: f64 = 65_536.0;
pub const MAX_DIFFICULTY: f64 = 1_048_576.0;
pub const DIFFICULTY_TOLERANCE: f64 = 50_000.0;

/// Attempts before minting gives up; far beyond what `MAX_DIFFICULTY` needs.
const MAX_MINT_ATTEMPTS: u64 = 1 << 28;

#[derive(Debug)]
pub struct HashCashService {
    enabled: bool,
    /// Last accepted counter per connection.
    counters: Mutex<HashMap<String, u32>>,
}

impl HashCashService {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// With work disabled, tokens carry difficulty 0 and only the message
    /// counter is checked.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn calculate_difficulty(&self, payload: &EnvelopePayloadMessage, load: &NetworkLoad) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        let cost = payload.cost_factor().clamp(MIN_MESSAGE_COST, 1.0);
        let load_factor = load.load.clamp(MIN_LOAD, 1.0);
        let difficulty =
            TARGET_DIFFICULTY * cost * load_factor * load.difficulty_adjustment_factor;
        difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    pub fn challenge(address: &str, message_counter: u32) -> Hash256 {
        sha256_many(&[address.as_bytes(), &message_counter.to_be_bytes()])
    }

    fn check_counter(&self, connection_id: Option<&str>, counter: u32) -> Result<(), AuthorizationError> {
        let Some(connection_id) = connection_id else {
            return Ok(());
        };
        let mut counters = self.counters.lock();
        let last = counters.get(connection_id).copied().unwrap_or(0);
        if counter <= last {
            return Err(AuthorizationError::ReplayedCounter { counter, last });
        }
        counters.insert(connection_id.to_string(), counter);
        Ok(())
    }

    fn check_difficulty(
        &self,
        payload: &EnvelopePayloadMessage,
        actual: f64,
        my_load: &NetworkLoadSnapshot,
    ) -> Result<(), AuthorizationError> {
        let acceptable = |expected: f64| actual >= expected || expected - actual <= DIFFICULTY_TOLERANCE;

        let expected = self.calculate_difficulty(payload, &my_load.current());
        if acceptable(expected) {
            return Ok(());
        }
        if let Some(previous) = my_load.previous() {
            if acceptable(self.calculate_difficulty(payload, &previous)) {
                debug!(
                    message = payload.name(),
                    "[vn-04] Accepted work sized for previous load"
                );
                return Ok(());
            }
        }
        Err(AuthorizationError::DifficultyTooLow { expected, actual })
    }
}

impl Default for HashCashService {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AuthorizationService for HashCashService {
    fn create_token(
        &self,
        payload: &EnvelopePayloadMessage,
        receiver_load: &NetworkLoad,
        receiver_address: &str,
        message_counter: u32,
    ) -> Result<AuthorizationToken, AuthorizationError> {
        let difficulty = self.calculate_difficulty(payload, receiver_load);
        let proof_of_work = ProofOfWork::mint(
            payload_digest(payload)?,
            Self::challenge(receiver_address, message_counter),
            difficulty,
            MAX_MINT_ATTEMPTS,
        )?;
        debug!(
            message = payload.name(),
            difficulty,
            duration_ms = proof_of_work.duration_ms,
            "[vn-04] Minted token"
        );
        Ok(AuthorizationToken {
            proof_of_work,
            message_counter,
        })
    }

    fn authorize(
        &self,
        payload: &EnvelopePayloadMessage,
        token: &AuthorizationToken,
        my_load: &NetworkLoadSnapshot,
        connection_id: Option<&str>,
        my_address: &str,
    ) -> Result<(), AuthorizationError> {
        let result = self.verify(payload, token, my_load, connection_id, my_address);
        if let Err(err) = &result {
            warn!(
                message = payload.name(),
                connection = connection_id.unwrap_or("handshake"),
                error = %err,
                "[vn-04] Unauthorized message"
            );
        }
        result
    }

    fn forget_connection(&self, connection_id: &str) {
        self.counters.lock().remove(connection_id);
    }
}

impl HashCashService {
    fn verify(
        &self,
        payload: &EnvelopePayloadMessage,
        token: &AuthorizationToken,
        my_load: &NetworkLoadSnapshot,
        connection_id: Option<&str>,
        my_address: &str,
    ) -> Result<(), AuthorizationError> {
        self.check_counter(connection_id, token.message_counter)?;

        let pow = &token.proof_of_work;
        if pow.payload_digest != payload_digest(payload)? {
            return Err(AuthorizationError::PayloadMismatch);
        }
        if !self.enabled {
            return Ok(());
        }
        if pow.challenge != Self::challenge(my_address, token.message_counter) {
            return Err(AuthorizationError::ChallengeMismatch);
        }
        self.check_difficulty(payload, pow.difficulty, my_load)?;
        if !pow.verify() {
            return Err(AuthorizationError::InvalidProof);
        }
        Ok(())
    }
}
