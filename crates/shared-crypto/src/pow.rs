//! # Proof of Work
//!
//! Hash-cash style work: find a `counter` such that
//! `SHA256(payload_digest || challenge || counter)` has at least
//! `ceil(log2(difficulty))` leading zero bits.

use crate::hashing::{sha256_many, Hash256};
use crate::CryptoError;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A solved proof of work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProofOfWork {
    /// SHA-256 of the protected payload.
    pub payload_digest: Hash256,
    /// Challenge the work is bound to.
    pub challenge: Hash256,
    /// Solution.
    pub counter: u64,
    /// Difficulty the solution was minted for.
    pub difficulty: f64,
    /// Time spent minting, in milliseconds.
    pub duration_ms: u64,
}

impl ProofOfWork {
    /// Search for a solution.
    ///
    /// # Errors
    ///
    /// `CryptoError::PowExhausted` if no solution is found within `max_attempts`.
    pub fn mint(
        payload_digest: Hash256,
        challenge: Hash256,
        difficulty: f64,
        max_attempts: u64,
    ) -> Result<Self, CryptoError> {
        let started = Instant::now();
        let required = required_zero_bits(difficulty);

        for counter in 0..max_attempts {
            let hash = Self::solution_hash(&payload_digest, &challenge, counter);
            if count_leading_zero_bits(&hash) >= required {
                return Ok(Self {
                    payload_digest,
                    challenge,
                    counter,
                    difficulty,
                    duration_ms: started.elapsed().as_millis() as u64,
                });
            }
        }

        Err(CryptoError::PowExhausted {
            attempts: max_attempts,
        })
    }

    /// True if the solution meets the difficulty it claims.
    pub fn verify(&self) -> bool {
        let hash = Self::solution_hash(&self.payload_digest, &self.challenge, self.counter);
        count_leading_zero_bits(&hash) >= required_zero_bits(self.difficulty)
    }

    fn solution_hash(payload_digest: &Hash256, challenge: &Hash256, counter: u64) -> Hash256 {
        sha256_many(&[&payload_digest[..], &challenge[..], &counter.to_be_bytes()[..]])
    }
}

/// Leading zero bits required for a difficulty.
pub fn required_zero_bits(difficulty: f64) -> u32 {
    if !difficulty.is_finite() || difficulty <= 1.0 {
        0
    } else {
        difficulty.log2().ceil() as u32
    }
}

/// Count leading zero bits in a byte slice.
pub fn count_leading_zero_bits(bytes: &[u8]) -> u32 {
    let mut count = 0u32;
    for byte in bytes {
        if *byte == 0 {
            count += 8;
        } else {
            count += byte.leading_zeros();
            break;
        }
    }
    count
}
