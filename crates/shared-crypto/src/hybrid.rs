//! # Hybrid Sealing
//!
//! Encrypts a payload to a recipient's Ed25519 identity so that only the
//! recipient can read it, while any relay can check who sent it.
//!
//! ```text
//! ephemeral X25519 ──DH──> recipient (Ed25519 key mapped to Montgomery form)
//!        │
//!        └─ HKDF-SHA256 ─> XChaCha20-Poly1305 key
//! sender Ed25519 signs (ephemeral ‖ nonce ‖ recipient ‖ ciphertext)
//! ```

use crate::signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use crate::symmetric::{self, Nonce, SecretKey};
use crate::CryptoError;
use curve25519_dalek::{edwards::CompressedEdwardsY, montgomery::MontgomeryPoint, scalar::Scalar};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroize;

const CONFIDENTIAL_DOMAIN: &[u8] = b"veilnet/confidential/v1";

/// A sealed, sender-signed payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidentialData {
    /// Who sealed it.
    pub sender_public_key: Ed25519PublicKey,
    /// Who can open it.
    pub receiver_public_key: Ed25519PublicKey,
    /// Ephemeral X25519 public key.
    pub ephemeral_public: [u8; 32],
    /// XChaCha20 nonce.
    pub nonce: [u8; 24],
    /// Encrypted payload with Poly1305 tag.
    pub ciphertext: Vec<u8>,
    /// Sender signature over the sealed fields.
    pub signature: Ed25519Signature,
}

impl ConfidentialData {
    fn signed_bytes(
        ephemeral_public: &[u8; 32],
        nonce: &[u8; 24],
        receiver: &Ed25519PublicKey,
        ciphertext: &[u8],
    ) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(32 + 24 + 32 + ciphertext.len());
        bytes.extend_from_slice(ephemeral_public);
        bytes.extend_from_slice(nonce);
        bytes.extend_from_slice(receiver.as_bytes());
        bytes.extend_from_slice(ciphertext);
        bytes
    }

    /// Check the sender signature without decrypting.
    pub fn verify_sender(&self) -> Result<(), CryptoError> {
        let bytes = Self::signed_bytes(
            &self.ephemeral_public,
            &self.nonce,
            &self.receiver_public_key,
            &self.ciphertext,
        );
        self.sender_public_key.verify(&bytes, &self.signature)
    }
}

/// Seal `plaintext` for `recipient`, signed by `sender`.
pub fn seal(
    plaintext: &[u8],
    recipient: &Ed25519PublicKey,
    sender: &Ed25519KeyPair,
) -> Result<ConfidentialData, CryptoError> {
    let recipient_point = to_montgomery(recipient)?;

    let mut ephemeral_bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut ephemeral_bytes);
    let ephemeral_scalar = Scalar::from_bytes_mod_order(ephemeral_bytes);
    ephemeral_bytes.zeroize();
    let ephemeral_public = MontgomeryPoint::mul_base(&ephemeral_scalar);

    let shared_secret = ephemeral_scalar * recipient_point;
    let key = derive_key(
        shared_secret.as_bytes(),
        ephemeral_public.as_bytes(),
        recipient.as_bytes(),
    )?;

    let (ciphertext, nonce) = symmetric::encrypt(&key, plaintext)?;
    let signed = ConfidentialData::signed_bytes(
        ephemeral_public.as_bytes(),
        nonce.as_bytes(),
        recipient,
        &ciphertext,
    );

    Ok(ConfidentialData {
        sender_public_key: sender.public_key(),
        receiver_public_key: *recipient,
        ephemeral_public: *ephemeral_public.as_bytes(),
        nonce: *nonce.as_bytes(),
        ciphertext,
        signature: sender.sign(&signed),
    })
}

/// Verify the sender and decrypt with the recipient's keypair.
pub fn open(data: &ConfidentialData, recipient: &Ed25519KeyPair) -> Result<Vec<u8>, CryptoError> {
    if data.receiver_public_key != recipient.public_key() {
        return Err(CryptoError::WrongRecipient);
    }
    data.verify_sender()?;

    let our_scalar = secret_scalar(recipient);
    let shared_secret = our_scalar * MontgomeryPoint(data.ephemeral_public);
    let key = derive_key(
        shared_secret.as_bytes(),
        &data.ephemeral_public,
        data.receiver_public_key.as_bytes(),
    )?;

    symmetric::decrypt(&key, &data.ciphertext, &Nonce::from_bytes(data.nonce))
}

/// Montgomery form of an Ed25519 public key.
fn to_montgomery(public_key: &Ed25519PublicKey) -> Result<MontgomeryPoint, CryptoError> {
    CompressedEdwardsY(*public_key.as_bytes())
        .decompress()
        .map(|point| point.to_montgomery())
        .ok_or(CryptoError::InvalidPublicKey)
}

/// The clamped secret scalar behind an Ed25519 seed.
fn secret_scalar(keypair: &Ed25519KeyPair) -> Scalar {
    let mut seed = keypair.to_seed();
    let expanded = Sha512::digest(seed);
    seed.zeroize();

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&expanded[..32]);
    bytes[0] &= 248;
    bytes[31] &= 127;
    bytes[31] |= 64;
    let scalar = Scalar::from_bytes_mod_order(bytes);
    bytes.zeroize();
    scalar
}

fn derive_key(
    shared_secret: &[u8; 32],
    ephemeral_public: &[u8; 32],
    recipient_public: &[u8; 32],
) -> Result<SecretKey, CryptoError> {
    let mut info = Vec::with_capacity(64);
    info.extend_from_slice(ephemeral_public);
    info.extend_from_slice(recipient_public);

    let hkdf = Hkdf::<Sha256>::new(Some(CONFIDENTIAL_DOMAIN), shared_secret);
    let mut output = [0u8; 32];
    hkdf.expand(&info, &mut output)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    let key = SecretKey::from_bytes(output);
    output.zeroize();
    Ok(key)
}
