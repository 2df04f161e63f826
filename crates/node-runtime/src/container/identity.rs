//! The node's long-lived signing identity.
//!
//! Stored as a hex seed in `<data_dir>/identity.key` so the node keeps its
//! key id, and with it its mailbox, across restarts.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use shared_crypto::Ed25519KeyPair;
use tracing::info;

use crate::errors::NodeError;

pub const IDENTITY_FILE: &str = "identity.key";

pub fn identity_path(data_dir: &Path) -> PathBuf {
    data_dir.join(IDENTITY_FILE)
}

/// Read the identity from `data_dir`, generating and saving one if absent.
pub fn load_or_create_identity(data_dir: &Path) -> Result<Ed25519KeyPair, NodeError> {
    let path = identity_path(data_dir);
    match fs::read_to_string(&path) {
        Ok(contents) => parse_seed(contents.trim(), &path),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let identity = Ed25519KeyPair::generate();
            fs::create_dir_all(data_dir)?;
            fs::write(&path, hex::encode(identity.to_seed()))?;
            restrict_permissions(&path)?;
            info!(path = %path.display(), "[node] Generated new identity");
            Ok(identity)
        }
        Err(e) => Err(e.into()),
    }
}

fn parse_seed(hex_seed: &str, path: &Path) -> Result<Ed25519KeyPair, NodeError> {
    let bytes = hex::decode(hex_seed).map_err(|e| corrupt(path, e))?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| corrupt(path, "seed must be 32 bytes"))?;
    Ok(Ed25519KeyPair::from_seed(seed))
}

fn corrupt(path: &Path, reason: impl ToString) -> NodeError {
    NodeError::Io(std::io::Error::new(
        ErrorKind::InvalidData,
        format!("{}: {}", path.display(), reason.to_string()),
    ))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), NodeError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), NodeError> {
    Ok(())
}
