//! Private keys of published services, kept per server id.
//!
//! Reusing the key keeps a node's onion address or I2P destination stable
//! across restarts.

use crate::domain::errors::TransportError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Key material for Tor hidden services or I2P destinations.
#[derive(Debug)]
pub struct HiddenServiceKeyStore {
    dir: Option<PathBuf>,
    extension: &'static str,
    cache: RwLock<HashMap<String, String>>,
}

impl HiddenServiceKeyStore {
    /// Keys live in `dir` (if any) as `<server_id>.<extension>`.
    pub fn new(dir: Option<PathBuf>, extension: &'static str) -> Self {
        Self {
            dir,
            extension,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn load(&self, server_id: &str) -> Result<Option<String>, TransportError> {
        if let Some(key) = self.cache.read().get(server_id) {
            return Ok(Some(key.clone()));
        }
        let Some(path) = self.path_for(server_id) else {
            return Ok(None);
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let key = contents.trim().to_string();
                if key.is_empty() {
                    return Ok(None);
                }
                self.cache.write().insert(server_id.to_string(), key.clone());
                Ok(Some(key))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn store(&self, server_id: &str, key: &str) -> Result<(), TransportError> {
        self.cache
            .write()
            .insert(server_id.to_string(), key.to_string());

        if let Some(path) = self.path_for(server_id) {
            write_atomically(&path, key.as_bytes()).await?;
        }
        Ok(())
    }

    fn path_for(&self, server_id: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", file_stem(server_id), self.extension)))
    }
}

fn file_stem(server_id: &str) -> String {
    server_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), TransportError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
