//! Snapshot persistence.

use crate::domain::errors::StorageError;
use crate::domain::snapshot::StoreSnapshot;
use crate::ports::outbound::PersistencePort;
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Keeps the last snapshot in memory.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    snapshot: Mutex<Option<StoreSnapshot>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistencePort for InMemoryPersistence {
    fn load_snapshot(&self) -> Result<Option<StoreSnapshot>, StorageError> {
        Ok(self.snapshot.lock().clone())
    }

    fn save_snapshot(&self, snapshot: &StoreSnapshot) -> Result<(), StorageError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }
}

/// Bincode snapshot in a single file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub const FILE_NAME: &'static str = "store.bin";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/store.bin`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, err: impl std::fmt::Display) -> StorageError {
    StorageError::Persistence(format!("{}: {err}", path.display()))
}

impl PersistencePort for FilePersistence {
    fn load_snapshot(&self) -> Result<Option<StoreSnapshot>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&self.path, err)),
        };
        let snapshot: StoreSnapshot =
            bincode::deserialize(&bytes).map_err(|err| io_error(&self.path, err))?;
        if snapshot.version != StoreSnapshot::VERSION {
            return Err(StorageError::Persistence(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version,
                StoreSnapshot::VERSION
            )));
        }
        debug!(path = %self.path.display(), entries = snapshot.len(), "[vn-02] Snapshot loaded");
        Ok(Some(snapshot))
    }

    fn save_snapshot(&self, snapshot: &StoreSnapshot) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| io_error(parent, err))?;
        }
        let bytes = bincode::serialize(snapshot).map_err(|err| io_error(&self.path, err))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|err| io_error(&tmp, err))?;
        fs::rename(&tmp, &self.path).map_err(|err| io_error(&self.path, err))?;
        debug!(path = %self.path.display(), entries = snapshot.len(), "[vn-02] Snapshot saved");
        Ok(())
    }
}
