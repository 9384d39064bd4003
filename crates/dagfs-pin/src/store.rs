//! Where pin records live between runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use crate::error::{PinError, PinResult};
use crate::types::Pin;

/// Storage for the full set of pin records.
///
/// `save` replaces the whole set at once; a crash leaves either the old
/// or the new set on disk.
pub trait PinStore: Send + Sync {
    fn load(&self) -> PinResult<Vec<Pin>>;

    fn save(&self, pins: &[Pin]) -> PinResult<()>;
}

/// Keeps pins in memory. Lost when dropped.
#[derive(Debug, Default)]
pub struct InMemoryPinStore {
    pins: RwLock<Vec<Pin>>,
}

impl InMemoryPinStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PinStore for InMemoryPinStore {
    fn load(&self) -> PinResult<Vec<Pin>> {
        Ok(self.pins.read().expect("lock poisoned").clone())
    }

    fn save(&self, pins: &[Pin]) -> PinResult<()> {
        *self.pins.write().expect("lock poisoned") = pins.to_vec();
        Ok(())
    }
}

/// Keeps pins as a JSON array in `pins.json`.
#[derive(Debug, Clone)]
pub struct FsPinStore {
    path: PathBuf,
}

impl FsPinStore {
    pub const FILE_NAME: &'static str = "pins.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_repo(repo: impl AsRef<Path>) -> Self {
        Self::new(repo.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PinStore for FsPinStore {
    fn load(&self) -> PinResult<Vec<Pin>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, pins: &[Pin]) -> PinResult<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| PinError::Records("pin file has no parent directory".into()))?;
        fs::create_dir_all(dir)?;
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(tmp.as_file(), pins)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| PinError::Io(e.error))?;
        debug!(count = pins.len(), path = %self.path.display(), "persisted pins");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PinMode;
    use dagfs_types::parse_cid;

    fn pin() -> Pin {
        let cid = parse_cid("QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn").unwrap();
        Pin::new(cid, PinMode::Direct)
    }

    #[test]
    fn in_memory_roundtrip() {
        let store = InMemoryPinStore::new();
        assert!(store.load().unwrap().is_empty());
        store.save(&[pin()]).unwrap();
        assert_eq!(store.load().unwrap(), vec![pin()]);
    }

    #[test]
    fn on_disk_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPinStore::in_repo(dir.path());
        assert!(store.load().unwrap().is_empty());
        store.save(&[pin()]).unwrap();
        let reopened = FsPinStore::in_repo(dir.path());
        assert_eq!(reopened.load().unwrap(), vec![pin()]);
    }

    #[test]
    fn garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPinStore::in_repo(dir.path());
        fs::write(store.path(), b"not json").unwrap();
        assert!(store.load().is_err());
    }
}
