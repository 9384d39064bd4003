//! Where the MFS root pointer lives between runs.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use dagfs_types::{parse_cid, Cid};
use tracing::debug;

use crate::error::{FilesError, FilesResult};

/// Storage for the MFS root CID.
///
/// Implementations must be thread-safe. `store` replaces the pointer
/// atomically: a concurrent `load` sees the old or the new root, never a
/// mix.
pub trait RootStore: Send + Sync {
    /// The stored root, or `None` before the first `store`.
    fn load(&self) -> FilesResult<Option<Cid>>;

    fn store(&self, root: &Cid) -> FilesResult<()>;
}

/// Keeps the root in memory. Lost when dropped.
#[derive(Debug, Default)]
pub struct InMemoryRootStore {
    root: RwLock<Option<Cid>>,
}

impl InMemoryRootStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RootStore for InMemoryRootStore {
    fn load(&self) -> FilesResult<Option<Cid>> {
        Ok(*self.root.read().expect("lock poisoned"))
    }

    fn store(&self, root: &Cid) -> FilesResult<()> {
        *self.root.write().expect("lock poisoned") = Some(*root);
        Ok(())
    }
}

/// Keeps the root as a CID string in a single file, replaced through a
/// temp file and rename.
#[derive(Debug, Clone)]
pub struct FsRootStore {
    path: PathBuf,
}

impl FsRootStore {
    /// File name used inside a repository directory.
    pub const FILE_NAME: &'static str = "mfs-root";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Root pointer file inside `repo`.
    pub fn in_repo(repo: impl AsRef<Path>) -> Self {
        Self::new(repo.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RootStore for FsRootStore {
    fn load(&self) -> FilesResult<Option<Cid>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        parse_cid(text.trim())
            .map(Some)
            .map_err(|e| FilesError::RootStore(format!("{}: {e}", self.path.display())))
    }

    fn store(&self, root: &Cid) -> FilesResult<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| FilesError::RootStore("root file has no parent directory".into()))?;
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        writeln!(tmp, "{root}")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| FilesError::Io(e.error))?;
        debug!(%root, path = %self.path.display(), "persisted mfs root");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some_root() -> Cid {
        parse_cid("QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn").unwrap()
    }

    #[test]
    fn in_memory() {
        let store = InMemoryRootStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.store(&some_root()).unwrap();
        assert_eq!(store.load().unwrap(), Some(some_root()));
    }

    #[test]
    fn on_disk_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRootStore::in_repo(dir.path());
        assert_eq!(store.load().unwrap(), None);
        store.store(&some_root()).unwrap();

        let reopened = FsRootStore::in_repo(dir.path());
        assert_eq!(reopened.load().unwrap(), Some(some_root()));
        assert!(dir.path().join("mfs-root").is_file());
    }

    #[test]
    fn garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mfs-root"), "not a cid").unwrap();
        let err = FsRootStore::in_repo(dir.path()).load().unwrap_err();
        assert!(matches!(err, FilesError::RootStore(_)));
    }
}
