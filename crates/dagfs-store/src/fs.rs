use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use dagfs_types::{block_key, Cid};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::traits::BlockStore;

const BLOCK_EXT: &str = "data";

/// On-disk block store, one file per block.
///
/// Layout: `<root>/<shard>/<hex key>.data`, where the key is the binary
/// CIDv1 and the shard is the two hex characters before the last one.
/// Files are written to a temp file in the shard directory and renamed
/// into place, so a reader never sees a partial block.
#[derive(Debug, Clone)]
pub struct FsBlockStore {
    root: PathBuf,
}

impl FsBlockStore {
    /// Open (or create) a block store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the shard directories.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn block_path(&self, cid: &Cid) -> PathBuf {
        let key = hex::encode(block_key(cid));
        let shard = &key[key.len() - 3..key.len() - 1];
        self.root
            .join(shard)
            .join(format!("{key}.{BLOCK_EXT}"))
    }

    fn parse_path(path: &Path) -> StoreResult<Cid> {
        let corrupt = |reason: &str| StoreError::Corrupt {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| corrupt("file name is not UTF-8"))?;
        let key = hex::decode(stem).map_err(|e| corrupt(&e.to_string()))?;
        Cid::try_from(key.as_slice()).map_err(|e| corrupt(&e.to_string()))
    }
}

impl BlockStore for FsBlockStore {
    fn get(&self, cid: &Cid) -> StoreResult<Option<Bytes>> {
        match fs::read(self.block_path(cid)) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, cid: &Cid, data: Bytes) -> StoreResult<bool> {
        let path = self.block_path(cid);
        if path.exists() {
            return Ok(false);
        }
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Io(io::Error::other("block path has no parent")))?;
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        if let Err(e) = tmp.persist(&path) {
            // Another writer won the race with identical content.
            if path.exists() {
                return Ok(false);
            }
            return Err(e.error.into());
        }
        debug!(%cid, bytes = data.len(), "stored block on disk");
        Ok(true)
    }

    fn has(&self, cid: &Cid) -> StoreResult<bool> {
        Ok(self.block_path(cid).is_file())
    }

    fn delete(&self, cid: &Cid) -> StoreResult<bool> {
        match fs::remove_file(self.block_path(cid)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> StoreResult<Vec<Cid>> {
        let mut cids = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| StoreError::Io(io::Error::other(e.to_string())))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(BLOCK_EXT)
            {
                continue;
            }
            cids.push(Self::parse_path(path)?);
        }
        cids.sort_by_key(|cid| cid.to_bytes());
        Ok(cids)
    }

    fn size(&self, cid: &Cid) -> StoreResult<Option<u64>> {
        match fs::metadata(self.block_path(cid)) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagfs_crypto::cid_for;
    use dagfs_types::{to_v0, CidVersion, Codec, HashAlg};

    fn raw_cid(data: &[u8]) -> Cid {
        cid_for(data, Codec::Raw, HashAlg::Sha2_256, CidVersion::V1).unwrap()
    }

    #[test]
    fn put_get_delete_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlockStore::open(dir.path().join("blocks")).unwrap();
        let cid = raw_cid(b"on disk");

        assert!(store.put(&cid, Bytes::from_static(b"on disk")).unwrap());
        assert!(!store.put(&cid, Bytes::from_static(b"on disk")).unwrap());
        assert_eq!(store.get(&cid).unwrap().unwrap(), &b"on disk"[..]);
        assert_eq!(store.size(&cid).unwrap(), Some(7));

        assert!(store.delete(&cid).unwrap());
        assert!(store.get(&cid).unwrap().is_none());
        assert!(!store.delete(&cid).unwrap());
    }

    #[test]
    fn list_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let a = raw_cid(b"a");
        let b = raw_cid(b"b");
        {
            let store = FsBlockStore::open(dir.path()).unwrap();
            store.put(&a, Bytes::from_static(b"a")).unwrap();
            store.put(&b, Bytes::from_static(b"b")).unwrap();
        }
        let store = FsBlockStore::open(dir.path()).unwrap();
        let mut expected = vec![a, b];
        expected.sort_by_key(|c| c.to_bytes());
        assert_eq!(store.list().unwrap(), expected);
    }

    #[test]
    fn v0_lookup_finds_v1_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlockStore::open(dir.path()).unwrap();
        let bytes = [0x0a, 0x02, 0x08, 0x01];
        let v1 = cid_for(&bytes, Codec::DagPb, HashAlg::Sha2_256, CidVersion::V1).unwrap();
        store.put(&v1, Bytes::copy_from_slice(&bytes)).unwrap();
        assert!(store.has(&to_v0(&v1).unwrap()).unwrap());
    }

    #[test]
    fn stray_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlockStore::open(dir.path()).unwrap();
        fs::create_dir_all(dir.path().join("zz")).unwrap();
        fs::write(dir.path().join("zz").join("notes.txt"), b"hi").unwrap();
        assert!(store.list().unwrap().is_empty());
    }
}
