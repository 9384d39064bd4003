use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use dagfs_types::{to_v1, Cid};

use crate::error::StoreResult;
use crate::traits::BlockStore;

/// In-memory, HashMap-based block store.
///
/// Intended for tests and embedding. Blocks are held behind a `RwLock`;
/// reads hand out cheap `Bytes` clones.
pub struct InMemoryBlockStore {
    blocks: RwLock<HashMap<Cid, Bytes>>,
}

impl InMemoryBlockStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blocks.
    pub fn total_bytes(&self) -> u64 {
        self.blocks
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }
}

impl Default for InMemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn get(&self, cid: &Cid) -> StoreResult<Option<Bytes>> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.get(&to_v1(cid)).cloned())
    }

    fn put(&self, cid: &Cid, data: Bytes) -> StoreResult<bool> {
        let mut map = self.blocks.write().expect("lock poisoned");
        let key = to_v1(cid);
        if map.contains_key(&key) {
            return Ok(false);
        }
        map.insert(key, data);
        Ok(true)
    }

    fn has(&self, cid: &Cid) -> StoreResult<bool> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.contains_key(&to_v1(cid)))
    }

    fn delete(&self, cid: &Cid) -> StoreResult<bool> {
        let mut map = self.blocks.write().expect("lock poisoned");
        Ok(map.remove(&to_v1(cid)).is_some())
    }

    fn list(&self) -> StoreResult<Vec<Cid>> {
        let map = self.blocks.read().expect("lock poisoned");
        let mut cids: Vec<Cid> = map.keys().copied().collect();
        cids.sort_by_key(|cid| cid.to_bytes());
        Ok(cids)
    }

    fn size(&self, cid: &Cid) -> StoreResult<Option<u64>> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.get(&to_v1(cid)).map(|data| data.len() as u64))
    }
}

impl std::fmt::Debug for InMemoryBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlockStore")
            .field("block_count", &self.len())
            .finish()
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

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn put_and_get() {
        let store = InMemoryBlockStore::new();
        let cid = raw_cid(b"blorb");
        assert!(store.put(&cid, Bytes::from_static(b"blorb")).unwrap());
        assert_eq!(store.get(&cid).unwrap().unwrap(), &b"blorb"[..]);
        assert!(store.has(&cid).unwrap());
        assert_eq!(store.size(&cid).unwrap(), Some(5));
    }

    #[test]
    fn missing_block_is_none() {
        let store = InMemoryBlockStore::new();
        let cid = raw_cid(b"nope");
        assert!(store.get(&cid).unwrap().is_none());
        assert!(!store.has(&cid).unwrap());
        assert_eq!(store.size(&cid).unwrap(), None);
    }

    #[test]
    fn put_is_idempotent() {
        let store = InMemoryBlockStore::new();
        let cid = raw_cid(b"same");
        assert!(store.put(&cid, Bytes::from_static(b"same")).unwrap());
        assert!(!store.put(&cid, Bytes::from_static(b"same")).unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_bytes(), 4);
    }

    #[test]
    fn delete_reports_presence() {
        let store = InMemoryBlockStore::new();
        let cid = raw_cid(b"gone");
        store.put(&cid, Bytes::from_static(b"gone")).unwrap();
        assert!(store.delete(&cid).unwrap());
        assert!(!store.delete(&cid).unwrap());
        assert!(store.is_empty());
    }

    // -----------------------------------------------------------------------
    // v0 / v1 equivalence
    // -----------------------------------------------------------------------

    #[test]
    fn v0_and_v1_share_entry() {
        let store = InMemoryBlockStore::new();
        let bytes = [0x0a, 0x02, 0x08, 0x01];
        let v1 = cid_for(&bytes, Codec::DagPb, HashAlg::Sha2_256, CidVersion::V1).unwrap();
        let v0 = to_v0(&v1).unwrap();
        store.put(&v0, Bytes::copy_from_slice(&bytes)).unwrap();
        assert!(store.has(&v1).unwrap());
        assert_eq!(store.list().unwrap(), vec![v1]);
    }

    #[test]
    fn put_many_counts_new_blocks() {
        let store = InMemoryBlockStore::new();
        let a = (raw_cid(b"a"), Bytes::from_static(b"a"));
        let b = (raw_cid(b"b"), Bytes::from_static(b"b"));
        assert_eq!(store.put_many(&[a.clone(), b.clone()]).unwrap(), 2);
        assert_eq!(store.put_many(&[a, b]).unwrap(), 0);
    }

    #[test]
    fn debug_shows_count() {
        let store = InMemoryBlockStore::new();
        store.put(&raw_cid(b"x"), Bytes::from_static(b"x")).unwrap();
        assert!(format!("{store:?}").contains("block_count: 1"));
    }
}
