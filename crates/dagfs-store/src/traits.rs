use bytes::Bytes;
use dagfs_types::Cid;

use crate::error::StoreResult;

/// Content-addressed block backend.
///
/// All implementations must satisfy these invariants:
/// - Entries are keyed by the CIDv1 form of the CID, so a v0 CID and its
///   v1 equivalent read and write the same entry.
/// - Blocks are immutable once written; a second put of the same CID is a
///   no-op.
/// - The backend never verifies or interprets bytes. [`BlockService`] does
///   the hashing before anything reaches a backend.
/// - All I/O errors are propagated, never silently ignored.
///
/// [`BlockService`]: crate::BlockService
pub trait BlockStore: Send + Sync {
    /// Read a block. Returns `Ok(None)` if it is not stored.
    fn get(&self, cid: &Cid) -> StoreResult<Option<Bytes>>;

    /// Store a block. Returns `true` if it was not already present.
    fn put(&self, cid: &Cid, data: Bytes) -> StoreResult<bool>;

    /// Check whether a block is stored.
    fn has(&self, cid: &Cid) -> StoreResult<bool>;

    /// Remove a block. Returns `true` if it existed.
    ///
    /// Intended for garbage collection and explicit `block rm`.
    fn delete(&self, cid: &Cid) -> StoreResult<bool>;

    /// Every stored block, as CIDv1.
    fn list(&self) -> StoreResult<Vec<Cid>>;

    /// Size of a stored block in bytes.
    ///
    /// Default implementation reads the block. Backends may override with
    /// a metadata lookup.
    fn size(&self, cid: &Cid) -> StoreResult<Option<u64>> {
        Ok(self.get(cid)?.map(|data| data.len() as u64))
    }

    /// Store several blocks. Returns how many were newly written.
    fn put_many(&self, blocks: &[(Cid, Bytes)]) -> StoreResult<usize> {
        let mut written = 0;
        for (cid, data) in blocks {
            if self.put(cid, data.clone())? {
                written += 1;
            }
        }
        Ok(written)
    }
}
