//! Directory engine.
//!
//! One API over basic directories and HAMT shards. Callers name entries
//! and never see the layout; a basic directory turns into a shard once it
//! holds more than the split threshold, and a shard stays a shard.

use std::fmt;

use dagfs_codec::{pb, PbLink, UnixFsData};
use dagfs_types::{Cid, Mtime};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dag::Dag;
use crate::error::{UnixFsError, UnixFsResult};
use crate::hamt::{slot_index, ShardNode, Slot, MAX_DEPTH};
use crate::lister::DirectoryLister;
use crate::node::{LoadedNode, NodeKind};

/// Entry count above which a basic directory is rebuilt as a HAMT.
pub const DEFAULT_SHARD_SPLIT_THRESHOLD: usize = 1000;

/// A named child of a directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirLink {
    pub name: String,
    #[serde(with = "dagfs_types::serde_cid")]
    pub cid: Cid,
    /// Cumulative size of the child subtree.
    pub tsize: u64,
}

impl DirLink {
    pub fn new(name: impl Into<String>, cid: Cid, tsize: u64) -> Self {
        Self {
            name: name.into(),
            cid,
            tsize,
        }
    }

    pub fn to_pb(&self) -> PbLink {
        pb::link(self.cid, self.name.clone(), self.tsize)
    }
}

impl fmt::Display for DirLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.cid, self.tsize, self.name)
    }
}

/// Reject names that cannot be a single path segment.
pub fn validate_name(name: &str) -> UnixFsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(UnixFsError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// A rewritten sub-shard, as seen by its parent.
enum Removal {
    Shard(Cid, u64),
    /// Only one entry is left; the parent takes it over directly.
    Single(DirLink),
    Empty,
}

fn bump_mtime(data: &mut UnixFsData) {
    if data.mtime.is_some() {
        data.mtime = Some(Mtime::now());
    }
}

impl Dag {
    /// Write an empty basic directory.
    pub async fn empty_directory(
        &self,
        mode: Option<u32>,
        mtime: Option<Mtime>,
    ) -> UnixFsResult<(Cid, u64)> {
        let data = UnixFsData::directory().with_mode(mode).with_mtime(mtime);
        self.put_node(&data, Vec::new()).await
    }

    /// Write a directory holding `entries`, sharded when there are more
    /// than `threshold` of them. Mode and mtime come from `header`.
    pub async fn build_directory(
        &self,
        entries: Vec<DirLink>,
        header: &UnixFsData,
        threshold: usize,
    ) -> UnixFsResult<(Cid, u64)> {
        for entry in &entries {
            validate_name(&entry.name)?;
        }
        if entries.len() > threshold {
            return self.build_shard(entries, 0, ShardNode::inheriting(header)).await;
        }
        let data = UnixFsData::directory()
            .with_mode(header.explicit_mode())
            .with_mtime(header.mtime);
        self.put_node(&data, entries.iter().map(DirLink::to_pb).collect())
            .await
    }

    /// Find the entry called `name`.
    pub async fn dir_lookup(&self, dir: &Cid, name: &str) -> UnixFsResult<Option<DirLink>> {
        let node = self.load(dir).await?;
        match node.expect_directory()? {
            NodeKind::Directory => Ok(node
                .links()
                .iter()
                .find(|l| pb::link_name(l) == name)
                .map(|l| DirLink::new(name, l.cid, l.size.unwrap_or(0)))),
            _ => self.shard_lookup(node, name).await,
        }
    }

    async fn shard_lookup(&self, root: LoadedNode, name: &str) -> UnixFsResult<Option<DirLink>> {
        let mut shard = ShardNode::from_node(&root)?;
        for depth in 0..MAX_DEPTH {
            match shard.slots.remove(&slot_index(name, depth)) {
                None => return Ok(None),
                Some(Slot::Entry(link)) => return Ok((link.name == name).then_some(link)),
                Some(Slot::Shard { cid, .. }) => {
                    shard = ShardNode::from_node(&self.load(&cid).await?)?;
                }
            }
        }
        Err(UnixFsError::Corrupt {
            cid: root.cid,
            reason: "shard nesting too deep".into(),
        })
    }

    /// Add or replace an entry. Fails with `AlreadyExists` when the name
    /// is taken and `overwrite` is false.
    pub async fn dir_insert(
        &self,
        dir: &Cid,
        entry: DirLink,
        overwrite: bool,
        threshold: usize,
    ) -> UnixFsResult<(Cid, u64)> {
        validate_name(&entry.name)?;
        let node = self.load(dir).await?;
        match node.expect_directory()? {
            NodeKind::Directory => self.basic_insert(node, entry, overwrite, threshold).await,
            _ => self.shard_insert(*dir, 0, entry, overwrite).await,
        }
    }

    async fn basic_insert(
        &self,
        node: LoadedNode,
        entry: DirLink,
        overwrite: bool,
        threshold: usize,
    ) -> UnixFsResult<(Cid, u64)> {
        let mut data = node.data().cloned().unwrap_or_else(UnixFsData::directory);
        bump_mtime(&mut data);
        let mut links: Vec<DirLink> = node
            .links()
            .iter()
            .map(|l| DirLink::new(pb::link_name(l), l.cid, l.size.unwrap_or(0)))
            .collect();
        match links.iter_mut().find(|l| l.name == entry.name) {
            Some(_) if !overwrite => return Err(UnixFsError::AlreadyExists(entry.name)),
            Some(existing) => *existing = entry,
            None => links.push(entry),
        }
        if links.len() > threshold {
            debug!(dir = %node.cid, entries = links.len(), "promoting directory to HAMT");
            return self.build_shard(links, 0, ShardNode::inheriting(&data)).await;
        }
        self.put_node(&data, links.iter().map(DirLink::to_pb).collect())
            .await
    }

    fn shard_insert(
        &self,
        cid: Cid,
        depth: usize,
        entry: DirLink,
        overwrite: bool,
    ) -> BoxFuture<'_, UnixFsResult<(Cid, u64)>> {
        async move {
            let mut shard = ShardNode::from_node(&self.load(&cid).await?)?;
            let slot = slot_index(&entry.name, depth);
            let replacement = match shard.slots.remove(&slot) {
                None => Slot::Entry(entry),
                Some(Slot::Entry(existing)) if existing.name == entry.name => {
                    if !overwrite {
                        return Err(UnixFsError::AlreadyExists(entry.name));
                    }
                    Slot::Entry(entry)
                }
                Some(Slot::Entry(existing)) => {
                    let (cid, tsize) = self
                        .build_shard(vec![existing, entry], depth + 1, ShardNode::new())
                        .await?;
                    Slot::Shard { cid, tsize }
                }
                Some(Slot::Shard { cid: child, .. }) => {
                    let (cid, tsize) = self.shard_insert(child, depth + 1, entry, overwrite).await?;
                    Slot::Shard { cid, tsize }
                }
            };
            shard.slots.insert(slot, replacement);
            if depth == 0 {
                bump_mtime(&mut shard.data);
            }
            self.write_shard(&shard).await
        }
        .boxed()
    }

    /// Write a shard for `entries` at `depth`. A slot with one entry holds
    /// it directly; a slot with several gets a sub-shard of them.
    fn build_shard(
        &self,
        entries: Vec<DirLink>,
        depth: usize,
        mut shard: ShardNode,
    ) -> BoxFuture<'_, UnixFsResult<(Cid, u64)>> {
        async move {
            if depth >= MAX_DEPTH {
                return Err(UnixFsError::ShardCollision(
                    entries.into_iter().map(|e| e.name).collect(),
                ));
            }
            let mut groups: std::collections::BTreeMap<u8, Vec<DirLink>> = Default::default();
            for entry in entries {
                groups.entry(slot_index(&entry.name, depth)).or_default().push(entry);
            }
            for (slot, mut group) in groups {
                let occupant = if group.len() == 1 {
                    Slot::Entry(group.remove(0))
                } else {
                    let (cid, tsize) = self.build_shard(group, depth + 1, ShardNode::new()).await?;
                    Slot::Shard { cid, tsize }
                };
                shard.slots.insert(slot, occupant);
            }
            self.write_shard(&shard).await
        }
        .boxed()
    }

    async fn write_shard(&self, shard: &ShardNode) -> UnixFsResult<(Cid, u64)> {
        let (data, links) = shard.to_parts();
        self.put_node(&data, links).await
    }

    /// Remove the entry called `name`.
    pub async fn dir_remove(&self, dir: &Cid, name: &str) -> UnixFsResult<(Cid, u64)> {
        let node = self.load(dir).await?;
        match node.expect_directory()? {
            NodeKind::Directory => {
                let mut data = node.data().cloned().unwrap_or_else(UnixFsData::directory);
                bump_mtime(&mut data);
                let mut links = node.links().to_vec();
                let before = links.len();
                links.retain(|l| pb::link_name(l) != name);
                if links.len() == before {
                    return Err(UnixFsError::NoSuchEntry(name.to_string()));
                }
                self.put_node(&data, links).await
            }
            _ => match self.shard_remove(*dir, 0, name).await? {
                Removal::Shard(cid, tsize) => Ok((cid, tsize)),
                Removal::Single(_) | Removal::Empty => Err(UnixFsError::Corrupt {
                    cid: *dir,
                    reason: "root shard collapsed".into(),
                }),
            },
        }
    }

    fn shard_remove<'a>(
        &'a self,
        cid: Cid,
        depth: usize,
        name: &'a str,
    ) -> BoxFuture<'a, UnixFsResult<Removal>> {
        async move {
            let mut shard = ShardNode::from_node(&self.load(&cid).await?)?;
            let slot = slot_index(name, depth);
            match shard.slots.remove(&slot) {
                Some(Slot::Entry(existing)) if existing.name == name => {}
                Some(Slot::Shard { cid: child, .. }) => {
                    match self.shard_remove(child, depth + 1, name).await? {
                        Removal::Shard(cid, tsize) => {
                            shard.slots.insert(slot, Slot::Shard { cid, tsize });
                        }
                        Removal::Single(entry) => {
                            shard.slots.insert(slot, Slot::Entry(entry));
                        }
                        Removal::Empty => {}
                    }
                }
                _ => return Err(UnixFsError::NoSuchEntry(name.to_string())),
            }

            if depth > 0 {
                let mut occupants = shard.slots.values();
                match (occupants.next(), occupants.next()) {
                    (None, _) => return Ok(Removal::Empty),
                    (Some(Slot::Entry(only)), None) => return Ok(Removal::Single(only.clone())),
                    _ => {}
                }
            } else {
                bump_mtime(&mut shard.data);
            }
            let (cid, tsize) = self.write_shard(&shard).await?;
            Ok(Removal::Shard(cid, tsize))
        }
        .boxed()
    }

    /// All entries in listing order.
    pub async fn dir_entries(&self, dir: &Cid) -> UnixFsResult<Vec<DirLink>> {
        DirectoryLister::open(self.clone(), dir).await?.collect().await
    }

    /// Rebuild a basic directory as a shard when it holds more than
    /// `threshold` entries. Anything else comes back unchanged.
    pub async fn maybe_promote(&self, dir: &Cid, threshold: usize) -> UnixFsResult<(Cid, u64)> {
        let node = self.load(dir).await?;
        if node.expect_directory()? == NodeKind::Directory && node.links().len() > threshold {
            let header = node.data().cloned().unwrap_or_else(UnixFsData::directory);
            let entries = node
                .links()
                .iter()
                .map(|l| DirLink::new(pb::link_name(l), l.cid, l.size.unwrap_or(0)))
                .collect();
            return self.build_shard(entries, 0, ShardNode::inheriting(&header)).await;
        }
        Ok((*dir, node.cumulative_size()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagfs_store::BlockService;
    use proptest::prelude::*;

    fn dag() -> Dag {
        Dag::new(BlockService::in_memory())
    }

    async fn child(dag: &Dag, name: &str) -> DirLink {
        let (cid, tsize) = dag.put_raw(bytes::Bytes::from(name.to_string())).await.unwrap();
        DirLink::new(name, cid, tsize)
    }

    async fn insert_all(dag: &Dag, names: &[String], threshold: usize) -> Cid {
        let (mut dir, _) = dag.empty_directory(None, None).await.unwrap();
        for name in names {
            let entry = child(dag, name).await;
            dir = dag.dir_insert(&dir, entry, false, threshold).await.unwrap().0;
        }
        dir
    }

    async fn names(dag: &Dag, dir: &Cid) -> Vec<String> {
        let mut out: Vec<String> = dag
            .dir_entries(dir)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        out.sort();
        out
    }

    fn numbered(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("file-{i}")).collect()
    }

    // -------------------------------------------------------------------
    // Basic directories
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn insert_lookup_remove() {
        let dag = dag();
        let (dir, _) = dag.empty_directory(None, None).await.unwrap();
        let a = child(&dag, "a").await;
        let (dir2, _) = dag.dir_insert(&dir, a.clone(), false, 10).await.unwrap();

        assert_eq!(dag.dir_lookup(&dir2, "a").await.unwrap(), Some(a.clone()));
        assert_eq!(dag.dir_lookup(&dir2, "b").await.unwrap(), None);
        assert_eq!(dag.load(&dir2).await.unwrap().kind().unwrap(), NodeKind::Directory);

        let (dir3, _) = dag.dir_remove(&dir2, "a").await.unwrap();
        assert_eq!(dir3, dir);
    }

    #[tokio::test]
    async fn duplicate_name_needs_overwrite() {
        let dag = dag();
        let dir = insert_all(&dag, &["a".into()], 10).await;
        let other = child(&dag, "other").await;
        let renamed = DirLink::new("a", other.cid, other.tsize);

        let err = dag.dir_insert(&dir, renamed.clone(), false, 10).await.unwrap_err();
        assert!(matches!(err, UnixFsError::AlreadyExists(_)));

        let (dir, _) = dag.dir_insert(&dir, renamed.clone(), true, 10).await.unwrap();
        assert_eq!(dag.dir_lookup(&dir, "a").await.unwrap(), Some(renamed));
    }

    #[tokio::test]
    async fn removing_missing_entry_fails() {
        let dag = dag();
        let dir = insert_all(&dag, &["a".into()], 10).await;
        assert!(matches!(
            dag.dir_remove(&dir, "zzz").await,
            Err(UnixFsError::NoSuchEntry(_))
        ));
    }

    #[tokio::test]
    async fn bad_names_are_rejected() {
        let dag = dag();
        let (dir, _) = dag.empty_directory(None, None).await.unwrap();
        let entry = child(&dag, "x").await;
        for bad in ["", ".", "..", "a/b"] {
            let link = DirLink::new(bad, entry.cid, entry.tsize);
            assert!(matches!(
                dag.dir_insert(&dir, link, false, 10).await,
                Err(UnixFsError::InvalidName(_))
            ));
        }
    }

    #[tokio::test]
    async fn file_is_not_a_directory() {
        let dag = dag();
        let file = child(&dag, "f").await;
        assert!(matches!(
            dag.dir_lookup(&file.cid, "x").await,
            Err(UnixFsError::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn metadata_survives_inserts() {
        let dag = dag();
        let (dir, _) = dag.empty_directory(Some(0o700), None).await.unwrap();
        let a = child(&dag, "a").await;
        let (dir, _) = dag.dir_insert(&dir, a, false, 10).await.unwrap();
        assert_eq!(dag.load(&dir).await.unwrap().mode(), 0o700);
    }

    // -------------------------------------------------------------------
    // Sharding
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn promotion_happens_above_threshold() {
        let dag = dag();
        let dir = insert_all(&dag, &numbered(3), 3).await;
        assert_eq!(dag.load(&dir).await.unwrap().kind().unwrap(), NodeKind::Directory);

        let extra = child(&dag, "file-3").await;
        let (dir, _) = dag.dir_insert(&dir, extra, false, 3).await.unwrap();
        assert_eq!(
            dag.load(&dir).await.unwrap().kind().unwrap(),
            NodeKind::HamtShardedDirectory
        );
        assert_eq!(names(&dag, &dir).await, {
            let mut n = numbered(4);
            n.sort();
            n
        });
    }

    #[tokio::test]
    async fn shard_never_reverts() {
        let dag = dag();
        let dir = insert_all(&dag, &numbered(5), 0).await;
        let mut dir = dir;
        for name in numbered(5) {
            dir = dag.dir_remove(&dir, &name).await.unwrap().0;
        }
        let node = dag.load(&dir).await.unwrap();
        assert_eq!(node.kind().unwrap(), NodeKind::HamtShardedDirectory);
        assert!(node.links().is_empty());
    }

    #[tokio::test]
    async fn shard_lookup_and_overwrite() {
        let dag = dag();
        let dir = insert_all(&dag, &numbered(300), 0).await;
        let found = dag.dir_lookup(&dir, "file-123").await.unwrap().unwrap();
        assert_eq!(found.name, "file-123");
        assert_eq!(dag.dir_lookup(&dir, "file-999").await.unwrap(), None);

        let replacement = child(&dag, "new").await;
        let err = dag
            .dir_insert(&dir, DirLink::new("file-123", replacement.cid, 1), false, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, UnixFsError::AlreadyExists(_)));
        let (dir, _) = dag
            .dir_insert(&dir, DirLink::new("file-123", replacement.cid, 1), true, 0)
            .await
            .unwrap();
        assert_eq!(
            dag.dir_lookup(&dir, "file-123").await.unwrap().unwrap().cid,
            replacement.cid
        );
    }

    #[tokio::test]
    async fn large_shard_has_subshards() {
        let dag = dag();
        let dir = insert_all(&dag, &numbered(600), 0).await;
        let node = dag.load(&dir).await.unwrap();
        assert!(node.links().iter().any(|l| pb::link_name(l).len() == 2));
        assert_eq!(names(&dag, &dir).await.len(), 600);
    }

    #[tokio::test]
    async fn promote_matches_incremental_build() {
        let dag = dag();
        let basic = insert_all(&dag, &numbered(40), 1000).await;
        let (promoted, _) = dag.maybe_promote(&basic, 0).await.unwrap();
        let incremental = insert_all(&dag, &numbered(40), 0).await;
        assert_eq!(promoted, incremental);

        let (unchanged, tsize) = dag.maybe_promote(&basic, 1000).await.unwrap();
        assert_eq!(unchanged, basic);
        assert_eq!(tsize, dag.load(&basic).await.unwrap().cumulative_size());
    }

    #[tokio::test]
    async fn remove_collapses_to_canonical_form() {
        let dag = dag();
        let all = numbered(500);
        let full = insert_all(&dag, &all, 0).await;
        let mut dir = full;
        for name in &all[250..] {
            dir = dag.dir_remove(&dir, name).await.unwrap().0;
        }
        let fresh = insert_all(&dag, &all[..250], 0).await;
        assert_eq!(dir, fresh);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn shard_cid_ignores_insertion_order(
            names in proptest::collection::btree_set("[a-z0-9]{1,6}", 1..80),
            seed in any::<u64>(),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let dag = dag();
                let forward: Vec<String> = names.iter().cloned().collect();
                let mut shuffled = forward.clone();
                let n = shuffled.len();
                for i in (1..n).rev() {
                    let j = (seed.wrapping_mul(i as u64 + 7) % (i as u64 + 1)) as usize;
                    shuffled.swap(i, j);
                }
                let a = insert_all(&dag, &forward, 0).await;
                let b = insert_all(&dag, &shuffled, 0).await;
                prop_assert_eq!(a, b);

                let entries = futures::future::join_all(forward.iter().map(|n| child(&dag, n))).await;
                let (built, _) = dag
                    .build_directory(entries, &UnixFsData::directory(), 0)
                    .await
                    .unwrap();
                prop_assert_eq!(a, built);
                Ok(())
            })?;
        }
    }
}
