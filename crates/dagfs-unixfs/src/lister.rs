use dagfs_codec::{pb, PbLink};
use dagfs_types::Cid;
use futures::stream::{self, Stream};

use crate::dag::Dag;
use crate::directory::DirLink;
use crate::error::UnixFsResult;
use crate::hamt::{parse_link, ShardNode, Slot};
use crate::node::NodeKind;

struct Frame {
    shard: Option<Cid>,
    links: std::vec::IntoIter<PbLink>,
}

/// Pull-based directory listing.
///
/// Basic directories yield entries in link order. Shards are walked depth
/// first in slot order, loading each sub-shard only when the walk reaches
/// it.
pub struct DirectoryLister {
    dag: Dag,
    frames: Vec<Frame>,
}

impl DirectoryLister {
    pub async fn open(dag: Dag, dir: &Cid) -> UnixFsResult<Self> {
        let node = dag.load(dir).await?;
        let shard = match node.expect_directory()? {
            NodeKind::HamtShardedDirectory => {
                ShardNode::from_node(&node)?;
                Some(*dir)
            }
            _ => None,
        };
        let links = node.links().to_vec().into_iter();
        Ok(Self {
            dag,
            frames: vec![Frame { shard, links }],
        })
    }

    /// Next entry, or `None` once the directory is exhausted or closed.
    pub async fn next_entry(&mut self) -> UnixFsResult<Option<DirLink>> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(None);
            };
            let Some(link) = frame.links.next() else {
                self.frames.pop();
                continue;
            };
            let Some(shard) = frame.shard else {
                let name = pb::link_name(&link).to_string();
                return Ok(Some(DirLink::new(name, link.cid, link.size.unwrap_or(0))));
            };
            match parse_link(&shard, &link)?.1 {
                Slot::Entry(entry) => return Ok(Some(entry)),
                Slot::Shard { cid, .. } => {
                    self.dag.abort().check()?;
                    let node = self.dag.load(&cid).await?;
                    ShardNode::from_node(&node)?;
                    self.frames.push(Frame {
                        shard: Some(cid),
                        links: node.links().to_vec().into_iter(),
                    });
                }
            }
        }
    }

    /// Stop early. Later calls to `next_entry` return `None`.
    pub fn close(&mut self) {
        self.frames.clear();
    }

    /// Drain the remaining entries.
    pub async fn collect(mut self) -> UnixFsResult<Vec<DirLink>> {
        let mut out = Vec::new();
        while let Some(entry) = self.next_entry().await? {
            out.push(entry);
        }
        Ok(out)
    }

    pub fn into_stream(self) -> impl Stream<Item = UnixFsResult<DirLink>> {
        stream::try_unfold(self, |mut lister| async move {
            Ok(lister.next_entry().await?.map(|entry| (entry, lister)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use dagfs_store::BlockService;
    use futures::TryStreamExt;

    async fn sharded(dag: &Dag, n: usize) -> Cid {
        let mut entries = Vec::new();
        for i in 0..n {
            let (cid, tsize) = dag.put_raw(Bytes::from(format!("{i}"))).await.unwrap();
            entries.push(DirLink::new(format!("f{i}"), cid, tsize));
        }
        dag.build_directory(entries, &dagfs_codec::UnixFsData::directory(), 0)
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn lists_every_shard_entry() {
        let dag = Dag::new(BlockService::in_memory());
        let dir = sharded(&dag, 700).await;
        let entries = DirectoryLister::open(dag.clone(), &dir)
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        assert_eq!(entries.len(), 700);
        let mut names: Vec<_> = entries.into_iter().map(|e| e.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 700);
    }

    #[tokio::test]
    async fn close_stops_the_listing() {
        let dag = Dag::new(BlockService::in_memory());
        let dir = sharded(&dag, 20).await;
        let mut lister = DirectoryLister::open(dag, &dir).await.unwrap();
        assert!(lister.next_entry().await.unwrap().is_some());
        lister.close();
        assert!(lister.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stream_form() {
        let dag = Dag::new(BlockService::in_memory());
        let (empty, _) = dag.empty_directory(None, None).await.unwrap();
        let (cid, tsize) = dag.put_raw(Bytes::from_static(b"x")).await.unwrap();
        let (dir, _) = dag
            .dir_insert(&empty, DirLink::new("x", cid, tsize), false, 10)
            .await
            .unwrap();
        let lister = DirectoryLister::open(dag, &dir).await.unwrap();
        let entries: Vec<DirLink> = lister.into_stream().try_collect().await.unwrap();
        assert_eq!(entries, vec![DirLink::new("x", cid, tsize)]);
    }

    #[tokio::test]
    async fn files_cannot_be_listed() {
        let dag = Dag::new(BlockService::in_memory());
        let (cid, _) = dag.put_raw(Bytes::from_static(b"x")).await.unwrap();
        assert!(DirectoryLister::open(dag, &cid).await.is_err());
    }
}
