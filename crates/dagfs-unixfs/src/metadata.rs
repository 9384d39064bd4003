use dagfs_codec::UnixFsData;
use dagfs_types::{Cid, Mtime};

use crate::dag::Dag;
use crate::error::UnixFsResult;
use crate::file::inline_file;
use crate::node::NodeBody;

/// Metadata changes; `None` leaves a field as it is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub mode: Option<u32>,
    pub mtime: Option<Mtime>,
}

impl MetadataUpdate {
    pub fn mode(mode: u32) -> Self {
        Self {
            mode: Some(mode),
            mtime: None,
        }
    }

    pub fn mtime(mtime: Mtime) -> Self {
        Self {
            mode: None,
            mtime: Some(mtime),
        }
    }

    fn apply(&self, data: &mut UnixFsData) {
        if let Some(mode) = self.mode {
            data.set_mode(Some(mode));
        }
        if let Some(mtime) = self.mtime {
            data.mtime = Some(mtime);
        }
    }
}

impl Dag {
    /// Rewrite a node's header with new metadata, keeping its links.
    ///
    /// A raw block has no header, so it comes back as a file node holding
    /// the same bytes inline.
    pub async fn set_metadata(&self, cid: &Cid, update: MetadataUpdate) -> UnixFsResult<(Cid, u64)> {
        let node = self.load(cid).await?;
        match node.body {
            NodeBody::Raw(bytes) => {
                let mut data = inline_file(bytes.to_vec(), None, None);
                update.apply(&mut data);
                self.put_node(&data, Vec::new()).await
            }
            NodeBody::Pb { links, mut data } => {
                update.apply(&mut data);
                self.put_node(&data, links).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileOptions;
    use crate::node::NodeKind;
    use dagfs_store::BlockService;

    #[tokio::test]
    async fn raw_leaf_becomes_file_node() {
        let dag = Dag::new(BlockService::in_memory());
        let opts = FileOptions::default().with_raw_leaves(true);
        let file = dag.add_bytes(b"abc", &opts).await.unwrap();
        let (cid, _) = dag.set_metadata(&file.cid, MetadataUpdate::mode(0o600)).await.unwrap();
        let node = dag.load(&cid).await.unwrap();
        assert_eq!(node.kind().unwrap(), NodeKind::File);
        assert_eq!(node.mode(), 0o600);
        assert_eq!(dag.cat(&cid, 0, None).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn mtime_only_keeps_mode() {
        let dag = Dag::new(BlockService::in_memory());
        let (dir, _) = dag.empty_directory(Some(0o700), None).await.unwrap();
        let (dir, _) = dag
            .set_metadata(&dir, MetadataUpdate::mtime(Mtime::new(42, 7)))
            .await
            .unwrap();
        let node = dag.load(&dir).await.unwrap();
        assert_eq!(node.mode(), 0o700);
        assert_eq!(node.mtime(), Some(Mtime::new(42, 7)));
    }

    #[tokio::test]
    async fn default_mode_is_not_stored() {
        let dag = Dag::new(BlockService::in_memory());
        let (plain, _) = dag.empty_directory(None, None).await.unwrap();
        let (dir, _) = dag.empty_directory(Some(0o700), None).await.unwrap();
        let (back, _) = dag.set_metadata(&dir, MetadataUpdate::mode(0o755)).await.unwrap();
        assert_eq!(back, plain);
    }
}
