//! Low-level dag-pb nodes.
//!
//! Every node written here is dag-pb hashed with sha2-256 and named by a
//! CIDv0. Patches never modify a node; they write a new one and return
//! its CID.

use bytes::{Bytes, BytesMut};
use dagfs_codec::{pb, CodecError, PbLink, PbNode, UnixFsData};
use dagfs_store::{AbortOptions, PutOptions};
use dagfs_types::{codec_of, Cid, CidVersion, Codec, HashAlg};
use serde::Serialize;
use std::str::FromStr;

use crate::error::{SdkError, SdkResult};
use crate::node::Node;

/// Starting point for [`ObjectApi::new`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ObjectTemplate {
    /// No data and no links.
    #[default]
    Empty,
    /// An empty UnixFS directory.
    UnixFsDir,
}

impl FromStr for ObjectTemplate {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "empty" => Ok(Self::Empty),
            "unixfs-dir" => Ok(Self::UnixFsDir),
            other => Err(SdkError::InvalidArgument(format!("unknown template {other:?}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectStat {
    #[serde(with = "dagfs_types::serde_cid")]
    pub hash: Cid,
    pub num_links: usize,
    pub block_size: u64,
    pub links_size: u64,
    pub data_size: u64,
    pub cumulative_size: u64,
}

/// dag-pb object operations of a [`Node`].
pub struct ObjectApi<'a> {
    node: &'a Node,
}

impl<'a> ObjectApi<'a> {
    pub(crate) fn new(node: &'a Node) -> Self {
        Self { node }
    }

    fn put_options() -> PutOptions {
        PutOptions::new(Codec::DagPb, HashAlg::Sha2_256, CidVersion::V0)
    }

    async fn write(&self, node: PbNode) -> SdkResult<Cid> {
        let _gc = self.node.blocks().gc_lock().writer().await;
        Ok(self
            .node
            .blocks()
            .put(pb::encode(node), &Self::put_options())
            .await?)
    }

    /// Write a new node from a template.
    pub async fn create(&self, template: ObjectTemplate) -> SdkResult<Cid> {
        let data = match template {
            ObjectTemplate::Empty => None,
            ObjectTemplate::UnixFsDir => Some(UnixFsData::directory().encode()?),
        };
        self.write(pb::node(data, Vec::new())).await
    }

    pub async fn put(&self, node: PbNode) -> SdkResult<Cid> {
        self.write(node).await
    }

    /// Decode the dag-pb node at `cid`.
    pub async fn get(&self, cid: &Cid, abort: &AbortOptions) -> SdkResult<PbNode> {
        Ok(pb::decode(&self.raw(cid, abort).await?)?)
    }

    pub async fn data(&self, cid: &Cid, abort: &AbortOptions) -> SdkResult<Bytes> {
        Ok(self.get(cid, abort).await?.data.unwrap_or_default())
    }

    pub async fn links(&self, cid: &Cid, abort: &AbortOptions) -> SdkResult<Vec<PbLink>> {
        Ok(self.get(cid, abort).await?.links)
    }

    pub async fn stat(&self, cid: &Cid, abort: &AbortOptions) -> SdkResult<ObjectStat> {
        let raw = self.raw(cid, abort).await?;
        let node = pb::decode(&raw)?;
        let block_size = raw.len() as u64;
        let data_size = node.data.as_ref().map_or(0, |d| d.len() as u64);
        Ok(ObjectStat {
            hash: *cid,
            num_links: node.links.len(),
            block_size,
            links_size: block_size - data_size,
            data_size,
            cumulative_size: block_size + link_sizes(&node),
        })
    }

    // ---- Patches ----

    /// Add a link named `name` to `target`, replacing any link already
    /// using that name.
    pub async fn patch_add_link(
        &self,
        cid: &Cid,
        name: &str,
        target: &Cid,
        abort: &AbortOptions,
    ) -> SdkResult<Cid> {
        let mut node = self.get(cid, abort).await?;
        let tsize = self.cumulative_size(target, abort).await?;
        node.links.retain(|l| pb::link_name(l) != name);
        node.links.push(pb::link(*target, name, tsize));
        self.write(node).await
    }

    pub async fn patch_rm_link(&self, cid: &Cid, name: &str, abort: &AbortOptions) -> SdkResult<Cid> {
        let mut node = self.get(cid, abort).await?;
        let before = node.links.len();
        node.links.retain(|l| pb::link_name(l) != name);
        if node.links.len() == before {
            return Err(CodecError::PathNotFound {
                cid: *cid,
                segment: name.to_string(),
            }
            .into());
        }
        self.write(node).await
    }

    pub async fn patch_append_data(
        &self,
        cid: &Cid,
        data: &[u8],
        abort: &AbortOptions,
    ) -> SdkResult<Cid> {
        let mut node = self.get(cid, abort).await?;
        let mut joined = BytesMut::from(node.data.unwrap_or_default().as_ref());
        joined.extend_from_slice(data);
        node.data = Some(joined.freeze());
        self.write(node).await
    }

    pub async fn patch_set_data(&self, cid: &Cid, data: &[u8], abort: &AbortOptions) -> SdkResult<Cid> {
        let mut node = self.get(cid, abort).await?;
        node.data = Some(Bytes::copy_from_slice(data));
        self.write(node).await
    }

    // ---- Helpers ----

    async fn raw(&self, cid: &Cid, abort: &AbortOptions) -> SdkResult<Bytes> {
        if codec_of(cid)? != Codec::DagPb {
            return Err(SdkError::InvalidArgument(format!("{cid} is not a dag-pb node")));
        }
        let abort = self.node.abort_or_default(abort);
        Ok(self.node.blocks().get(cid, &abort).await?)
    }

    /// Size of `cid` and everything it links to, as recorded in its links.
    async fn cumulative_size(&self, cid: &Cid, abort: &AbortOptions) -> SdkResult<u64> {
        let abort = self.node.abort_or_default(abort);
        let raw = self.node.blocks().get(cid, &abort).await?;
        let size = raw.len() as u64;
        Ok(match codec_of(cid)? {
            Codec::DagPb => size + link_sizes(&pb::decode(&raw)?),
            _ => size,
        })
    }
}

fn link_sizes(node: &PbNode) -> u64 {
    node.links.iter().map(|l| l.size.unwrap_or(0)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagfs_types::ErrorKind;

    const EMPTY_OBJECT: &str = "QmdfTbBqBPQ7VNxZEYEj14VmRuZBkqFbiwReogJgS1zR1n";
    const EMPTY_DIR: &str = "QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn";

    async fn node() -> Node {
        Node::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn templates() {
        let node = node().await;
        let empty = node.object().create(ObjectTemplate::Empty).await.unwrap();
        assert_eq!(empty.to_string(), EMPTY_OBJECT);
        let dir = node.object().create(ObjectTemplate::UnixFsDir).await.unwrap();
        assert_eq!(dir.to_string(), EMPTY_DIR);
    }

    #[test]
    fn template_names() {
        assert_eq!("unixfs-dir".parse::<ObjectTemplate>().unwrap(), ObjectTemplate::UnixFsDir);
        assert_eq!("".parse::<ObjectTemplate>().unwrap(), ObjectTemplate::Empty);
        assert!("nope".parse::<ObjectTemplate>().is_err());
    }

    #[tokio::test]
    async fn empty_object_stat() {
        let node = node().await;
        let empty = node.object().create(ObjectTemplate::Empty).await.unwrap();
        let stat = node.object().stat(&empty, &AbortOptions::new()).await.unwrap();
        assert_eq!(stat.num_links, 0);
        assert_eq!(stat.block_size, 0);
        assert_eq!(stat.data_size, 0);
        assert_eq!(stat.cumulative_size, 0);
    }

    #[tokio::test]
    async fn add_and_remove_links() {
        let node = node().await;
        let abort = AbortOptions::new();
        let objects = node.object();
        let dir = objects.create(ObjectTemplate::UnixFsDir).await.unwrap();
        let child = objects.create(ObjectTemplate::Empty).await.unwrap();

        let with_child = objects
            .patch_add_link(&dir, "child", &dir, &abort)
            .await
            .unwrap();
        let links = objects.links(&with_child, &abort).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(pb::link_name(&links[0]), "child");
        assert_eq!(links[0].size, Some(4));

        let replaced = objects
            .patch_add_link(&with_child, "child", &child, &abort)
            .await
            .unwrap();
        let links = objects.links(&replaced, &abort).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].cid, child);

        let stat = objects.stat(&with_child, &abort).await.unwrap();
        assert_eq!(stat.num_links, 1);
        assert_eq!(stat.data_size, 2);
        assert_eq!(stat.cumulative_size, stat.block_size + 4);

        let removed = objects
            .patch_rm_link(&with_child, "child", &abort)
            .await
            .unwrap();
        assert_eq!(removed, dir);
    }

    #[tokio::test]
    async fn rm_missing_link_fails() {
        let node = node().await;
        let dir = node.object().create(ObjectTemplate::UnixFsDir).await.unwrap();
        let err = node
            .object()
            .patch_rm_link(&dir, "ghost", &AbortOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn data_patches() {
        let node = node().await;
        let abort = AbortOptions::new();
        let objects = node.object();
        let empty = objects.create(ObjectTemplate::Empty).await.unwrap();
        let a = objects.patch_append_data(&empty, b"hello ", &abort).await.unwrap();
        let b = objects.patch_append_data(&a, b"world", &abort).await.unwrap();
        assert_eq!(&objects.data(&b, &abort).await.unwrap()[..], b"hello world");

        let c = objects.patch_set_data(&b, b"bye", &abort).await.unwrap();
        assert_eq!(&objects.data(&c, &abort).await.unwrap()[..], b"bye");
        assert_eq!(objects.stat(&c, &abort).await.unwrap().data_size, 3);
    }

    #[tokio::test]
    async fn non_dag_pb_is_rejected() {
        let node = node().await;
        let raw = node
            .block()
            .put(&b"raw"[..], &Default::default())
            .await
            .unwrap();
        let err = node
            .object()
            .get(&raw, &AbortOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
