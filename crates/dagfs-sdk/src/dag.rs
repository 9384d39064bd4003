//! Structured values stored as dag-cbor, dag-json or dag-pb blocks.

use dagfs_codec::{from_ipld, resolve, to_ipld, Ipld};
use dagfs_pin::PinAddOptions;
use dagfs_store::{AbortOptions, PutOptions};
use dagfs_types::{Cid, CidVersion, Codec, HashAlg};
use dagfs_unixfs::parse_ipfs_path;
use serde::Serialize;
use tracing::debug;

use crate::error::SdkResult;
use crate::node::Node;

#[derive(Clone, Debug, Default)]
pub struct DagPutOptions {
    /// Codec the block is written with. Defaults to dag-cbor.
    pub store_codec: Option<Codec>,
    /// Codec of the bytes given to [`DagApi::put_bytes`]. Defaults to
    /// dag-json.
    pub input_codec: Option<Codec>,
    pub hash_alg: Option<HashAlg>,
    /// Defaults to CIDv1.
    pub cid_version: Option<CidVersion>,
    pub pin: bool,
    pub abort: AbortOptions,
}

impl DagPutOptions {
    pub fn with_store_codec(mut self, codec: Codec) -> Self {
        self.store_codec = Some(codec);
        self
    }

    pub fn with_input_codec(mut self, codec: Codec) -> Self {
        self.input_codec = Some(codec);
        self
    }

    pub fn with_hash_alg(mut self, alg: HashAlg) -> Self {
        self.hash_alg = Some(alg);
        self
    }

    pub fn with_cid_version(mut self, version: CidVersion) -> Self {
        self.cid_version = Some(version);
        self
    }

    pub fn pinned(mut self) -> Self {
        self.pin = true;
        self
    }

    fn put_options(&self) -> PutOptions {
        PutOptions::new(
            self.store_codec.unwrap_or(Codec::DagCbor),
            self.hash_alg.unwrap_or(HashAlg::Sha2_256),
            self.cid_version.unwrap_or(CidVersion::V1),
        )
    }
}

#[derive(Clone, Debug, Default)]
pub struct DagGetOptions {
    /// Path below the CID, `/`-separated.
    pub path: Option<String>,
    /// Stay inside the first block.
    pub local_resolve: bool,
    pub abort: AbortOptions,
}

impl DagGetOptions {
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn local(mut self) -> Self {
        self.local_resolve = true;
        self
    }
}

/// Result of [`DagApi::get`].
#[derive(Clone, Debug, PartialEq)]
pub struct DagValue {
    pub value: Ipld,
    /// The part of the path that could not be applied.
    pub remainder_path: String,
}

/// Result of [`DagApi::resolve`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DagResolution {
    #[serde(with = "dagfs_types::serde_cid")]
    pub cid: Cid,
    pub remainder_path: String,
}

/// IPLD operations of a [`Node`].
pub struct DagApi<'a> {
    node: &'a Node,
}

impl<'a> DagApi<'a> {
    pub(crate) fn new(node: &'a Node) -> Self {
        Self { node }
    }

    /// Encode `value` with the store codec and write it.
    pub async fn put(&self, value: &Ipld, opts: &DagPutOptions) -> SdkResult<Cid> {
        let put = opts.put_options();
        let bytes = from_ipld(put.codec, value)?;
        let abort = self.node.abort_or_default(&opts.abort);

        let _gc = self.node.blocks().gc_lock().writer().await;
        let cid = self.node.blocks().put(bytes, &put).await?;
        if opts.pin {
            let pin = PinAddOptions {
                abort,
                ..PinAddOptions::recursive()
            };
            self.node.pinner().add(&cid, &pin).await?;
        }
        debug!(%cid, codec = %put.codec, "dag put");
        Ok(cid)
    }

    /// Decode `bytes` with the input codec, then store the value with the
    /// store codec. A dag-json document stored as dag-cbor gets the CID of
    /// the equivalent value, whatever its key order or whitespace.
    pub async fn put_bytes(&self, bytes: &[u8], opts: &DagPutOptions) -> SdkResult<Cid> {
        let value = to_ipld(opts.input_codec.unwrap_or(Codec::DagJson), bytes)?;
        self.put(&value, opts).await
    }

    /// The value at `cid`, following `path` across links.
    pub async fn get(&self, cid: &Cid, opts: &DagGetOptions) -> SdkResult<DagValue> {
        let abort = self.node.abort_or_default(&opts.abort);
        let path = opts.path.as_deref().unwrap_or("");
        let res = resolve(self.node.blocks(), cid, path, opts.local_resolve, &abort).await?;
        Ok(DagValue {
            remainder_path: res.remainder_path(),
            value: res.value,
        })
    }

    /// The last block an `/ipfs/<cid>/...` path reaches, plus the part of
    /// the path that could not be applied.
    pub async fn resolve(&self, path: &str, abort: &AbortOptions) -> SdkResult<DagResolution> {
        let parsed = parse_ipfs_path(path)?;
        let abort = self.node.abort_or_default(abort);
        let inner = parsed.segments.join("/");
        let res = resolve(self.node.blocks(), &parsed.root, &inner, false, &abort).await?;
        Ok(DagResolution {
            remainder_path: res.remainder_path(),
            cid: res.cid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagfs_types::{codec_of, ErrorKind};
    use std::collections::BTreeMap;

    async fn node() -> Node {
        Node::in_memory().await.unwrap()
    }

    fn map(entries: Vec<(&str, Ipld)>) -> Ipld {
        Ipld::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[tokio::test]
    async fn put_and_get_through_links() {
        let node = node().await;
        let dag = node.dag();
        let leaf = dag
            .put(&map(vec![("n", Ipld::Integer(7))]), &DagPutOptions::default())
            .await
            .unwrap();
        assert_eq!(codec_of(&leaf).unwrap(), Codec::DagCbor);
        let root = dag
            .put(&map(vec![("leaf", Ipld::Link(leaf))]), &DagPutOptions::default())
            .await
            .unwrap();

        let got = dag.get(&root, &DagGetOptions::at("leaf/n")).await.unwrap();
        assert_eq!(got.value, Ipld::Integer(7));
        assert_eq!(got.remainder_path, "");

        let local = dag
            .get(&root, &DagGetOptions::at("leaf/n").local())
            .await
            .unwrap();
        assert_eq!(local.value, Ipld::Link(leaf));
        assert_eq!(local.remainder_path, "n");
    }

    #[tokio::test]
    async fn json_input_transcodes_to_cbor() {
        let node = node().await;
        let dag = node.dag();
        let a = dag
            .put_bytes(br#"{"hello": "world", "n": [1, 2]}"#, &DagPutOptions::default())
            .await
            .unwrap();
        let b = dag
            .put_bytes(br#"{ "n": [1,2], "hello": "world" }"#, &DagPutOptions::default())
            .await
            .unwrap();
        assert_eq!(a, b);

        let direct = dag
            .put(
                &map(vec![
                    ("hello", Ipld::String("world".into())),
                    ("n", Ipld::List(vec![Ipld::Integer(1), Ipld::Integer(2)])),
                ]),
                &DagPutOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(a, direct);
    }

    #[tokio::test]
    async fn store_as_json() {
        let node = node().await;
        let cid = node
            .dag()
            .put(
                &map(vec![("a", Ipld::Bool(true))]),
                &DagPutOptions::default().with_store_codec(Codec::DagJson),
            )
            .await
            .unwrap();
        assert_eq!(codec_of(&cid).unwrap(), Codec::DagJson);
        let raw = node.block().get(&cid, &AbortOptions::new()).await.unwrap();
        assert_eq!(&raw[..], br#"{"a":true}"#);
    }

    #[tokio::test]
    async fn dag_pb_value_as_v0() {
        let node = node().await;
        let value = dagfs_codec::ipld::pb_ipld(Some(vec![8, 1]), vec![]);
        let cid = node
            .dag()
            .put(
                &value,
                &DagPutOptions::default()
                    .with_store_codec(Codec::DagPb)
                    .with_cid_version(CidVersion::V0),
            )
            .await
            .unwrap();
        assert_eq!(cid.to_string(), "QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn");
    }

    #[tokio::test]
    async fn unrepresentable_value_is_rejected() {
        let node = node().await;
        let err = node
            .dag()
            .put(
                &Ipld::String("not a node".into()),
                &DagPutOptions::default().with_store_codec(Codec::DagPb),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn resolve_reports_last_block_and_remainder() {
        let node = node().await;
        let dag = node.dag();
        let leaf = dag
            .put(
                &map(vec![("title", Ipld::String("t".into()))]),
                &DagPutOptions::default(),
            )
            .await
            .unwrap();
        let root = dag
            .put(&map(vec![("leaf", Ipld::Link(leaf))]), &DagPutOptions::default())
            .await
            .unwrap();

        let res = dag
            .resolve(&format!("/ipfs/{root}/leaf"), &AbortOptions::new())
            .await
            .unwrap();
        assert_eq!(res.cid, leaf);
        assert_eq!(res.remainder_path, "");

        let res = dag
            .resolve(&format!("/ipfs/{root}/leaf/title/extra"), &AbortOptions::new())
            .await
            .unwrap();
        assert_eq!(res.cid, leaf);
        assert_eq!(res.remainder_path, "extra");
    }

    #[tokio::test]
    async fn pinned_put_is_recursive() {
        let node = node().await;
        let cid = node
            .dag()
            .put(&Ipld::Integer(1), &DagPutOptions::default().pinned())
            .await
            .unwrap();
        assert_eq!(node.pinner().recursive_roots().len(), 1);
        assert!(node
            .pinner()
            .is_pinned(&cid, &AbortOptions::new())
            .await
            .unwrap()
            .is_some());
    }
}
