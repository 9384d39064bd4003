//! dag-pb nodes.
//!
//! Wire handling comes from `ipld-dagpb`. This module adds the canonical
//! link order and the constructors dagfs uses.

use bytes::Bytes;
use dagfs_types::Cid;

use crate::error::{CodecError, CodecResult};

pub use ipld_dagpb::{PbLink, PbNode};

/// Build a named link.
pub fn link(cid: Cid, name: impl Into<String>, tsize: u64) -> PbLink {
    PbLink {
        cid,
        name: Some(name.into()),
        size: Some(tsize),
    }
}

/// Build a node from its parts.
pub fn node(data: Option<Vec<u8>>, links: Vec<PbLink>) -> PbNode {
    PbNode {
        links,
        data: data.map(Bytes::from),
    }
}

/// Sort links by name bytes. Stable, so unnamed and equally named links
/// keep their relative order.
pub fn sort_links(links: &mut [PbLink]) {
    links.sort_by(|a, b| name_bytes(a).cmp(name_bytes(b)));
}

/// Canonical encoding: links sorted by name, then links before data.
pub fn encode(mut node: PbNode) -> Vec<u8> {
    sort_links(&mut node.links);
    node.into_bytes()
}

pub fn decode(bytes: &[u8]) -> CodecResult<PbNode> {
    PbNode::from_bytes(Bytes::copy_from_slice(bytes)).map_err(|e| CodecError::DagPb(e.to_string()))
}

/// Link name, empty when absent.
pub fn link_name(link: &PbLink) -> &str {
    link.name.as_deref().unwrap_or("")
}

fn name_bytes(link: &PbLink) -> &[u8] {
    link_name(link).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagfs_crypto::cid_for;
    use dagfs_types::{CidVersion, Codec, HashAlg};

    fn some_cid(seed: &[u8]) -> Cid {
        cid_for(seed, Codec::Raw, HashAlg::Sha2_256, CidVersion::V1).unwrap()
    }

    #[test]
    fn empty_directory_bytes() {
        let bytes = encode(node(Some(vec![0x08, 0x01]), vec![]));
        assert_eq!(bytes, vec![0x0a, 0x02, 0x08, 0x01]);
    }

    #[test]
    fn links_are_sorted_on_encode() {
        let a = link(some_cid(b"a"), "alpha", 1);
        let b = link(some_cid(b"b"), "beta", 2);
        let forward = encode(node(None, vec![a.clone(), b.clone()]));
        let backward = encode(node(None, vec![b, a]));
        assert_eq!(forward, backward);

        let decoded = decode(&forward).unwrap();
        let names: Vec<&str> = decoded.links.iter().map(link_name).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn decode_preserves_fields() {
        let cid = some_cid(b"child");
        let bytes = encode(node(Some(b"payload".to_vec()), vec![link(cid, "kid", 42)]));
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.data.as_deref(), Some(&b"payload"[..]));
        assert_eq!(decoded.links[0].cid, cid);
        assert_eq!(decoded.links[0].size, Some(42));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode(&[0xff, 0xff, 0xff]).is_err());
    }
}
