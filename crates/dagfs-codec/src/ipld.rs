//! Codec-independent view of blocks.

use std::collections::BTreeMap;

use bytes::Bytes;
use dagfs_types::{Cid, Codec};
use ipld_core::ipld::Ipld;

use crate::error::{CodecError, CodecResult};
use crate::pb::{self, PbLink, PbNode};
use crate::structured;

/// Every CID a block references, in encoding order.
pub fn links(codec: Codec, bytes: &[u8]) -> CodecResult<Vec<Cid>> {
    match codec {
        Codec::Raw => Ok(Vec::new()),
        Codec::DagPb => Ok(pb::decode(bytes)?.links.into_iter().map(|l| l.cid).collect()),
        Codec::DagCbor | Codec::DagJson => {
            let mut out = Vec::new();
            collect_links(&to_ipld(codec, bytes)?, &mut out);
            Ok(out)
        }
    }
}

fn collect_links(value: &Ipld, out: &mut Vec<Cid>) {
    match value {
        Ipld::Link(cid) => out.push(*cid),
        Ipld::List(items) => items.iter().for_each(|v| collect_links(v, out)),
        Ipld::Map(map) => map.values().for_each(|v| collect_links(v, out)),
        _ => {}
    }
}

/// Decode any block into the IPLD data model.
///
/// dag-pb becomes `{Data, Links: [{Hash, Name, Tsize}]}`; raw becomes
/// bytes.
pub fn to_ipld(codec: Codec, bytes: &[u8]) -> CodecResult<Ipld> {
    match codec {
        Codec::Raw => Ok(Ipld::Bytes(bytes.to_vec())),
        Codec::DagPb => Ok(Ipld::from(pb::decode(bytes)?)),
        Codec::DagCbor => structured::decode_cbor(bytes),
        Codec::DagJson => structured::decode_json(bytes),
    }
}

/// Encode an IPLD value with the given codec.
pub fn from_ipld(codec: Codec, value: &Ipld) -> CodecResult<Vec<u8>> {
    match codec {
        Codec::Raw => match value {
            Ipld::Bytes(b) => Ok(b.clone()),
            _ => Err(CodecError::Unrepresentable {
                codec: codec.name().into(),
                reason: "only bytes can be stored raw".into(),
            }),
        },
        Codec::DagPb => Ok(pb::encode(pb_from_ipld(value)?)),
        Codec::DagCbor => structured::encode_cbor(value),
        Codec::DagJson => structured::encode_json(value),
    }
}

fn pb_from_ipld(value: &Ipld) -> CodecResult<PbNode> {
    let bad = |reason: &str| CodecError::Unrepresentable {
        codec: "dag-pb".into(),
        reason: reason.into(),
    };
    let Ipld::Map(map) = value else {
        return Err(bad("node must be a map"));
    };
    if map.keys().any(|k| k != "Data" && k != "Links") {
        return Err(bad("only Data and Links are allowed"));
    }
    let data = match map.get("Data") {
        None | Some(Ipld::Null) => None,
        Some(Ipld::Bytes(b)) => Some(Bytes::from(b.clone())),
        Some(_) => return Err(bad("Data must be bytes")),
    };
    let links = match map.get("Links") {
        None => Vec::new(),
        Some(Ipld::List(items)) => items
            .iter()
            .map(|item| pb_link_from_ipld(item).ok_or_else(|| bad("malformed link")))
            .collect::<CodecResult<_>>()?,
        Some(_) => return Err(bad("Links must be a list")),
    };
    Ok(PbNode { links, data })
}

fn pb_link_from_ipld(item: &Ipld) -> Option<PbLink> {
    let Ipld::Map(link) = item else {
        return None;
    };
    let cid = match link.get("Hash")? {
        Ipld::Link(cid) => *cid,
        _ => return None,
    };
    let name = match link.get("Name") {
        None => None,
        Some(Ipld::String(s)) => Some(s.clone()),
        Some(_) => return None,
    };
    let size = match link.get("Tsize") {
        None => None,
        Some(Ipld::Integer(i)) => Some(u64::try_from(*i).ok()?),
        Some(_) => return None,
    };
    Some(PbLink { cid, name, size })
}

/// Build a dag-pb shaped IPLD map. Used by object templates and tests.
pub fn pb_ipld(data: Option<Vec<u8>>, links: Vec<(Cid, String, u64)>) -> Ipld {
    let mut map = BTreeMap::new();
    if let Some(data) = data {
        map.insert("Data".to_string(), Ipld::Bytes(data));
    }
    let links = links
        .into_iter()
        .map(|(cid, name, size)| {
            let mut link = BTreeMap::new();
            link.insert("Hash".to_string(), Ipld::Link(cid));
            link.insert("Name".to_string(), Ipld::String(name));
            link.insert("Tsize".to_string(), Ipld::Integer(size.into()));
            Ipld::Map(link)
        })
        .collect();
    map.insert("Links".to_string(), Ipld::List(links));
    Ipld::Map(map)
}
