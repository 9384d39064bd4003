//! HAMT shard layout.
//!
//! A shard has 256 slots. An entry lands in the slot given by one byte of
//! its name's hash: byte `d` at depth `d`, where bytes 0-7 come from
//! murmur3-x64-64 with seed 0, bytes 8-15 from seed 1, and so on. The
//! stream never runs out, so any two distinct names separate eventually.
//!
//! Slot `i` is written as two upper-case hex digits. A link named exactly
//! `XX` points at a sub-shard; a link named `XX<name>` is the entry
//! `<name>`. Occupied slots are recorded in a 32-byte big-endian
//! bitfield, slot `i` at bit `i % 8` of byte `31 - i / 8`.

use std::collections::BTreeMap;

use dagfs_codec::{pb, DataType, PbLink, UnixFsData, HAMT_HASH_TYPE};
use dagfs_crypto::murmur3_x64_64;
use dagfs_types::Cid;

use crate::directory::DirLink;
use crate::error::{UnixFsError, UnixFsResult};
use crate::node::LoadedNode;

pub const HAMT_FANOUT: u64 = 256;

const BITFIELD_LEN: usize = 32;

/// Depth at which two names are considered hopelessly colliding.
pub(crate) const MAX_DEPTH: usize = 64;

/// Slot of `name` at `depth`.
pub fn slot_index(name: &str, depth: usize) -> u8 {
    let seed = (depth / 8) as u32;
    murmur3_x64_64(name.as_bytes(), seed)[depth % 8]
}

pub fn slot_prefix(slot: u8) -> String {
    format!("{slot:02X}")
}

/// Occupancy bitfield for a set of slots.
pub fn bitfield(slots: impl IntoIterator<Item = u8>) -> Vec<u8> {
    let mut bits = vec![0u8; BITFIELD_LEN];
    for slot in slots {
        let i = slot as usize;
        bits[BITFIELD_LEN - 1 - i / 8] |= 1 << (i % 8);
    }
    bits
}

/// Slots marked in a bitfield, ascending.
pub fn bitfield_slots(bits: &[u8]) -> Vec<u8> {
    let len = bits.len();
    (0..=u8::MAX)
        .filter(|&slot| {
            let i = slot as usize;
            i / 8 < len && bits[len - 1 - i / 8] & (1 << (i % 8)) != 0
        })
        .collect()
}

/// What occupies a slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    Entry(DirLink),
    Shard { cid: Cid, tsize: u64 },
}

/// One shard node held in memory while it is being rewritten.
#[derive(Clone, Debug)]
pub struct ShardNode {
    pub slots: BTreeMap<u8, Slot>,
    /// Shard header. Mode and mtime live here on the root shard.
    pub data: UnixFsData,
}

impl ShardNode {
    /// An empty sub-shard.
    pub fn new() -> Self {
        Self::with_header(UnixFsData::hamt_shard(Vec::new(), HAMT_FANOUT))
    }

    /// An empty shard carrying another directory's mode and mtime.
    pub fn inheriting(dir: &UnixFsData) -> Self {
        Self::with_header(
            UnixFsData::hamt_shard(Vec::new(), HAMT_FANOUT)
                .with_mode(dir.explicit_mode())
                .with_mtime(dir.mtime),
        )
    }

    fn with_header(data: UnixFsData) -> Self {
        Self {
            slots: BTreeMap::new(),
            data,
        }
    }

    pub fn from_node(node: &LoadedNode) -> UnixFsResult<Self> {
        let cid = node.cid;
        let unsupported = |reason: String| UnixFsError::Unsupported { cid, reason };
        let data = node
            .data()
            .filter(|d| d.data_type == DataType::HamtShard)
            .ok_or_else(|| unsupported("not a HAMT shard".into()))?;
        if data.fanout != Some(HAMT_FANOUT) {
            return Err(unsupported(format!("fanout {:?}", data.fanout)));
        }
        if data.hash_type != Some(HAMT_HASH_TYPE) {
            return Err(unsupported(format!("hash type {:?}", data.hash_type)));
        }

        let mut slots = BTreeMap::new();
        for link in node.links() {
            let (slot, parsed) = parse_link(&cid, link)?;
            if slots.insert(slot, parsed).is_some() {
                return Err(UnixFsError::Corrupt {
                    cid,
                    reason: format!("slot {} used twice", slot_prefix(slot)),
                });
            }
        }
        Ok(Self {
            slots,
            data: data.clone(),
        })
    }

    /// Header with an up-to-date bitfield, plus the links.
    pub fn to_parts(&self) -> (UnixFsData, Vec<PbLink>) {
        let mut data = self.data.clone();
        data.data = Some(bitfield(self.slots.keys().copied()));
        let links = self
            .slots
            .iter()
            .map(|(&slot, entry)| match entry {
                Slot::Entry(link) => pb::link(
                    link.cid,
                    format!("{}{}", slot_prefix(slot), link.name),
                    link.tsize,
                ),
                Slot::Shard { cid, tsize } => pb::link(*cid, slot_prefix(slot), *tsize),
            })
            .collect();
        (data, links)
    }
}

impl Default for ShardNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a shard link into its slot and what it points at.
pub(crate) fn parse_link(shard: &Cid, link: &PbLink) -> UnixFsResult<(u8, Slot)> {
    let name = pb::link_name(link);
    let slot = name
        .get(..2)
        .filter(|p| p.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)))
        .and_then(|p| u8::from_str_radix(p, 16).ok())
        .ok_or_else(|| UnixFsError::Corrupt {
            cid: *shard,
            reason: format!("bad shard link name {name:?}"),
        })?;
    let tsize = link.size.unwrap_or(0);
    let entry = if name.len() == 2 {
        Slot::Shard {
            cid: link.cid,
            tsize,
        }
    } else {
        Slot::Entry(DirLink::new(&name[2..], link.cid, tsize))
    };
    Ok((slot, entry))
}
