//! Serde helpers that write CIDs in their string form.
//!
//! Use with `#[serde(with = "dagfs_types::serde_cid")]` on a `Cid` field,
//! or `serde_cid::vec` on a `Vec<Cid>`.

use serde::{de, Deserialize, Deserializer, Serializer};

use crate::ident::{parse_cid, Cid};

pub fn serialize<S: Serializer>(cid: &Cid, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(cid)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cid, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_cid(&text).map_err(de::Error::custom)
}

pub mod vec {
    use serde::ser::SerializeSeq;

    use super::*;

    pub fn serialize<S: Serializer>(cids: &[Cid], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(cids.len()))?;
        for cid in cids {
            seq.serialize_element(&cid.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Cid>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| parse_cid(s).map_err(de::Error::custom))
            .collect()
    }
}
