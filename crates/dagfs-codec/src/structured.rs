//! dag-cbor and dag-json over the IPLD data model.
//!
//! dag-cbor goes through `serde_ipld_dagcbor`, which emits canonical CBOR
//! (length-first key order, tag 42 links). dag-json is mapped by hand onto
//! `serde_json` values: links become `{"/": "<cid>"}` and bytes become
//! `{"/": {"bytes": "<base64>"}}`. Keys come out sorted because
//! `serde_json::Map` is ordered.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use dagfs_types::parse_cid;
use ipld_core::ipld::Ipld;
use serde_json::{Map, Number, Value};

use crate::error::{CodecError, CodecResult};

pub fn encode_cbor(value: &Ipld) -> CodecResult<Vec<u8>> {
    serde_ipld_dagcbor::to_vec(value).map_err(|e| CodecError::Cbor(e.to_string()))
}

pub fn decode_cbor(bytes: &[u8]) -> CodecResult<Ipld> {
    serde_ipld_dagcbor::from_slice(bytes).map_err(|e| CodecError::Cbor(e.to_string()))
}

pub fn encode_json(value: &Ipld) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(&to_json(value)?).map_err(|e| CodecError::Json(e.to_string()))
}

pub fn decode_json(bytes: &[u8]) -> CodecResult<Ipld> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| CodecError::Json(e.to_string()))?;
    from_json(value)
}

fn to_json(value: &Ipld) -> CodecResult<Value> {
    Ok(match value {
        Ipld::Null => Value::Null,
        Ipld::Bool(b) => Value::Bool(*b),
        Ipld::Integer(i) => {
            if let Ok(v) = i64::try_from(*i) {
                Value::Number(v.into())
            } else if let Ok(v) = u64::try_from(*i) {
                Value::Number(v.into())
            } else {
                return Err(unrepresentable(format!("integer {i} out of range")));
            }
        }
        Ipld::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| unrepresentable(format!("non-finite float {f}")))?,
        Ipld::String(s) => Value::String(s.clone()),
        Ipld::Bytes(b) => {
            let mut inner = Map::new();
            inner.insert("bytes".into(), Value::String(STANDARD_NO_PAD.encode(b)));
            slash(Value::Object(inner))
        }
        Ipld::List(items) => Value::Array(items.iter().map(to_json).collect::<CodecResult<_>>()?),
        Ipld::Map(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), to_json(v)?);
            }
            Value::Object(out)
        }
        Ipld::Link(cid) => slash(Value::String(cid.to_string())),
    })
}

fn from_json(value: Value) -> CodecResult<Ipld> {
    Ok(match value {
        Value::Null => Ipld::Null,
        Value::Bool(b) => Ipld::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ipld::Integer(i.into())
            } else if let Some(u) = n.as_u64() {
                Ipld::Integer(u.into())
            } else {
                Ipld::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Ipld::String(s),
        Value::Array(items) => {
            Ipld::List(items.into_iter().map(from_json).collect::<CodecResult<_>>()?)
        }
        Value::Object(mut map) => {
            if map.len() == 1 {
                if let Some(special) = map.remove("/") {
                    return from_slash(special);
                }
            }
            let mut out = BTreeMap::new();
            for (k, v) in map {
                out.insert(k, from_json(v)?);
            }
            Ipld::Map(out)
        }
    })
}

/// Decode the value under a lone `"/"` key.
fn from_slash(special: Value) -> CodecResult<Ipld> {
    match special {
        Value::String(s) => Ok(Ipld::Link(parse_cid(&s)?)),
        Value::Object(mut inner) if inner.len() == 1 => match inner.remove("bytes") {
            Some(Value::String(b64)) => STANDARD_NO_PAD
                .decode(b64.trim_end_matches('='))
                .map(Ipld::Bytes)
                .map_err(|e| CodecError::Json(format!("bad bytes: {e}"))),
            _ => Err(CodecError::Json("malformed bytes object".into())),
        },
        other => Err(CodecError::Json(format!("reserved key \"/\" holds {other}"))),
    }
}

fn slash(inner: Value) -> Value {
    let mut map = Map::new();
    map.insert("/".into(), inner);
    Value::Object(map)
}

fn unrepresentable(reason: String) -> CodecError {
    CodecError::Unrepresentable {
        codec: "dag-json".into(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagfs_crypto::cid_for;
    use dagfs_types::{CidVersion, Codec, HashAlg};
    use proptest::prelude::*;

    fn sample() -> Ipld {
        let cid = cid_for(b"leaf", Codec::Raw, HashAlg::Sha2_256, CidVersion::V1).unwrap();
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), Ipld::String("blorb".into()));
        map.insert("count".to_string(), Ipld::Integer(-7));
        map.insert("ratio".to_string(), Ipld::Float(0.5));
        map.insert("raw".to_string(), Ipld::Bytes(vec![0, 1, 2, 255]));
        map.insert("link".to_string(), Ipld::Link(cid));
        map.insert(
            "list".to_string(),
            Ipld::List(vec![Ipld::Null, Ipld::Bool(true)]),
        );
        Ipld::Map(map)
    }

    #[test]
    fn cbor_roundtrip() {
        let value = sample();
        let bytes = encode_cbor(&value).unwrap();
        assert_eq!(decode_cbor(&bytes).unwrap(), value);
    }

    #[test]
    fn json_roundtrip() {
        let value = sample();
        let bytes = encode_json(&value).unwrap();
        assert_eq!(decode_json(&bytes).unwrap(), value);
    }

    #[test]
    fn json_link_and_bytes_forms() {
        let cid = cid_for(b"x", Codec::Raw, HashAlg::Sha2_256, CidVersion::V1).unwrap();
        let text = String::from_utf8(encode_json(&Ipld::Link(cid)).unwrap()).unwrap();
        assert_eq!(text, format!("{{\"/\":\"{cid}\"}}"));
        let text = String::from_utf8(encode_json(&Ipld::Bytes(b"hi".to_vec())).unwrap()).unwrap();
        assert_eq!(text, "{\"/\":{\"bytes\":\"aGk\"}}");
    }

    #[test]
    fn json_keys_are_sorted() {
        let value = decode_json(br#"{"b": 1, "a": 2}"#).unwrap();
        assert_eq!(encode_json(&value).unwrap(), br#"{"a":2,"b":1}"#.to_vec());
    }

    #[test]
    fn json_to_cbor_transcoding_is_stable() {
        let a = decode_json(br#"{"hello": "world", "n": [1, 2, 3]}"#).unwrap();
        let b = decode_json(br#"{ "n": [1,2,3], "hello": "world" }"#).unwrap();
        assert_eq!(encode_cbor(&a).unwrap(), encode_cbor(&b).unwrap());
        let back = decode_cbor(&encode_cbor(&a).unwrap()).unwrap();
        assert_eq!(encode_json(&back).unwrap(), encode_json(&a).unwrap());
    }

    #[test]
    fn padded_base64_is_accepted() {
        let value = decode_json(br#"{"/": {"bytes": "aGk="}}"#).unwrap();
        assert_eq!(value, Ipld::Bytes(b"hi".to_vec()));
    }

    #[test]
    fn bad_link_is_rejected() {
        assert!(decode_json(br#"{"/": "not-a-cid"}"#).is_err());
    }

    #[test]
    fn non_finite_float_has_no_json_form() {
        assert!(encode_json(&Ipld::Float(f64::INFINITY)).is_err());
    }

    fn leaf() -> impl Strategy<Value = Ipld> {
        prop_oneof![
            Just(Ipld::Null),
            any::<bool>().prop_map(Ipld::Bool),
            any::<i64>().prop_map(|i| Ipld::Integer(i.into())),
            "[a-z]{0,8}".prop_map(Ipld::String),
            proptest::collection::vec(any::<u8>(), 0..16).prop_map(Ipld::Bytes),
        ]
    }

    fn tree() -> impl Strategy<Value = Ipld> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Ipld::List),
                proptest::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Ipld::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn transcoding_preserves_value(value in tree()) {
            let via_json = decode_json(&encode_json(&value).unwrap()).unwrap();
            let via_cbor = decode_cbor(&encode_cbor(&value).unwrap()).unwrap();
            prop_assert_eq!(&via_json, &value);
            prop_assert_eq!(&via_cbor, &value);
        }
    }
}
