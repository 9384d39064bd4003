use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

pub use ::cid::Cid;

/// Multihash with room for the largest digest dagfs produces (sha2-512).
pub type Multihash = ::cid::multihash::Multihash<64>;

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Block encodings understood by dagfs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Codec {
    /// Opaque bytes; no links.
    Raw,
    /// Protobuf linked node used by UnixFS files and directories.
    DagPb,
    /// Canonical CBOR for arbitrary linked data.
    DagCbor,
    /// Canonical JSON for arbitrary linked data.
    DagJson,
}

impl Codec {
    /// Multicodec table code.
    pub const fn code(self) -> u64 {
        match self {
            Self::Raw => 0x55,
            Self::DagPb => 0x70,
            Self::DagCbor => 0x71,
            Self::DagJson => 0x0129,
        }
    }

    /// Look up a codec by its multicodec code.
    pub fn from_code(code: u64) -> Result<Self, TypeError> {
        match code {
            0x55 => Ok(Self::Raw),
            0x70 => Ok(Self::DagPb),
            0x71 => Ok(Self::DagCbor),
            0x0129 => Ok(Self::DagJson),
            other => Err(TypeError::UnsupportedCodec(other)),
        }
    }

    /// Multicodec table name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::DagPb => "dag-pb",
            Self::DagCbor => "dag-cbor",
            Self::DagJson => "dag-json",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "dag-pb" | "protobuf" => Ok(Self::DagPb),
            "dag-cbor" | "cbor" => Ok(Self::DagCbor),
            "dag-json" | "json" => Ok(Self::DagJson),
            other => Err(TypeError::UnknownCodecName(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// HashAlg
// ---------------------------------------------------------------------------

/// Multihash functions dagfs can compute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlg {
    /// The digest is the content itself.
    #[serde(rename = "identity")]
    Identity,
    #[serde(rename = "sha2-256")]
    Sha2_256,
    #[serde(rename = "sha2-512")]
    Sha2_512,
    #[serde(rename = "blake3")]
    Blake3,
}

impl HashAlg {
    /// Multihash table code.
    pub const fn code(self) -> u64 {
        match self {
            Self::Identity => 0x00,
            Self::Sha2_256 => 0x12,
            Self::Sha2_512 => 0x13,
            Self::Blake3 => 0x1e,
        }
    }

    /// Look up a hash function by its multihash code.
    pub fn from_code(code: u64) -> Result<Self, TypeError> {
        match code {
            0x00 => Ok(Self::Identity),
            0x12 => Ok(Self::Sha2_256),
            0x13 => Ok(Self::Sha2_512),
            0x1e => Ok(Self::Blake3),
            other => Err(TypeError::UnsupportedHash(other)),
        }
    }

    /// Multihash table name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Sha2_256 => "sha2-256",
            Self::Sha2_512 => "sha2-512",
            Self::Blake3 => "blake3",
        }
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlg {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(Self::Identity),
            "sha2-256" | "sha256" => Ok(Self::Sha2_256),
            "sha2-512" | "sha512" => Ok(Self::Sha2_512),
            "blake3" => Ok(Self::Blake3),
            other => Err(TypeError::UnknownHashName(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// CidVersion
// ---------------------------------------------------------------------------

/// CID version. Serialized as the bare integer `0` or `1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CidVersion {
    #[default]
    V0,
    V1,
}

impl TryFrom<u8> for CidVersion {
    type Error = TypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::V0),
            1 => Ok(Self::V1),
            other => Err(TypeError::InvalidCidVersion(other)),
        }
    }
}

impl From<CidVersion> for u8 {
    fn from(version: CidVersion) -> Self {
        match version {
            CidVersion::V0 => 0,
            CidVersion::V1 => 1,
        }
    }
}

impl fmt::Display for CidVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

// ---------------------------------------------------------------------------
// CID helpers
// ---------------------------------------------------------------------------

/// Parse a CID from its string form (base58btc v0 or multibase v1).
pub fn parse_cid(s: &str) -> Result<Cid, TypeError> {
    Cid::try_from(s.trim()).map_err(|e| TypeError::InvalidCid(format!("{s}: {e}")))
}

/// The version of a CID.
pub fn cid_version(cid: &Cid) -> CidVersion {
    match cid.version() {
        ::cid::Version::V0 => CidVersion::V0,
        ::cid::Version::V1 => CidVersion::V1,
    }
}

/// The codec a CID names, if dagfs supports it.
pub fn codec_of(cid: &Cid) -> Result<Codec, TypeError> {
    Codec::from_code(cid.codec())
}

/// The hash function a CID was computed with, if dagfs supports it.
pub fn hash_alg_of(cid: &Cid) -> Result<HashAlg, TypeError> {
    HashAlg::from_code(cid.hash().code())
}

/// Convert any CID to its v1 form. Always succeeds.
pub fn to_v1(cid: &Cid) -> Cid {
    Cid::new_v1(cid.codec(), *cid.hash())
}

/// Convert a CID to its v0 form.
///
/// Only dag-pb blocks hashed with sha2-256 have a v0 form.
pub fn to_v0(cid: &Cid) -> Result<Cid, TypeError> {
    if cid.codec() != Codec::DagPb.code() || cid.hash().code() != HashAlg::Sha2_256.code() {
        return Err(TypeError::IncompatibleV0 {
            codec: codec_name(cid.codec()),
            hash: hash_name(cid.hash().code()),
        });
    }
    Cid::new_v0(*cid.hash()).map_err(|e| TypeError::InvalidCid(e.to_string()))
}

/// Storage key for a block: the binary CIDv1.
///
/// v0 and v1 CIDs of the same block share a key.
pub fn block_key(cid: &Cid) -> Vec<u8> {
    to_v1(cid).to_bytes()
}

/// Returns `true` if both CIDs address the same block.
pub fn cid_equivalent(a: &Cid, b: &Cid) -> bool {
    a.codec() == b.codec() && a.hash() == b.hash()
}

fn codec_name(code: u64) -> String {
    Codec::from_code(code)
        .map(|c| c.name().to_string())
        .unwrap_or_else(|_| format!("0x{code:x}"))
}

fn hash_name(code: u64) -> String {
    HashAlg::from_code(code)
        .map(|h| h.name().to_string())
        .unwrap_or_else(|_| format!("0x{code:x}"))
}
