//! The UnixFS `Data` message carried in a dag-pb node's `Data` field.
//!
//! ```text
//! message Data {
//!   required DataType Type = 1;
//!   optional bytes Data = 2;
//!   optional uint64 filesize = 3;
//!   repeated uint64 blocksizes = 4;
//!   optional uint64 hashType = 5;
//!   optional uint64 fanout = 6;
//!   optional uint32 mode = 7;
//!   optional UnixTime mtime = 8;
//! }
//! message UnixTime {
//!   required int64 Seconds = 1;
//!   optional fixed32 FractionalNanoseconds = 2;
//! }
//! ```

use dagfs_types::{Mtime, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
use quick_protobuf::sizeofs::{sizeof_len, sizeof_varint};
use quick_protobuf::{BytesReader, MessageRead, MessageWrite, Writer, WriterBackend};

use crate::error::{CodecError, CodecResult};

/// Multihash code of murmur3-x64-64, the HAMT name hash.
pub const HAMT_HASH_TYPE: u64 = 0x22;

const PERMISSION_MASK: u32 = 0o7777;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DataType {
    #[default]
    Raw,
    Directory,
    File,
    Metadata,
    Symlink,
    HamtShard,
}

impl DataType {
    fn code(self) -> i32 {
        match self {
            Self::Raw => 0,
            Self::Directory => 1,
            Self::File => 2,
            Self::Metadata => 3,
            Self::Symlink => 4,
            Self::HamtShard => 5,
        }
    }
}

impl TryFrom<i32> for DataType {
    type Error = CodecError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Directory),
            2 => Ok(Self::File),
            3 => Ok(Self::Metadata),
            4 => Ok(Self::Symlink),
            5 => Ok(Self::HamtShard),
            other => Err(CodecError::UnixFs(format!("unknown data type {other}"))),
        }
    }
}

/// Decoded UnixFS `Data` message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnixFsData {
    pub data_type: DataType,
    pub data: Option<Vec<u8>>,
    pub filesize: Option<u64>,
    pub blocksizes: Vec<u64>,
    pub hash_type: Option<u64>,
    pub fanout: Option<u64>,
    mode: Option<u32>,
    pub mtime: Option<Mtime>,
}

impl UnixFsData {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            ..Self::default()
        }
    }

    pub fn directory() -> Self {
        Self::new(DataType::Directory)
    }

    /// A file node with no inline content yet.
    pub fn file() -> Self {
        Self {
            filesize: Some(0),
            ..Self::new(DataType::File)
        }
    }

    /// A HAMT shard node with the given occupancy bitfield.
    pub fn hamt_shard(bitfield: Vec<u8>, fanout: u64) -> Self {
        Self {
            data: Some(bitfield),
            hash_type: Some(HAMT_HASH_TYPE),
            fanout: Some(fanout),
            ..Self::new(DataType::HamtShard)
        }
    }

    pub fn symlink(target: &str) -> Self {
        Self {
            data: Some(target.as_bytes().to_vec()),
            ..Self::new(DataType::Symlink)
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.data_type, DataType::Directory | DataType::HamtShard)
    }

    /// Permission bits that apply when none are stored.
    pub fn default_mode(&self) -> u32 {
        if self.is_directory() {
            DEFAULT_DIR_MODE
        } else {
            DEFAULT_FILE_MODE
        }
    }

    /// Effective permission bits.
    pub fn mode(&self) -> u32 {
        self.mode.unwrap_or_else(|| self.default_mode())
    }

    /// The stored mode, if any.
    pub fn explicit_mode(&self) -> Option<u32> {
        self.mode
    }

    /// Set permission bits. A mode equal to the type default is not stored.
    pub fn set_mode(&mut self, mode: Option<u32>) {
        let default = self.default_mode();
        self.mode = mode
            .map(|m| m & PERMISSION_MASK)
            .filter(|m| *m != default);
    }

    pub fn with_mode(mut self, mode: Option<u32>) -> Self {
        self.set_mode(mode);
        self
    }

    pub fn with_mtime(mut self, mtime: Option<Mtime>) -> Self {
        self.mtime = mtime;
        self
    }

    /// Logical size of the file content described by this node.
    pub fn file_size(&self) -> u64 {
        match self.data_type {
            DataType::File | DataType::Raw => self
                .filesize
                .unwrap_or_else(|| self.data.as_ref().map_or(0, |d| d.len() as u64)),
            DataType::Symlink => self.data.as_ref().map_or(0, |d| d.len() as u64),
            _ => 0,
        }
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.get_size());
        let mut writer = Writer::new(&mut buf);
        self.write_message(&mut writer).map_err(pb_err)?;
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = BytesReader::from_bytes(bytes);
        let mut out = Self::default();
        let mut data_type = None;
        while !r.is_eof() {
            match r.next_tag(bytes).map_err(pb_err)? {
                8 => data_type = Some(r.read_int32(bytes).map_err(pb_err)?),
                18 => out.data = Some(r.read_bytes(bytes).map_err(pb_err)?.to_vec()),
                24 => out.filesize = Some(r.read_uint64(bytes).map_err(pb_err)?),
                32 => out.blocksizes.push(r.read_uint64(bytes).map_err(pb_err)?),
                34 => {
                    let packed = r
                        .read_packed(bytes, |r, bytes| r.read_uint64(bytes))
                        .map_err(pb_err)?;
                    out.blocksizes.extend(packed);
                }
                40 => out.hash_type = Some(r.read_uint64(bytes).map_err(pb_err)?),
                48 => out.fanout = Some(r.read_uint64(bytes).map_err(pb_err)?),
                56 => out.mode = Some(r.read_uint32(bytes).map_err(pb_err)?),
                66 => {
                    let time: UnixTime = r.read_message(bytes).map_err(pb_err)?;
                    out.mtime = Some(time.into());
                }
                tag => r.read_unknown(bytes, tag).map_err(pb_err)?,
            }
        }
        let code = data_type.ok_or_else(|| CodecError::UnixFs("missing Type".into()))?;
        out.data_type = DataType::try_from(code)?;
        Ok(out)
    }
}

impl MessageWrite for UnixFsData {
    fn get_size(&self) -> usize {
        1 + sizeof_varint(self.data_type.code() as u64)
            + self.data.as_ref().map_or(0, |d| 1 + sizeof_len(d.len()))
            + self.filesize.map_or(0, |v| 1 + sizeof_varint(v))
            + self
                .blocksizes
                .iter()
                .map(|v| 1 + sizeof_varint(*v))
                .sum::<usize>()
            + self.hash_type.map_or(0, |v| 1 + sizeof_varint(v))
            + self.fanout.map_or(0, |v| 1 + sizeof_varint(v))
            + self.mode.map_or(0, |v| 1 + sizeof_varint(u64::from(v)))
            + self
                .mtime
                .map_or(0, |t| 1 + sizeof_len(UnixTime::from(t).get_size()))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> quick_protobuf::Result<()> {
        w.write_with_tag(8, |w| w.write_enum(self.data_type.code()))?;
        if let Some(data) = &self.data {
            w.write_with_tag(18, |w| w.write_bytes(data))?;
        }
        if let Some(v) = self.filesize {
            w.write_with_tag(24, |w| w.write_uint64(v))?;
        }
        for v in &self.blocksizes {
            w.write_with_tag(32, |w| w.write_uint64(*v))?;
        }
        if let Some(v) = self.hash_type {
            w.write_with_tag(40, |w| w.write_uint64(v))?;
        }
        if let Some(v) = self.fanout {
            w.write_with_tag(48, |w| w.write_uint64(v))?;
        }
        if let Some(v) = self.mode {
            w.write_with_tag(56, |w| w.write_uint32(v))?;
        }
        if let Some(t) = self.mtime {
            w.write_with_tag(66, |w| w.write_message(&UnixTime::from(t)))?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct UnixTime {
    seconds: i64,
    fractional_nanoseconds: Option<u32>,
}

impl From<Mtime> for UnixTime {
    fn from(t: Mtime) -> Self {
        Self {
            seconds: t.secs,
            fractional_nanoseconds: (t.nsecs != 0).then_some(t.nsecs),
        }
    }
}

impl From<UnixTime> for Mtime {
    fn from(t: UnixTime) -> Self {
        Mtime::new(t.seconds, t.fractional_nanoseconds.unwrap_or(0))
    }
}

impl<'a> MessageRead<'a> for UnixTime {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> quick_protobuf::Result<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(8) => msg.seconds = r.read_int64(bytes)?,
                Ok(21) => msg.fractional_nanoseconds = Some(r.read_fixed32(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for UnixTime {
    fn get_size(&self) -> usize {
        1 + sizeof_varint(self.seconds as u64) + self.fractional_nanoseconds.map_or(0, |_| 1 + 4)
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> quick_protobuf::Result<()> {
        w.write_with_tag(8, |w| w.write_int64(self.seconds))?;
        if let Some(nanos) = self.fractional_nanoseconds {
            w.write_with_tag(21, |w| w.write_fixed32(nanos))?;
        }
        Ok(())
    }
}

fn pb_err(e: quick_protobuf::Error) -> CodecError {
    CodecError::UnixFs(e.to_string())
}
