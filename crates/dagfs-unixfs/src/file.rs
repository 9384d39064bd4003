//! File builder.
//!
//! Content is cut into fixed-size chunks. Each chunk becomes a leaf (a
//! raw block, or a UnixFS file node holding the bytes) and leaves are
//! gathered into a balanced tree of file nodes with at most
//! `max_children` links each. A file that fits one chunk is just its leaf,
//! unless it carries metadata: then it becomes a single file node with the
//! bytes inline, since a raw block has nowhere to keep a mode.

use bytes::{Bytes, BytesMut};
use dagfs_codec::{pb, UnixFsData};
use dagfs_types::{Cid, Mtime};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::dag::Dag;
use crate::error::{UnixFsError, UnixFsResult};

pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Links per file node, the most that keeps a node under 8 KiB.
pub const DEFAULT_MAX_CHILDREN: usize = 174;

/// How a file is laid out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    pub chunk_size: usize,
    pub max_children: usize,
    pub raw_leaves: bool,
    pub mode: Option<u32>,
    pub mtime: Option<Mtime>,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_children: DEFAULT_MAX_CHILDREN,
            raw_leaves: false,
            mode: None,
            mtime: None,
        }
    }
}

impl FileOptions {
    pub fn with_raw_leaves(mut self, raw_leaves: bool) -> Self {
        self.raw_leaves = raw_leaves;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_metadata(mut self, mode: Option<u32>, mtime: Option<Mtime>) -> Self {
        self.mode = mode;
        self.mtime = mtime;
        self
    }

    fn has_metadata(&self) -> bool {
        self.mode.is_some() || self.mtime.is_some()
    }

    pub fn validate(&self) -> UnixFsResult<()> {
        if self.chunk_size == 0 {
            return Err(UnixFsError::InvalidOption("chunk size must be positive".into()));
        }
        if self.max_children < 2 {
            return Err(UnixFsError::InvalidOption(
                "file nodes need room for at least two links".into(),
            ));
        }
        Ok(())
    }
}

/// A file written to the block store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuiltFile {
    pub cid: Cid,
    /// Cumulative size of the whole tree.
    pub tsize: u64,
    /// Content length.
    pub size: u64,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Part {
    pub(crate) cid: Cid,
    pub(crate) tsize: u64,
    pub(crate) size: u64,
}

/// The first chunk, before a second one shows whether the file needs a
/// tree.
enum Held {
    Bytes(Bytes),
    Leaf(Part),
}

/// Incremental file writer.
///
/// The first chunk is held back until a second one shows up, so a
/// one-chunk file is written exactly once in its final form. Parent nodes
/// are written as soon as a level fills, so memory stays bounded by the
/// tree depth rather than the file length.
pub struct FileBuilder {
    dag: Dag,
    opts: FileOptions,
    buf: BytesMut,
    first: Option<Held>,
    /// Pending parts per tree level, leaves at index 0.
    levels: Vec<Vec<Part>>,
    written: u64,
    zero_leaf: Option<Part>,
}

impl FileBuilder {
    pub fn new(dag: Dag, opts: FileOptions) -> UnixFsResult<Self> {
        opts.validate()?;
        Ok(Self {
            buf: BytesMut::with_capacity(opts.chunk_size),
            dag,
            opts,
            first: None,
            levels: Vec::new(),
            written: 0,
            zero_leaf: None,
        })
    }

    /// Bytes accepted so far.
    pub fn position(&self) -> u64 {
        self.written
    }

    pub async fn write(&mut self, mut data: &[u8]) -> UnixFsResult<()> {
        self.written += data.len() as u64;
        while !data.is_empty() {
            let room = self.opts.chunk_size - self.buf.len();
            let take = room.min(data.len());
            self.buf.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buf.len() == self.opts.chunk_size {
                let chunk = self.buf.split().freeze();
                self.push(Held::Bytes(chunk)).await?;
            }
        }
        Ok(())
    }

    /// Append `len` zero bytes. Whole zero chunks share one leaf, which is
    /// written once.
    pub async fn write_zeros(&mut self, mut len: u64) -> UnixFsResult<()> {
        let chunk = self.opts.chunk_size as u64;
        if !self.buf.is_empty() {
            let fill = len.min(chunk - self.buf.len() as u64);
            self.write(&vec![0; fill as usize]).await?;
            len -= fill;
        }
        while len >= chunk {
            self.dag.abort().check()?;
            let leaf = match self.zero_leaf {
                Some(leaf) => leaf,
                None => {
                    let leaf = self.write_leaf(Bytes::from(vec![0; self.opts.chunk_size])).await?;
                    *self.zero_leaf.insert(leaf)
                }
            };
            self.written += chunk;
            self.push(Held::Leaf(leaf)).await?;
            len -= chunk;
        }
        self.write(&vec![0; len as usize]).await
    }

    /// Whether a stored leaf of `size` bytes starting at `start` can be
    /// linked as is: it must sit exactly where the chunker would cut, in
    /// a file that ends at `file_size`.
    pub(crate) fn can_adopt(&self, start: u64, size: u64, file_size: u64) -> bool {
        let chunk = self.opts.chunk_size as u64;
        self.buf.is_empty()
            && self.written == start
            && size > 0
            && (size == chunk || (size < chunk && start + size == file_size))
    }

    /// Link an existing leaf. The caller checked [`Self::can_adopt`].
    pub(crate) async fn adopt(&mut self, leaf: Part) -> UnixFsResult<()> {
        self.written += leaf.size;
        self.push(Held::Leaf(leaf)).await
    }

    /// Feed a whole stream of byte chunks.
    pub async fn write_stream<S>(&mut self, stream: S) -> UnixFsResult<()>
    where
        S: Stream<Item = UnixFsResult<Bytes>>,
    {
        futures::pin_mut!(stream);
        while let Some(chunk) = stream.next().await {
            self.dag.abort().check()?;
            self.write(&chunk?).await?;
        }
        Ok(())
    }

    async fn push(&mut self, chunk: Held) -> UnixFsResult<()> {
        if self.levels.is_empty() && self.first.is_none() {
            self.first = Some(chunk);
            return Ok(());
        }
        if let Some(first) = self.first.take() {
            let leaf = self.leaf(first).await?;
            self.push_part(0, leaf).await?;
        }
        let leaf = self.leaf(chunk).await?;
        self.push_part(0, leaf).await
    }

    async fn leaf(&self, held: Held) -> UnixFsResult<Part> {
        match held {
            Held::Bytes(chunk) => self.write_leaf(chunk).await,
            Held::Leaf(part) => Ok(part),
        }
    }

    /// Append `part` at `level`, first writing the level out as a parent
    /// when it is full.
    async fn push_part(&mut self, mut level: usize, mut part: Part) -> UnixFsResult<()> {
        loop {
            if self.levels.len() == level {
                self.levels.push(Vec::with_capacity(self.opts.max_children));
            }
            if self.levels[level].len() < self.opts.max_children {
                self.levels[level].push(part);
                return Ok(());
            }
            let full = std::mem::replace(&mut self.levels[level], vec![part]);
            part = self.write_parent(&full, false).await?;
            level += 1;
        }
    }

    async fn write_leaf(&self, chunk: Bytes) -> UnixFsResult<Part> {
        let size = chunk.len() as u64;
        let (cid, tsize) = if self.opts.raw_leaves {
            self.dag.put_raw(chunk).await?
        } else {
            self.dag.put_node(&inline_file(chunk.to_vec(), None, None), Vec::new()).await?
        };
        trace!(%cid, size, "wrote leaf");
        Ok(Part { cid, tsize, size })
    }

    /// Flush the tail and write the tree.
    pub async fn finish(mut self) -> UnixFsResult<BuiltFile> {
        if !self.buf.is_empty() {
            let tail = self.buf.split().freeze();
            self.push(Held::Bytes(tail)).await?;
        }
        if self.levels.is_empty() {
            let first = self.first.take().unwrap_or(Held::Bytes(Bytes::new()));
            return self.single(first).await;
        }

        let mut level = 0;
        loop {
            let group = std::mem::take(&mut self.levels[level]);
            let is_root = self.levels[level + 1..].iter().all(Vec::is_empty);
            let parent = self.write_parent(&group, is_root).await?;
            if is_root {
                return Ok(BuiltFile {
                    cid: parent.cid,
                    tsize: parent.tsize,
                    size: parent.size,
                });
            }
            level += 1;
            self.push_part(level, parent).await?;
        }
    }

    async fn single(&self, first: Held) -> UnixFsResult<BuiltFile> {
        let content = match first {
            Held::Leaf(part) if !self.opts.has_metadata() => {
                return Ok(BuiltFile {
                    cid: part.cid,
                    tsize: part.tsize,
                    size: part.size,
                })
            }
            Held::Leaf(part) => Bytes::from(self.dag.cat(&part.cid, 0, None).await?),
            Held::Bytes(content) => content,
        };
        let size = content.len() as u64;
        let (cid, tsize) = if self.opts.raw_leaves && !self.opts.has_metadata() {
            self.dag.put_raw(content).await?
        } else {
            let data = inline_file(content.to_vec(), self.opts.mode, self.opts.mtime);
            self.dag.put_node(&data, Vec::new()).await?
        };
        Ok(BuiltFile { cid, tsize, size })
    }

    async fn write_parent(&self, children: &[Part], is_root: bool) -> UnixFsResult<Part> {
        let mut data = UnixFsData::file();
        data.blocksizes = children.iter().map(|c| c.size).collect();
        let size = data.blocksizes.iter().sum();
        data.filesize = Some(size);
        if is_root {
            data = data.with_mode(self.opts.mode).with_mtime(self.opts.mtime);
        }
        let links = children.iter().map(|c| pb::link(c.cid, "", c.tsize)).collect();
        let (cid, tsize) = self.dag.put_node(&data, links).await?;
        Ok(Part { cid, tsize, size })
    }
}

/// A file node that carries its bytes itself.
pub(crate) fn inline_file(content: Vec<u8>, mode: Option<u32>, mtime: Option<Mtime>) -> UnixFsData {
    let mut data = UnixFsData::file().with_mode(mode).with_mtime(mtime);
    data.filesize = Some(content.len() as u64);
    data.data = (!content.is_empty()).then_some(content);
    data
}

impl Dag {
    /// Write `content` as a file.
    pub async fn add_bytes(&self, content: &[u8], opts: &FileOptions) -> UnixFsResult<BuiltFile> {
        let mut builder = FileBuilder::new(self.clone(), opts.clone())?;
        builder.write(content).await?;
        builder.finish().await
    }

    /// Write a stream of byte chunks as a file.
    pub async fn add_stream<S>(&self, stream: S, opts: &FileOptions) -> UnixFsResult<BuiltFile>
    where
        S: Stream<Item = UnixFsResult<Bytes>>,
    {
        let mut builder = FileBuilder::new(self.clone(), opts.clone())?;
        builder.write_stream(stream).await?;
        builder.finish().await
    }
}
