//! The MFS handle: root pointer, configuration, and the read-side calls.
//! Mutations live in `edit.rs`.

use std::fmt;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use dagfs_codec::links;
use dagfs_store::{AbortOptions, BlockService, WriterGuard};
use dagfs_types::{codec_of, Cid, Mtime};
use dagfs_unixfs::{
    resolve_path, CidOptions, Dag, DirectoryLister, FileOptions, FileReader, NodeKind, UnixFsError,
    DEFAULT_SHARD_SPLIT_THRESHOLD,
};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::{FilesError, FilesResult};
use crate::options::{Layout, LsOptions, ReadOptions, StatOptions};
use crate::path::{display, FilesPath};
use crate::root::{InMemoryRootStore, RootStore};

/// Defaults for nodes written through MFS.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub cid: CidOptions,
    /// Chunking and leaf format. Mode and mtime here are ignored.
    pub file: FileOptions,
    pub shard_split_threshold: usize,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            cid: CidOptions::default(),
            file: FileOptions::default(),
            shard_split_threshold: DEFAULT_SHARD_SPLIT_THRESHOLD,
        }
    }
}

/// Bytes to write: a buffer or a stream of chunks.
pub enum Content {
    Bytes(Bytes),
    Stream(BoxStream<'static, FilesResult<Bytes>>),
}

impl Content {
    pub fn stream(stream: impl Stream<Item = FilesResult<Bytes>> + Send + 'static) -> Self {
        Content::Stream(stream.boxed())
    }

    /// Gather at most `limit` bytes.
    pub(crate) async fn collect(self, limit: Option<u64>, abort: &AbortOptions) -> FilesResult<Vec<u8>> {
        let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let mut out = match self {
            Content::Bytes(bytes) => bytes.to_vec(),
            Content::Stream(mut stream) => {
                let mut out = Vec::new();
                while out.len() < limit {
                    abort.check()?;
                    match stream.next().await {
                        Some(chunk) => out.extend_from_slice(&chunk?),
                        None => break,
                    }
                }
                out
            }
        };
        out.truncate(limit);
        Ok(out)
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Content::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Bytes(bytes.into())
    }
}

impl From<&'static [u8]> for Content {
    fn from(bytes: &'static [u8]) -> Self {
        Content::Bytes(Bytes::from_static(bytes))
    }
}

impl From<&'static str> for Content {
    fn from(text: &'static str) -> Self {
        Content::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Bytes(text.into())
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Content::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Result of [`Files::stat`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileStat {
    #[serde(with = "dagfs_types::serde_cid")]
    pub cid: Cid,
    /// `file` or `directory`.
    #[serde(rename = "type")]
    pub entry_type: String,
    /// Physical layout, e.g. `hamt-sharded-directory`.
    pub kind: NodeKind,
    /// Content length; zero for directories.
    pub size: u64,
    pub cumulative_size: u64,
    /// Number of links in the node.
    pub blocks: usize,
    pub mode: u32,
    pub mtime: Option<Mtime>,
    /// Whether every block of the DAG is held locally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<bool>,
    /// Bytes of the DAG held locally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_local: Option<u64>,
}

/// One line of [`Files::ls`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LsEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub kind: NodeKind,
    pub size: u64,
    #[serde(with = "dagfs_types::serde_cid")]
    pub cid: Cid,
    pub mode: u32,
    pub mtime: Option<Mtime>,
}

/// A mutable file system rooted at a single CID.
pub struct Files {
    blocks: BlockService,
    config: FilesConfig,
    root: RwLock<Cid>,
    write_lock: Mutex<()>,
    store: Arc<dyn RootStore>,
}

impl Files {
    /// Open the MFS whose root is kept in `store`, starting from an empty
    /// directory if nothing is stored yet.
    pub async fn open(
        blocks: BlockService,
        store: Arc<dyn RootStore>,
        config: FilesConfig,
    ) -> FilesResult<Self> {
        let root = match store.load()? {
            Some(root) => root,
            None => {
                let dag = Dag::new(blocks.clone()).with_cid_options(config.cid);
                let (root, _) = dag.empty_directory(None, None).await?;
                store.store(&root)?;
                root
            }
        };
        info!(%root, "opened mfs");
        Ok(Self {
            blocks,
            config,
            root: RwLock::new(root),
            write_lock: Mutex::new(()),
            store,
        })
    }

    /// An MFS whose root lives only in memory.
    pub async fn in_memory(blocks: BlockService) -> FilesResult<Self> {
        Self::open(blocks, Arc::new(InMemoryRootStore::new()), FilesConfig::default()).await
    }

    /// The current root CID.
    pub fn root(&self) -> Cid {
        *self.root.read().expect("lock poisoned")
    }

    pub fn config(&self) -> &FilesConfig {
        &self.config
    }

    pub fn blocks(&self) -> &BlockService {
        &self.blocks
    }

    // -----------------------------------------------------------------------
    // Plumbing shared with the mutations
    // -----------------------------------------------------------------------

    pub(crate) async fn lock(&self) -> (WriterGuard, MutexGuard<'_, ()>) {
        let gc = self.blocks.gc_lock().writer().await;
        let write = self.write_lock.lock().await;
        (gc, write)
    }

    pub(crate) fn dag(&self, layout: &Layout, abort: &AbortOptions) -> Dag {
        let cid = CidOptions::new(
            layout.cid_version.unwrap_or(self.config.cid.cid_version),
            layout.hash_alg.unwrap_or(self.config.cid.hash_alg),
        );
        Dag::new(self.blocks.clone())
            .with_cid_options(cid)
            .with_abort(abort.clone())
    }

    pub(crate) fn threshold(&self, layout: &Layout) -> usize {
        layout
            .shard_split_threshold
            .unwrap_or(self.config.shard_split_threshold)
    }

    pub(crate) fn file_options(
        &self,
        layout: &Layout,
        mode: Option<u32>,
        mtime: Option<Mtime>,
    ) -> FileOptions {
        FileOptions {
            raw_leaves: layout.raw_leaves.unwrap_or(self.config.file.raw_leaves),
            ..self.config.file.clone()
        }
        .with_metadata(mode, mtime)
    }

    /// Repoint the root. Callers hold the write lock.
    pub(crate) fn swap_root(&self, new_root: Cid) -> FilesResult<()> {
        let old = self.root();
        if old == new_root {
            return Ok(());
        }
        self.store.store(&new_root)?;
        *self.root.write().expect("lock poisoned") = new_root;
        debug!(%old, new = %new_root, "repointed mfs root");
        Ok(())
    }

    /// Resolve a path against `root`, naming the failing prefix in errors.
    pub(crate) async fn resolve_in(
        dag: &Dag,
        root: Cid,
        path: &FilesPath,
    ) -> FilesResult<Cid> {
        match path {
            FilesPath::Ipfs(ipfs) => resolve_path(dag, ipfs).await.map_err(|e| match e {
                UnixFsError::NoSuchEntry(_) => FilesError::DoesNotExist(ipfs.to_string()),
                UnixFsError::NotADirectory(_) => FilesError::NotADirectory(ipfs.to_string()),
                e => e.into(),
            }),
            FilesPath::Mfs(segments) => {
                let mut current = root;
                for (i, name) in segments.iter().enumerate() {
                    current = match dag.dir_lookup(&current, name).await {
                        Ok(Some(link)) => link.cid,
                        Ok(None) => return Err(FilesError::DoesNotExist(display(&segments[..=i]))),
                        Err(UnixFsError::NotADirectory(_)) => {
                            return Err(FilesError::NotADirectory(display(&segments[..i])))
                        }
                        Err(e) => return Err(e.into()),
                    };
                }
                Ok(current)
            }
        }
    }

    async fn resolve(&self, path: &str, abort: &AbortOptions) -> FilesResult<(Dag, Cid)> {
        let parsed = FilesPath::parse(path)?;
        let dag = self.dag(&Layout::default(), abort);
        let cid = Self::resolve_in(&dag, self.root(), &parsed).await?;
        Ok((dag, cid))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn stat(&self, path: &str, opts: &StatOptions) -> FilesResult<FileStat> {
        let (dag, cid) = self.resolve(path, &opts.abort).await?;
        let node = dag.load(&cid).await?;
        let kind = node.kind()?;
        let (local, size_local) = if opts.with_local {
            let (local, size) = self.local_usage(&cid, &opts.abort)?;
            (Some(local), Some(size))
        } else {
            (None, None)
        };
        Ok(FileStat {
            cid,
            entry_type: kind.entry_type().to_string(),
            kind,
            size: if kind.is_directory() { 0 } else { node.file_size() },
            cumulative_size: node.cumulative_size(),
            blocks: node.links().len(),
            mode: node.mode(),
            mtime: node.mtime(),
            local,
            size_local,
        })
    }

    /// Walk the DAG under `cid` through local blocks only.
    fn local_usage(&self, cid: &Cid, abort: &AbortOptions) -> FilesResult<(bool, u64)> {
        let mut complete = true;
        let mut size = 0;
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![*cid];
        while let Some(next) = stack.pop() {
            abort.check()?;
            if !seen.insert(next) {
                continue;
            }
            match self.blocks.get_local(&next)? {
                Some(bytes) => {
                    size += bytes.len() as u64;
                    stack.extend(links(codec_of(&next)?, &bytes).map_err(UnixFsError::from)?);
                }
                None => complete = false,
            }
        }
        Ok((complete, size))
    }

    /// List a directory, or describe a single file.
    pub async fn ls(&self, path: &str, opts: &LsOptions) -> FilesResult<Vec<LsEntry>> {
        let parsed = FilesPath::parse(path)?;
        let dag = self.dag(&Layout::default(), &opts.abort);
        let cid = Self::resolve_in(&dag, self.root(), &parsed).await?;
        let node = dag.load(&cid).await?;
        if !node.is_directory() {
            let name = parsed.basename().unwrap_or_default();
            return Ok(vec![describe(&dag, name, cid).await?]);
        }
        let mut lister = DirectoryLister::open(dag.clone(), &cid).await?;
        let mut out = Vec::new();
        while let Some(link) = lister.next_entry().await? {
            out.push(describe(&dag, link.name, link.cid).await?);
        }
        Ok(out)
    }

    /// Open a pull reader over a file.
    pub async fn read(&self, path: &str, opts: &ReadOptions) -> FilesResult<FileReader> {
        let (dag, cid) = self.resolve(path, &opts.abort).await?;
        FileReader::open(dag, &cid, opts.offset, opts.length)
            .await
            .map_err(|e| match e {
                UnixFsError::IsADirectory(_) => FilesError::IsADirectory(path.to_string()),
                e => e.into(),
            })
    }

    /// Read a file range into memory.
    pub async fn read_all(&self, path: &str, opts: &ReadOptions) -> FilesResult<Vec<u8>> {
        Ok(self.read(path, opts).await?.read_to_end().await?)
    }

    /// The CID at `path` under the current root. Writes are never
    /// buffered, so this is also the durable state.
    pub async fn flush(&self, path: &str) -> FilesResult<Cid> {
        let (_, cid) = self.resolve(path, &AbortOptions::default()).await?;
        Ok(cid)
    }
}

async fn describe(dag: &Dag, name: String, cid: Cid) -> FilesResult<LsEntry> {
    let node = dag.load(&cid).await?;
    let kind = node.kind()?;
    Ok(LsEntry {
        name,
        entry_type: kind.entry_type().to_string(),
        kind,
        size: node.file_size(),
        cid,
        mode: node.mode(),
        mtime: node.mtime(),
    })
}

impl fmt::Debug for Files {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Files")
            .field("root", &self.root())
            .field("config", &self.config)
            .finish()
    }
}
