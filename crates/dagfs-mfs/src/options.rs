//! Per-call options. Anything left as `None` falls back to the
//! [`FilesConfig`](crate::FilesConfig) the MFS was opened with.

use dagfs_store::AbortOptions;
use dagfs_types::{CidVersion, HashAlg, Mtime};

/// How new nodes are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Layout {
    pub cid_version: Option<CidVersion>,
    pub hash_alg: Option<HashAlg>,
    pub raw_leaves: Option<bool>,
    pub shard_split_threshold: Option<usize>,
}

impl Layout {
    pub fn with_cid_version(mut self, version: CidVersion) -> Self {
        self.cid_version = Some(version);
        self
    }

    pub fn with_hash_alg(mut self, alg: HashAlg) -> Self {
        self.hash_alg = Some(alg);
        self
    }

    pub fn with_raw_leaves(mut self, raw: bool) -> Self {
        self.raw_leaves = Some(raw);
        self
    }

    pub fn with_shard_split_threshold(mut self, threshold: usize) -> Self {
        self.shard_split_threshold = Some(threshold);
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// Create the file if it does not exist.
    pub create: bool,
    /// Create missing parent directories.
    pub parents: bool,
    /// Where in the file the new content starts. Gaps are zero-filled.
    pub offset: u64,
    /// Write at most this many bytes of the content.
    pub length: Option<u64>,
    /// Discard existing content first.
    pub truncate: bool,
    pub mode: Option<u32>,
    pub mtime: Option<Mtime>,
    pub layout: Layout,
    pub abort: AbortOptions,
}

impl WriteOptions {
    pub fn create() -> Self {
        Self {
            create: true,
            ..Self::default()
        }
    }

    pub fn with_parents(mut self) -> Self {
        self.parents = true;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_truncate(mut self) -> Self {
        self.truncate = true;
        self
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_mtime(mut self, mtime: Mtime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReadOptions {
    pub offset: u64,
    pub length: Option<u64>,
    pub abort: AbortOptions,
}

impl ReadOptions {
    pub fn range(offset: u64, length: Option<u64>) -> Self {
        Self {
            offset,
            length,
            abort: AbortOptions::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MkdirOptions {
    pub parents: bool,
    pub mode: Option<u32>,
    pub mtime: Option<Mtime>,
    pub layout: Layout,
    pub abort: AbortOptions,
}

impl MkdirOptions {
    pub fn parents() -> Self {
        Self {
            parents: true,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_mtime(mut self, mtime: Mtime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct RmOptions {
    /// Allow removing non-empty directories.
    pub recursive: bool,
    pub layout: Layout,
    pub abort: AbortOptions,
}

impl RmOptions {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CpOptions {
    /// Create missing parents of the destination.
    pub parents: bool,
    pub layout: Layout,
    pub abort: AbortOptions,
}

#[derive(Clone, Debug, Default)]
pub struct MvOptions {
    pub parents: bool,
    pub layout: Layout,
    pub abort: AbortOptions,
}

#[derive(Clone, Debug, Default)]
pub struct StatOptions {
    /// Also report how much of the DAG is held locally.
    pub with_local: bool,
    pub abort: AbortOptions,
}

#[derive(Clone, Debug, Default)]
pub struct LsOptions {
    pub abort: AbortOptions,
}

#[derive(Clone, Debug, Default)]
pub struct ChmodOptions {
    /// Apply to every node below a directory as well.
    pub recursive: bool,
    pub layout: Layout,
    pub abort: AbortOptions,
}

#[derive(Clone, Debug, Default)]
pub struct TouchOptions {
    /// Defaults to now.
    pub mtime: Option<Mtime>,
    pub layout: Layout,
    pub abort: AbortOptions,
}
