use std::path::{Path, PathBuf};
use std::time::Duration;

use dagfs_mfs::FilesConfig;
use dagfs_store::AbortOptions;
use dagfs_types::{CidVersion, HashAlg};
use dagfs_unixfs::{
    CidOptions, FileOptions, ImportOptions, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHILDREN,
    DEFAULT_SHARD_SPLIT_THRESHOLD,
};
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Name of the config file inside a repository.
pub const CONFIG_FILE: &str = "config.toml";

/// Node configuration, stored as TOML in `<repo>/config.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// On-disk repository. `None` keeps everything in memory.
    pub repo_path: Option<PathBuf>,
    pub unixfs: UnixFsDefaults,
    /// Ignore any exchange the node is given and serve local blocks only.
    pub offline: bool,
    /// Default deadline for a single operation.
    pub timeout_secs: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            repo_path: None,
            unixfs: UnixFsDefaults::default(),
            offline: false,
            timeout_secs: None,
        }
    }
}

/// Layout used for imported files and for new MFS nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnixFsDefaults {
    pub cid_version: CidVersion,
    pub hash_alg: HashAlg,
    pub raw_leaves: bool,
    pub chunk_size: usize,
    pub max_children: usize,
    pub shard_split_threshold: usize,
}

impl Default for UnixFsDefaults {
    fn default() -> Self {
        Self {
            cid_version: CidVersion::V0,
            hash_alg: HashAlg::Sha2_256,
            raw_leaves: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_children: DEFAULT_MAX_CHILDREN,
            shard_split_threshold: DEFAULT_SHARD_SPLIT_THRESHOLD,
        }
    }
}

impl NodeConfig {
    /// Configuration for an on-disk node at `repo`.
    pub fn at(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: Some(repo.into()),
            ..Self::default()
        }
    }

    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&text).map_err(|e| SdkError::Config(e.to_string()))
    }

    /// Write this config as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> SdkResult<()> {
        let text = toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }

    pub fn validate(&self) -> SdkResult<()> {
        self.unixfs
            .file_options()
            .validate()
            .map_err(|e| SdkError::Config(e.to_string()))
    }

    /// Abort options carrying the default timeout.
    pub fn abort(&self) -> AbortOptions {
        match self.timeout_secs {
            Some(secs) => AbortOptions::new().with_timeout(Duration::from_secs(secs)),
            None => AbortOptions::new(),
        }
    }

    pub fn files_config(&self) -> FilesConfig {
        FilesConfig {
            cid: self.unixfs.cid_options(),
            file: self.unixfs.file_options(),
            shard_split_threshold: self.unixfs.shard_split_threshold,
        }
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            file: self.unixfs.file_options(),
            shard_split_threshold: self.unixfs.shard_split_threshold,
            wrap_with_directory: false,
        }
    }
}

impl UnixFsDefaults {
    pub fn cid_options(&self) -> CidOptions {
        CidOptions::new(self.cid_version, self.hash_alg)
    }

    pub fn file_options(&self) -> FileOptions {
        FileOptions {
            chunk_size: self.chunk_size,
            max_children: self.max_children,
            raw_leaves: self.raw_leaves,
            ..FileOptions::default()
        }
    }
}
