use std::path::Path;
use std::sync::Arc;

use dagfs_mfs::{Files, FsRootStore, InMemoryRootStore, RootStore};
use dagfs_pin::{collect_garbage, FsPinStore, GcReport, InMemoryPinStore, PinStore, Pinner};
use dagfs_store::{
    AbortOptions, BlockService, BlockStore, Exchange, FsBlockStore, InMemoryBlockStore,
    OfflineExchange,
};
use dagfs_unixfs::Dag;
use tracing::info;

use crate::block::BlockApi;
use crate::config::{NodeConfig, CONFIG_FILE};
use crate::dag::DagApi;
use crate::error::{SdkError, SdkResult};
use crate::object::ObjectApi;
use crate::pin::PinApi;

/// Directory under the repository holding block files.
pub const BLOCKS_DIR: &str = "blocks";

/// A dagfs node: one block service with its pin set and MFS.
///
/// The primary entry point for the SDK. Clone-free; share it behind an
/// `Arc` for concurrent use. Every method takes `&self`.
pub struct Node {
    config: NodeConfig,
    blocks: BlockService,
    files: Files,
    pinner: Pinner,
}

impl Node {
    /// A node that keeps everything in memory.
    pub async fn in_memory() -> SdkResult<Self> {
        Self::open(NodeConfig::default()).await
    }

    /// Open a node as described by `config`, with no peers.
    pub async fn open(config: NodeConfig) -> SdkResult<Self> {
        Self::with_exchange(config, Arc::new(OfflineExchange)).await
    }

    /// Open a node that asks `exchange` for blocks it does not hold,
    /// unless the config says to stay offline.
    pub async fn with_exchange(config: NodeConfig, exchange: Arc<dyn Exchange>) -> SdkResult<Self> {
        config.validate()?;
        let exchange: Arc<dyn Exchange> = if config.offline {
            Arc::new(OfflineExchange)
        } else {
            exchange
        };

        let (store, roots, pins): (Arc<dyn BlockStore>, Arc<dyn RootStore>, Arc<dyn PinStore>) =
            match &config.repo_path {
                Some(repo) => (
                    Arc::new(FsBlockStore::open(repo.join(BLOCKS_DIR))?),
                    Arc::new(FsRootStore::in_repo(repo)),
                    Arc::new(FsPinStore::in_repo(repo)),
                ),
                None => (
                    Arc::new(InMemoryBlockStore::new()),
                    Arc::new(InMemoryRootStore::new()),
                    Arc::new(InMemoryPinStore::new()),
                ),
            };

        let blocks = BlockService::with_exchange(store, exchange);
        let pinner = Pinner::open(blocks.clone(), pins)?;
        let files = Files::open(blocks.clone(), roots, config.files_config()).await?;
        info!(
            repo = ?config.repo_path,
            online = blocks.is_online(),
            "node opened"
        );
        Ok(Self {
            config,
            blocks,
            files,
            pinner,
        })
    }

    /// Create a repository at `repo` with `config` written to its
    /// `config.toml`, then open it.
    pub async fn init(repo: impl AsRef<Path>, mut config: NodeConfig) -> SdkResult<Self> {
        let repo = repo.as_ref();
        let config_path = repo.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(SdkError::InvalidArgument(format!(
                "repository already initialized at {}",
                repo.display()
            )));
        }
        std::fs::create_dir_all(repo)?;
        config.repo_path = Some(repo.to_path_buf());
        config.save(&config_path)?;
        info!(repo = %repo.display(), "initialized repository");
        Self::open(config).await
    }

    /// Open the repository at `repo` using its stored config.
    pub async fn open_repo(repo: impl AsRef<Path>) -> SdkResult<Self> {
        let repo = repo.as_ref();
        let config_path = repo.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(SdkError::NotInitialized(repo.display().to_string()));
        }
        let mut config = NodeConfig::load(&config_path)?;
        config.repo_path = Some(repo.to_path_buf());
        Self::open(config).await
    }

    // ---- Accessors ----

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn blocks(&self) -> &BlockService {
        &self.blocks
    }

    /// The mutable file system.
    pub fn files(&self) -> &Files {
        &self.files
    }

    pub fn pinner(&self) -> &Pinner {
        &self.pinner
    }

    // ---- Sub-APIs ----

    pub fn block(&self) -> BlockApi<'_> {
        BlockApi::new(self)
    }

    pub fn dag(&self) -> DagApi<'_> {
        DagApi::new(self)
    }

    pub fn object(&self) -> ObjectApi<'_> {
        ObjectApi::new(self)
    }

    pub fn pin(&self) -> PinApi<'_> {
        PinApi::new(self)
    }

    // ---- Repository ----

    /// Delete every block that no pin and no MFS path reaches.
    ///
    /// The MFS root is read once the collector holds the GC lock, so a
    /// write that finished before the collection started is always kept.
    pub async fn repo_gc(&self, abort: &AbortOptions) -> SdkResult<GcReport> {
        let files = &self.files;
        let report = collect_garbage(&self.blocks, &self.pinner, || vec![files.root()], abort).await?;
        Ok(report)
    }

    /// Abort options for a call: the caller's, or the node default.
    pub(crate) fn abort_or_default(&self, abort: &AbortOptions) -> AbortOptions {
        if abort.timeout.is_none() && abort.signal.is_none() {
            self.config.abort()
        } else {
            abort.clone()
        }
    }

    /// A DAG handle using the node's UnixFS CID settings.
    pub(crate) fn unixfs_dag(&self, abort: &AbortOptions) -> Dag {
        Dag::new(self.blocks.clone())
            .with_abort(self.abort_or_default(abort))
            .with_cid_options(self.config.unixfs.cid_options())
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("repo", &self.config.repo_path)
            .field("mfs_root", &self.files.root())
            .finish()
    }
}
