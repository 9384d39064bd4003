//! UnixFS import and export on a [`Node`].

use bytes::Bytes;
use dagfs_pin::PinAddOptions;
use dagfs_store::AbortOptions;
use dagfs_types::{Cid, CidVersion, Mtime};
use dagfs_unixfs::{
    import, parse_ipfs_path, resolve_path, CidOptions, DirectoryLister, FileReader, ImportEntry,
    ImportOptions, ImportedEntry, NodeKind,
};
use serde::Serialize;
use tracing::info;

use crate::error::SdkResult;
use crate::node::Node;

/// Options for [`Node::add`] and [`Node::add_all`]. Unset layout fields
/// fall back to the node config.
#[derive(Clone, Debug)]
pub struct AddOptions {
    /// Pin every top-level result recursively.
    pub pin: bool,
    pub wrap_with_directory: bool,
    pub cid_version: Option<CidVersion>,
    pub raw_leaves: Option<bool>,
    pub chunk_size: Option<usize>,
    pub shard_split_threshold: Option<usize>,
    /// Metadata for content passed to [`Node::add`].
    pub mode: Option<u32>,
    pub mtime: Option<Mtime>,
    pub abort: AbortOptions,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            pin: true,
            wrap_with_directory: false,
            cid_version: None,
            raw_leaves: None,
            chunk_size: None,
            shard_split_threshold: None,
            mode: None,
            mtime: None,
            abort: AbortOptions::default(),
        }
    }
}

impl AddOptions {
    pub fn unpinned() -> Self {
        Self {
            pin: false,
            ..Self::default()
        }
    }

    pub fn wrapped(mut self) -> Self {
        self.wrap_with_directory = true;
        self
    }

    pub fn with_cid_version(mut self, version: CidVersion) -> Self {
        self.cid_version = Some(version);
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

/// A directory entry as reported by [`Node::ls`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListedEntry {
    pub name: String,
    #[serde(with = "dagfs_types::serde_cid")]
    pub cid: Cid,
    /// Content length for files, cumulative size for directories.
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

/// One node of a tree exported by [`Node::get`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedEntry {
    /// Relative path, starting with the name of the requested node.
    pub path: String,
    pub cid: Cid,
    pub kind: NodeKind,
    /// File content; `None` for directories.
    pub content: Option<Bytes>,
    pub mode: u32,
    pub mtime: Option<Mtime>,
}

impl Node {
    // ---- Import ----

    fn import_settings(&self, opts: &AddOptions) -> (CidOptions, ImportOptions) {
        let mut cid = self.config().unixfs.cid_options();
        if let Some(version) = opts.cid_version {
            cid.cid_version = version;
        }
        let mut import = self.config().import_options();
        if let Some(raw) = opts.raw_leaves {
            import.file.raw_leaves = raw;
        }
        if let Some(chunk) = opts.chunk_size {
            import.file.chunk_size = chunk;
        }
        if let Some(threshold) = opts.shard_split_threshold {
            import.shard_split_threshold = threshold;
        }
        import.wrap_with_directory = opts.wrap_with_directory;
        (cid, import)
    }

    /// Import a single file.
    pub async fn add(&self, content: impl Into<Bytes>, opts: &AddOptions) -> SdkResult<ImportedEntry> {
        let content = content.into();
        let (cid_opts, import_opts) = self.import_settings(opts);
        let file_opts = import_opts.file.with_metadata(opts.mode, opts.mtime);
        file_opts.validate()?;

        let _gc = self.blocks().gc_lock().writer().await;
        let dag = self.unixfs_dag(&opts.abort).with_cid_options(cid_opts);
        let built = dag.add_bytes(&content, &file_opts).await?;
        if opts.pin {
            self.pinner()
                .add(&built.cid, &pin_options(dag.abort()))
                .await?;
        }
        info!(cid = %built.cid, size = built.size, pinned = opts.pin, "added file");
        Ok(ImportedEntry {
            path: built.cid.to_string(),
            cid: built.cid,
            size: built.tsize,
        })
    }

    /// Import a tree of files and directories in one pass.
    ///
    /// Returns every written node, children before their parents. With
    /// `pin` the top-level nodes (or the wrapping directory) are pinned
    /// recursively before the GC lock is released.
    pub async fn add_all(
        &self,
        entries: Vec<ImportEntry>,
        opts: &AddOptions,
    ) -> SdkResult<Vec<ImportedEntry>> {
        let (cid_opts, import_opts) = self.import_settings(opts);

        let _gc = self.blocks().gc_lock().writer().await;
        let dag = self.unixfs_dag(&opts.abort).with_cid_options(cid_opts);
        let imported = import(&dag, entries, &import_opts).await?;
        if opts.pin {
            let pin = pin_options(dag.abort());
            for entry in imported.iter().filter(|e| is_top_level(e, opts)) {
                self.pinner().add(&entry.cid, &pin).await?;
            }
        }
        info!(entries = imported.len(), pinned = opts.pin, "import finished");
        Ok(imported)
    }

    // ---- Export ----

    /// The CID an `/ipfs/<cid>/...` path names.
    pub async fn resolve_path(&self, path: &str, abort: &AbortOptions) -> SdkResult<Cid> {
        let parsed = parse_ipfs_path(path)?;
        Ok(resolve_path(&self.unixfs_dag(abort), &parsed).await?)
    }

    /// Pull reader over a file.
    pub async fn cat_reader(
        &self,
        path: &str,
        offset: u64,
        length: Option<u64>,
        abort: &AbortOptions,
    ) -> SdkResult<FileReader> {
        let cid = self.resolve_path(path, abort).await?;
        Ok(FileReader::open(self.unixfs_dag(abort), &cid, offset, length).await?)
    }

    /// File content in `[offset, offset + length)`. Reading past the end
    /// yields fewer bytes, possibly none.
    pub async fn cat(
        &self,
        path: &str,
        offset: u64,
        length: Option<u64>,
        abort: &AbortOptions,
    ) -> SdkResult<Vec<u8>> {
        let reader = self.cat_reader(path, offset, length, abort).await?;
        Ok(reader.read_to_end().await?)
    }

    /// Entries of a directory. A file lists as itself.
    pub async fn ls(&self, path: &str, abort: &AbortOptions) -> SdkResult<Vec<ListedEntry>> {
        let parsed = parse_ipfs_path(path)?;
        let dag = self.unixfs_dag(abort);
        let cid = resolve_path(&dag, &parsed).await?;
        let node = dag.load(&cid).await?;
        if !node.is_directory() {
            let name = parsed
                .segments
                .last()
                .cloned()
                .unwrap_or_else(|| cid.to_string());
            return Ok(vec![ListedEntry {
                name,
                cid,
                size: node.file_size(),
                kind: node.kind()?,
            }]);
        }

        let mut lister = DirectoryLister::open(dag.clone(), &cid).await?;
        let mut out = Vec::new();
        while let Some(link) = lister.next_entry().await? {
            let child = dag.load(&link.cid).await?;
            let kind = child.kind()?;
            let size = if kind.is_directory() {
                link.tsize
            } else {
                child.file_size()
            };
            out.push(ListedEntry {
                name: link.name,
                cid: link.cid,
                size,
                kind,
            });
        }
        Ok(out)
    }

    /// Export the tree under `path`, parents before their children.
    pub async fn get(&self, path: &str, abort: &AbortOptions) -> SdkResult<Vec<ExportedEntry>> {
        let parsed = parse_ipfs_path(path)?;
        let dag = self.unixfs_dag(abort);
        let cid = resolve_path(&dag, &parsed).await?;
        let name = parsed
            .segments
            .last()
            .cloned()
            .unwrap_or_else(|| cid.to_string());

        let mut out = Vec::new();
        let mut pending = vec![(name, cid)];
        while let Some((path, cid)) = pending.pop() {
            dag.abort().check()?;
            let node = dag.load(&cid).await?;
            let kind = node.kind()?;
            let content = if kind.is_directory() {
                let children = DirectoryLister::open(dag.clone(), &cid)
                    .await?
                    .collect()
                    .await?;
                // Reversed so the stack pops them in listing order.
                for child in children.into_iter().rev() {
                    pending.push((format!("{path}/{}", child.name), child.cid));
                }
                None
            } else if kind == NodeKind::Symlink {
                node.data().and_then(|d| d.data.clone()).map(Bytes::from)
            } else {
                Some(Bytes::from(dag.cat(&cid, 0, None).await?))
            };
            out.push(ExportedEntry {
                path,
                cid,
                kind,
                content,
                mode: node.mode(),
                mtime: node.mtime(),
            });
        }
        Ok(out)
    }
}

fn pin_options(abort: &AbortOptions) -> PinAddOptions {
    PinAddOptions {
        abort: abort.clone(),
        ..PinAddOptions::recursive()
    }
}

fn is_top_level(entry: &ImportedEntry, opts: &AddOptions) -> bool {
    if opts.wrap_with_directory {
        entry.path.is_empty()
    } else {
        !entry.path.contains('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagfs_pin::PinStatus;
    use dagfs_types::ErrorKind;

    async fn node() -> Node {
        Node::in_memory().await.unwrap()
    }

    fn tree() -> Vec<ImportEntry> {
        vec![
            ImportEntry::file("docs/readme.md", "# readme"),
            ImportEntry::file("docs/guide/intro.txt", "intro"),
            ImportEntry::directory("docs/empty"),
            ImportEntry::file("notes.txt", "notes"),
        ]
    }

    // -----------------------------------------------------------------------
    // add
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn add_pins_by_default() {
        let node = node().await;
        let added = node.add("hello world", &AddOptions::default()).await.unwrap();
        let status = node
            .pinner()
            .is_pinned(&added.cid, &AbortOptions::new())
            .await
            .unwrap();
        assert_eq!(status, Some(PinStatus::Recursive));
        let data = node
            .cat(&added.cid.to_string(), 0, None, &AbortOptions::new())
            .await
            .unwrap();
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn add_unpinned() {
        let node = node().await;
        let added = node.add("loose", &AddOptions::unpinned()).await.unwrap();
        assert!(node.pinner().snapshot().is_empty());
        assert!(node.blocks().has_local(&added.cid).unwrap());
    }

    #[tokio::test]
    async fn add_is_deterministic() {
        let node = node().await;
        let a = node.add("same", &AddOptions::default()).await.unwrap();
        let b = node.add("same", &AddOptions::default()).await.unwrap();
        assert_eq!(a.cid, b.cid);
        assert_eq!(node.pinner().snapshot().len(), 1);
    }

    #[tokio::test]
    async fn add_v1_uses_v1_cids() {
        let node = node().await;
        let added = node
            .add(
                "v1",
                &AddOptions::default()
                    .with_cid_version(CidVersion::V1)
                    .with_raw_leaves(true),
            )
            .await
            .unwrap();
        assert_eq!(dagfs_types::cid_version(&added.cid), CidVersion::V1);
    }

    #[tokio::test]
    async fn add_all_pins_top_level_only() {
        let node = node().await;
        let out = node.add_all(tree(), &AddOptions::default()).await.unwrap();
        let pins = node.pinner().recursive_roots();
        assert_eq!(pins.len(), 2);
        let docs = out.iter().find(|e| e.path == "docs").unwrap();
        assert!(pins.iter().any(|c| dagfs_types::cid_equivalent(c, &docs.cid)));

        let guide = out.iter().find(|e| e.path == "docs/guide").unwrap();
        let status = node
            .pinner()
            .is_pinned(&guide.cid, &AbortOptions::new())
            .await
            .unwrap();
        assert!(matches!(status, Some(PinStatus::Indirect { .. })));
    }

    #[tokio::test]
    async fn add_all_wrapped_pins_the_wrapper() {
        let node = node().await;
        let out = node
            .add_all(tree(), &AddOptions::default().wrapped())
            .await
            .unwrap();
        let wrapper = out.last().unwrap();
        assert_eq!(wrapper.path, "");
        assert_eq!(node.pinner().recursive_roots().len(), 1);

        let text = node
            .cat(
                &format!("/ipfs/{}/docs/guide/intro.txt", wrapper.cid),
                0,
                None,
                &AbortOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(text, b"intro");
    }

    // -----------------------------------------------------------------------
    // export
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cat_ranges_and_past_end() {
        let node = node().await;
        let added = node.add("0123456789", &AddOptions::default()).await.unwrap();
        let path = format!("/ipfs/{}", added.cid);
        let abort = AbortOptions::new();
        assert_eq!(node.cat(&path, 2, Some(3), &abort).await.unwrap(), b"234");
        assert!(node.cat(&path, 50, None, &abort).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cat_directory_fails() {
        let node = node().await;
        let out = node.add_all(tree(), &AddOptions::default()).await.unwrap();
        let docs = out.iter().find(|e| e.path == "docs").unwrap();
        let err = node
            .cat(&docs.cid.to_string(), 0, None, &AbortOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IsADirectory);
    }

    #[tokio::test]
    async fn ls_reports_types_and_sizes() {
        let node = node().await;
        let out = node.add_all(tree(), &AddOptions::default()).await.unwrap();
        let docs = out.iter().find(|e| e.path == "docs").unwrap();
        let entries = node
            .ls(&docs.cid.to_string(), &AbortOptions::new())
            .await
            .unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["empty", "guide", "readme.md"]);
        let readme = &entries[2];
        assert_eq!(readme.size, 8);
        assert!(!readme.kind.is_directory());
        assert!(entries[0].kind.is_directory());
    }

    #[tokio::test]
    async fn ls_of_file_is_the_file() {
        let node = node().await;
        let out = node.add_all(tree(), &AddOptions::default()).await.unwrap();
        let docs = out.iter().find(|e| e.path == "docs").unwrap();
        let entries = node
            .ls(&format!("{}/readme.md", docs.cid), &AbortOptions::new())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "readme.md");
    }

    #[tokio::test]
    async fn get_exports_parents_first() {
        let node = node().await;
        let out = node.add_all(tree(), &AddOptions::default()).await.unwrap();
        let docs = out.iter().find(|e| e.path == "docs").unwrap();
        let exported = node
            .get(&docs.cid.to_string(), &AbortOptions::new())
            .await
            .unwrap();
        let root = docs.cid.to_string();
        let paths: Vec<String> = exported.iter().map(|e| e.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                root.clone(),
                format!("{root}/empty"),
                format!("{root}/guide"),
                format!("{root}/guide/intro.txt"),
                format!("{root}/readme.md"),
            ]
        );
        let intro = &exported[3];
        assert_eq!(intro.content.as_deref(), Some(&b"intro"[..]));
        assert!(exported[0].content.is_none());
    }

    #[tokio::test]
    async fn missing_path_is_not_found() {
        let node = node().await;
        let added = node.add("x", &AddOptions::default()).await.unwrap();
        let out = node.add_all(tree(), &AddOptions::default()).await.unwrap();
        let docs = out.iter().find(|e| e.path == "docs").unwrap();
        let err = node
            .resolve_path(&format!("/ipfs/{}/nope", docs.cid), &AbortOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            node.resolve_path(&added.cid.to_string(), &AbortOptions::new())
                .await
                .unwrap(),
            added.cid
        );
    }
}
