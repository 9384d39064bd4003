//! Whole-tree import.
//!
//! Builds files and directories from a list of path entries in one pass.
//! Directories go through the same engine as incremental edits, so a
//! tree imported here has the same CIDs as one assembled entry by entry.

use std::collections::BTreeMap;

use bytes::Bytes;
use dagfs_codec::UnixFsData;
use dagfs_types::{Cid, Mtime};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dag::Dag;
use crate::directory::{validate_name, DirLink, DEFAULT_SHARD_SPLIT_THRESHOLD};
use crate::error::{UnixFsError, UnixFsResult};
use crate::file::FileOptions;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportContent {
    File(Bytes),
    Directory,
}

/// One path to import. Parent directories are created as needed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportEntry {
    pub path: String,
    pub content: ImportContent,
    pub mode: Option<u32>,
    pub mtime: Option<Mtime>,
}

impl ImportEntry {
    pub fn file(path: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            content: ImportContent::File(content.into()),
            mode: None,
            mtime: None,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: ImportContent::Directory,
            mode: None,
            mtime: None,
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
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// File layout. Per-entry metadata overrides `mode` and `mtime` here.
    pub file: FileOptions,
    pub shard_split_threshold: usize,
    /// Put everything under one extra directory, reported with path `""`.
    pub wrap_with_directory: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            file: FileOptions::default(),
            shard_split_threshold: DEFAULT_SHARD_SPLIT_THRESHOLD,
            wrap_with_directory: false,
        }
    }
}

/// A node written by the importer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedEntry {
    pub path: String,
    #[serde(with = "dagfs_types::serde_cid")]
    pub cid: Cid,
    /// Cumulative size of the subtree.
    pub size: u64,
}

enum Tree {
    File {
        content: Bytes,
        mode: Option<u32>,
        mtime: Option<Mtime>,
    },
    Dir {
        children: BTreeMap<String, Tree>,
        mode: Option<u32>,
        mtime: Option<Mtime>,
    },
}

fn empty_dir() -> Tree {
    Tree::Dir {
        children: BTreeMap::new(),
        mode: None,
        mtime: None,
    }
}

fn place(
    children: &mut BTreeMap<String, Tree>,
    path: &str,
    segments: &[&str],
    entry: ImportEntry,
) -> UnixFsResult<()> {
    let (name, rest) = match segments {
        [] => return Err(UnixFsError::InvalidPath(path.to_string())),
        [name, rest @ ..] => (*name, rest),
    };
    if !rest.is_empty() {
        return match children.entry(name.to_string()).or_insert_with(empty_dir) {
            Tree::Dir { children, .. } => place(children, path, rest, entry),
            Tree::File { .. } => Err(UnixFsError::InvalidPath(path.to_string())),
        };
    }
    match children.get_mut(name) {
        // A directory listed after its contents only adds metadata.
        Some(Tree::Dir { mode, mtime, .. }) if entry.content == ImportContent::Directory => {
            *mode = entry.mode.or(*mode);
            *mtime = entry.mtime.or(*mtime);
            return Ok(());
        }
        Some(_) => return Err(UnixFsError::AlreadyExists(path.to_string())),
        None => {}
    }
    let node = match entry.content {
        ImportContent::File(content) => Tree::File {
            content,
            mode: entry.mode,
            mtime: entry.mtime,
        },
        ImportContent::Directory => Tree::Dir {
            children: BTreeMap::new(),
            mode: entry.mode,
            mtime: entry.mtime,
        },
    };
    children.insert(name.to_string(), node);
    Ok(())
}

/// Import `entries`. Returns every written file and directory, children
/// before their parents.
pub async fn import(
    dag: &Dag,
    entries: Vec<ImportEntry>,
    opts: &ImportOptions,
) -> UnixFsResult<Vec<ImportedEntry>> {
    opts.file.validate()?;
    let mut root = BTreeMap::new();
    for entry in entries {
        let path = entry.path.clone();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for segment in &segments {
            validate_name(segment)?;
        }
        place(&mut root, &path, &segments, entry)?;
    }

    let mut out = Vec::new();
    let mut top = Vec::with_capacity(root.len());
    for (name, child) in root {
        let (cid, size) = write_tree(dag, opts, name.clone(), child, &mut out).await?;
        top.push(DirLink::new(name, cid, size));
    }
    if opts.wrap_with_directory {
        let (cid, size) = dag
            .build_directory(top, &UnixFsData::directory(), opts.shard_split_threshold)
            .await?;
        out.push(ImportedEntry {
            path: String::new(),
            cid,
            size,
        });
    }
    debug!(written = out.len(), "import finished");
    Ok(out)
}

fn write_tree<'a>(
    dag: &'a Dag,
    opts: &'a ImportOptions,
    path: String,
    tree: Tree,
    out: &'a mut Vec<ImportedEntry>,
) -> BoxFuture<'a, UnixFsResult<(Cid, u64)>> {
    async move {
        dag.abort().check()?;
        let (cid, size) = match tree {
            Tree::File {
                content,
                mode,
                mtime,
            } => {
                let layout = FileOptions {
                    mode: mode.or(opts.file.mode),
                    mtime: mtime.or(opts.file.mtime),
                    ..opts.file.clone()
                };
                let built = dag.add_bytes(&content, &layout).await?;
                (built.cid, built.tsize)
            }
            Tree::Dir {
                children,
                mode,
                mtime,
            } => {
                let mut links = Vec::with_capacity(children.len());
                for (name, child) in children {
                    let child_path = format!("{path}/{name}");
                    let (cid, size) = write_tree(dag, opts, child_path, child, out).await?;
                    links.push(DirLink::new(name, cid, size));
                }
                let header = UnixFsData::directory().with_mode(mode).with_mtime(mtime);
                dag.build_directory(links, &header, opts.shard_split_threshold)
                    .await?
            }
        };
        out.push(ImportedEntry { path, cid, size });
        Ok((cid, size))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::path::{resolve_path, IpfsPath};
    use dagfs_store::BlockService;

    fn dag() -> Dag {
        Dag::new(BlockService::in_memory())
    }

    #[tokio::test]
    async fn single_file() {
        let dag = dag();
        let out = import(&dag, vec![ImportEntry::file("a.txt", "hello")], &ImportOptions::default())
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, "a.txt");
        assert_eq!(dag.cat(&out[0].cid, 0, None).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn nested_tree_with_wrapper() {
        let dag = dag();
        let opts = ImportOptions {
            wrap_with_directory: true,
            ..ImportOptions::default()
        };
        let out = import(
            &dag,
            vec![
                ImportEntry::file("dir/b.txt", "b"),
                ImportEntry::file("dir/sub/c.txt", "c"),
                ImportEntry::file("a.txt", "a"),
            ],
            &opts,
        )
        .await
        .unwrap();

        let paths: Vec<&str> = out.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["a.txt", "dir/b.txt", "dir/sub/c.txt", "dir/sub", "dir", ""]
        );
        let root = out.last().unwrap().cid;
        let path = IpfsPath::new(root).join("dir").join("sub").join("c.txt");
        let file = resolve_path(&dag, &path).await.unwrap();
        assert_eq!(dag.cat(&file, 0, None).await.unwrap(), b"c");
    }

    #[tokio::test]
    async fn directory_metadata_applies_to_implicit_parent() {
        let dag = dag();
        let out = import(
            &dag,
            vec![
                ImportEntry::file("d/x", "x"),
                ImportEntry::directory("d").with_mode(0o700),
            ],
            &ImportOptions::default(),
        )
        .await
        .unwrap();
        let dir = out.iter().find(|e| e.path == "d").unwrap();
        assert_eq!(dag.load(&dir.cid).await.unwrap().mode(), 0o700);
    }

    #[tokio::test]
    async fn duplicate_paths_conflict() {
        let err = import(
            &dag(),
            vec![ImportEntry::file("a", "1"), ImportEntry::file("a", "2")],
            &ImportOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UnixFsError::AlreadyExists(_)));

        let err = import(
            &dag(),
            vec![ImportEntry::file("a", "1"), ImportEntry::file("a/b", "2")],
            &ImportOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UnixFsError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn import_matches_incremental_shard() {
        let dag = dag();
        let opts = ImportOptions {
            shard_split_threshold: 0,
            wrap_with_directory: true,
            ..ImportOptions::default()
        };
        let names: Vec<String> = (0..50).map(|i| format!("n{i}")).collect();
        let entries = names
            .iter()
            .map(|n| ImportEntry::file(n.clone(), n.clone().into_bytes()))
            .collect();
        let out = import(&dag, entries, &opts).await.unwrap();
        let imported = out.last().unwrap().cid;
        assert_eq!(
            dag.load(&imported).await.unwrap().kind().unwrap(),
            NodeKind::HamtShardedDirectory
        );

        let (mut dir, _) = dag.empty_directory(None, None).await.unwrap();
        for name in names.iter().rev() {
            let file = dag.add_bytes(name.as_bytes(), &opts.file).await.unwrap();
            dir = dag
                .dir_insert(&dir, DirLink::new(name.clone(), file.cid, file.tsize), false, 0)
                .await
                .unwrap()
                .0;
        }
        assert_eq!(dir, imported);
    }

    #[tokio::test]
    async fn empty_wrapped_import_is_empty_dir() {
        let dag = dag();
        let opts = ImportOptions {
            wrap_with_directory: true,
            ..ImportOptions::default()
        };
        let out = import(&dag, Vec::new(), &opts).await.unwrap();
        assert_eq!(out[0].cid.to_string(), "QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn");
    }
}
