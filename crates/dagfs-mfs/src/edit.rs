//! Mutations. Each call opens an [`Edit`], which takes the write lock,
//! works on a private copy of the root CID, and repoints the shared root
//! only when every step succeeded.

use dagfs_codec::UnixFsData;
use dagfs_store::{AbortOptions, WriterGuard};
use dagfs_types::{Cid, Mtime};
use dagfs_unixfs::{Dag, DirLink, MetadataUpdate, UnixFsError};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::MutexGuard;

use crate::chmod::ModeSpec;
use crate::error::{FilesError, FilesResult};
use crate::files::{Content, Files};
use crate::options::{
    ChmodOptions, CpOptions, Layout, MkdirOptions, MvOptions, RmOptions, TouchOptions, WriteOptions,
};
use crate::path::{display, FilesPath};

struct Edit<'a> {
    files: &'a Files,
    dag: Dag,
    root: Cid,
    threshold: usize,
    _gc: WriterGuard,
    _write: MutexGuard<'a, ()>,
}

impl<'a> Edit<'a> {
    async fn begin(files: &'a Files, layout: &Layout, abort: &AbortOptions) -> FilesResult<Edit<'a>> {
        let (gc, write) = abort.run(async { Ok::<_, FilesError>(files.lock().await) }).await?;
        Ok(Edit {
            files,
            dag: files.dag(layout, abort),
            root: files.root(),
            threshold: files.threshold(layout),
            _gc: gc,
            _write: write,
        })
    }

    /// The root followed by each directory in `dirs`. Missing directories
    /// are created empty when `parents` is set; they get linked in by the
    /// next [`Edit::replace`].
    async fn trail(&self, dirs: &[String], parents: bool) -> FilesResult<Vec<Cid>> {
        let mut trail = Vec::with_capacity(dirs.len() + 1);
        let mut current = self.root;
        trail.push(current);
        for (i, name) in dirs.iter().enumerate() {
            current = match self.dag.dir_lookup(&current, name).await? {
                Some(link) => {
                    if !self.dag.load(&link.cid).await?.is_directory() {
                        return Err(FilesError::NotADirectory(display(&dirs[..=i])));
                    }
                    link.cid
                }
                None if parents => self.dag.empty_directory(None, None).await?.0,
                None => return Err(FilesError::DoesNotExist(display(&dirs[..=i]))),
            };
            trail.push(current);
        }
        Ok(trail)
    }

    /// Install `updated` as the new version of the last directory in
    /// `dirs`, rewriting every ancestor up to the root.
    async fn replace(&mut self, dirs: &[String], trail: &[Cid], updated: (Cid, u64)) -> FilesResult<()> {
        let (mut cid, mut tsize) = updated;
        for i in (0..dirs.len()).rev() {
            let link = DirLink::new(dirs[i].clone(), cid, tsize);
            (cid, tsize) = self.dag.dir_insert(&trail[i], link, true, self.threshold).await?;
        }
        self.root = cid;
        Ok(())
    }

    /// Link `entry` into the last directory of `dirs`.
    async fn insert(
        &mut self,
        dirs: &[String],
        trail: &[Cid],
        entry: DirLink,
        overwrite: bool,
    ) -> FilesResult<()> {
        let parent = trail.last().copied().unwrap_or(self.root);
        let path = display(&[dirs, &[entry.name.clone()]].concat());
        let updated = self
            .dag
            .dir_insert(&parent, entry, overwrite, self.threshold)
            .await
            .map_err(|e| at_path(e, path))?;
        self.replace(dirs, trail, updated).await
    }

    /// Swap in a rewritten node at `segments`, or a new root when empty.
    async fn replace_at(&mut self, segments: &[String], node: (Cid, u64)) -> FilesResult<()> {
        match segments.split_last() {
            None => {
                self.root = node.0;
                Ok(())
            }
            Some((name, dirs)) => {
                let trail = self.trail(dirs, false).await?;
                self.insert(dirs, &trail, DirLink::new(name.clone(), node.0, node.1), true)
                    .await
            }
        }
    }

    async fn lookup(&self, segments: &[String]) -> FilesResult<Cid> {
        Files::resolve_in(&self.dag, self.root, &FilesPath::Mfs(segments.to_vec())).await
    }

    async fn remove(&mut self, segments: &[String], recursive: bool) -> FilesResult<()> {
        let Some((name, dirs)) = segments.split_last() else {
            return Err(FilesError::CannotRemoveRoot);
        };
        let trail = self.trail(dirs, false).await?;
        let parent = trail[trail.len() - 1];
        let Some(link) = self.dag.dir_lookup(&parent, name).await? else {
            return Err(FilesError::DoesNotExist(display(segments)));
        };
        if !recursive {
            let node = self.dag.load(&link.cid).await?;
            if node.is_directory() && !node.links().is_empty() {
                return Err(FilesError::NotEmpty(display(segments)));
            }
        }
        let updated = self
            .dag
            .dir_remove(&parent, name)
            .await
            .map_err(|e| at_path(e, display(segments)))?;
        self.replace(dirs, &trail, updated).await
    }

    async fn copy(&mut self, sources: &[FilesPath], dest: &[String], parents: bool) -> FilesResult<()> {
        let mut links = Vec::with_capacity(sources.len());
        for source in sources {
            let cid = Files::resolve_in(&self.dag, self.root, source).await?;
            let name = source.basename().ok_or_else(|| {
                FilesError::InvalidArgument("cannot copy the root directory".into())
            })?;
            let tsize = self.dag.load(&cid).await?.cumulative_size();
            links.push(DirLink::new(name, cid, tsize));
        }

        match self.lookup(dest).await {
            Ok(existing) => {
                if !self.dag.load(&existing).await?.is_directory() {
                    return Err(FilesError::AlreadyExists(display(dest)));
                }
                let trail = self.trail(dest, false).await?;
                self.fill(dest, &trail, links).await
            }
            Err(FilesError::DoesNotExist(_)) if links.len() == 1 => {
                let Some((name, dirs)) = dest.split_last() else {
                    return Err(FilesError::DoesNotExist(display(dest)));
                };
                let trail = self.trail(dirs, parents).await?;
                let mut link = links.remove(0);
                link.name = name.clone();
                self.insert(dirs, &trail, link, false).await
            }
            Err(FilesError::DoesNotExist(_)) if parents => {
                let trail = self.trail(dest, true).await?;
                self.fill(dest, &trail, links).await
            }
            Err(e) => Err(e),
        }
    }

    /// Add `links` to the directory at the end of `trail`.
    async fn fill(&mut self, dest: &[String], trail: &[Cid], links: Vec<DirLink>) -> FilesResult<()> {
        let mut updated = (trail[trail.len() - 1], 0);
        for link in links {
            let path = display(&[dest, &[link.name.clone()]].concat());
            updated = self
                .dag
                .dir_insert(&updated.0, link, false, self.threshold)
                .await
                .map_err(|e| at_path(e, path))?;
        }
        self.replace(dest, trail, updated).await
    }

    /// Rewrite the mode of `cid` and, when `recursive`, of everything
    /// below it. Unchanged subtrees keep their CID.
    fn chmod_tree<'b>(
        &'b self,
        cid: Cid,
        spec: &'b ModeSpec,
        recursive: bool,
    ) -> BoxFuture<'b, FilesResult<(Cid, u64, bool)>> {
        async move {
            let node = self.dag.load(&cid).await?;
            let is_dir = node.kind()?.is_directory();
            let current = node.mode();
            let mode = spec.apply(current, is_dir);

            let mut target = cid;
            let mut changed = false;
            if recursive && is_dir {
                for entry in self.dag.dir_entries(&cid).await? {
                    let (child, tsize, child_changed) =
                        self.chmod_tree(entry.cid, spec, true).await?;
                    if child_changed {
                        let link = DirLink::new(entry.name, child, tsize);
                        target = self.dag.dir_insert(&target, link, true, usize::MAX).await?.0;
                        changed = true;
                    }
                }
            }
            if !changed && mode == current {
                return Ok((cid, node.cumulative_size(), false));
            }
            let update = MetadataUpdate {
                mode: Some(mode),
                mtime: node.mtime(),
            };
            let (cid, tsize) = self.dag.set_metadata(&target, update).await?;
            Ok((cid, tsize, true))
        }
        .boxed()
    }

    fn finish(self) -> FilesResult<()> {
        self.files.swap_root(self.root)
    }
}

fn at_path(err: UnixFsError, path: String) -> FilesError {
    match err {
        UnixFsError::AlreadyExists(_) => FilesError::AlreadyExists(path),
        UnixFsError::NoSuchEntry(_) => FilesError::DoesNotExist(path),
        e => e.into(),
    }
}

fn parse_all<S: AsRef<str>>(paths: &[S]) -> FilesResult<Vec<Vec<String>>> {
    paths.iter().map(|p| FilesPath::parse_mfs(p.as_ref())).collect()
}

impl Files {
    /// Write `content` into the file at `path`.
    pub async fn write(
        &self,
        path: &str,
        content: impl Into<Content>,
        opts: &WriteOptions,
    ) -> FilesResult<()> {
        let mut segments = FilesPath::parse_mfs(path)?;
        let Some(name) = segments.pop() else {
            return Err(FilesError::IsADirectory(path.to_string()));
        };
        let data = content.into().collect(opts.length, &opts.abort).await?;
        if opts.offset.checked_add(data.len() as u64).is_none() {
            return Err(FilesError::InvalidArgument(format!(
                "offset {} is too large",
                opts.offset
            )));
        }

        let mut edit = Edit::begin(self, &opts.layout, &opts.abort).await?;
        let trail = edit.trail(&segments, opts.parents).await?;
        let parent = trail[trail.len() - 1];
        let (base, mode, had_mtime) = match edit.dag.dir_lookup(&parent, &name).await? {
            None if !opts.create => return Err(FilesError::DoesNotExist(path.to_string())),
            None => (None, None, false),
            Some(link) => {
                let node = edit.dag.load(&link.cid).await?;
                if node.is_directory() {
                    return Err(FilesError::IsADirectory(path.to_string()));
                }
                let mode = node.data().and_then(UnixFsData::explicit_mode);
                let base = (!opts.truncate).then_some(link.cid);
                (base, mode, node.mtime().is_some())
            }
        };

        let mode = opts.mode.or(mode);
        let mtime = opts.mtime.or_else(|| had_mtime.then(Mtime::now));
        let file_opts = self.file_options(&opts.layout, mode, mtime);
        let built = edit
            .dag
            .overwrite_file(base.as_ref(), opts.offset, &data, &file_opts)
            .await?;
        edit.insert(&segments, &trail, DirLink::new(name, built.cid, built.tsize), true)
            .await?;
        edit.finish()
    }

    pub async fn mkdir(&self, path: &str, opts: &MkdirOptions) -> FilesResult<()> {
        let segments = FilesPath::parse_mfs(path)?;
        let Some((name, dirs)) = segments.split_last() else {
            return if opts.parents {
                Ok(())
            } else {
                Err(FilesError::AlreadyExists("/".into()))
            };
        };

        let mut edit = Edit::begin(self, &opts.layout, &opts.abort).await?;
        let trail = edit.trail(dirs, opts.parents).await?;
        if let Some(link) = edit.dag.dir_lookup(&trail[trail.len() - 1], name).await? {
            if opts.parents && edit.dag.load(&link.cid).await?.is_directory() {
                return Ok(());
            }
            return Err(FilesError::AlreadyExists(path.to_string()));
        }
        let (cid, tsize) = edit.dag.empty_directory(opts.mode, opts.mtime).await?;
        edit.insert(dirs, &trail, DirLink::new(name.clone(), cid, tsize), false)
            .await?;
        edit.finish()
    }

    /// Remove every path in `paths`, or none of them.
    pub async fn rm<S: AsRef<str>>(&self, paths: &[S], opts: &RmOptions) -> FilesResult<()> {
        if paths.is_empty() {
            return Err(FilesError::InvalidArgument(
                "please supply at least one path to remove".into(),
            ));
        }
        let targets = parse_all(paths)?;
        if targets.iter().any(Vec::is_empty) {
            return Err(FilesError::CannotRemoveRoot);
        }
        let mut edit = Edit::begin(self, &opts.layout, &opts.abort).await?;
        for target in &targets {
            edit.remove(target, opts.recursive).await?;
        }
        edit.finish()
    }

    /// Copy `sources` into `dest`. Sources may be `/ipfs/` paths.
    ///
    /// An existing directory receives every source under its own name. A
    /// missing destination becomes the copy of a single source, or a new
    /// directory holding several when `parents` is set.
    pub async fn cp<S: AsRef<str>>(&self, sources: &[S], dest: &str, opts: &CpOptions) -> FilesResult<()> {
        if sources.is_empty() || dest.is_empty() {
            return Err(FilesError::InvalidArgument(
                "please supply at least one source".into(),
            ));
        }
        let sources = sources
            .iter()
            .map(|s| FilesPath::parse(s.as_ref()))
            .collect::<FilesResult<Vec<_>>>()?;
        let dest = FilesPath::parse_mfs(dest)?;

        let mut edit = Edit::begin(self, &opts.layout, &opts.abort).await?;
        edit.copy(&sources, &dest, opts.parents).await?;
        edit.finish()
    }

    /// Copy then remove, as one change.
    pub async fn mv<S: AsRef<str>>(&self, sources: &[S], dest: &str, opts: &MvOptions) -> FilesResult<()> {
        if sources.is_empty() || dest.is_empty() {
            return Err(FilesError::InvalidArgument(
                "please supply at least one source".into(),
            ));
        }
        let sources = parse_all(sources)?;
        let dest = FilesPath::parse_mfs(dest)?;
        for source in &sources {
            if source.is_empty() {
                return Err(FilesError::InvalidArgument("cannot move the root directory".into()));
            }
            if dest.starts_with(source) {
                return Err(FilesError::InvalidArgument(format!(
                    "cannot move {} into itself",
                    display(source)
                )));
            }
        }

        let mut edit = Edit::begin(self, &opts.layout, &opts.abort).await?;
        let from: Vec<FilesPath> = sources.iter().cloned().map(FilesPath::Mfs).collect();
        edit.copy(&from, &dest, opts.parents).await?;
        for source in &sources {
            edit.remove(source, true).await?;
        }
        edit.finish()
    }

    /// Change permission bits, numerically or symbolically.
    pub async fn chmod(&self, path: &str, mode: &ModeSpec, opts: &ChmodOptions) -> FilesResult<()> {
        let segments = FilesPath::parse_mfs(path)?;
        let mut edit = Edit::begin(self, &opts.layout, &opts.abort).await?;
        let target = edit.lookup(&segments).await?;
        let (cid, tsize, changed) = edit.chmod_tree(target, mode, opts.recursive).await?;
        if !changed {
            return Ok(());
        }
        edit.replace_at(&segments, (cid, tsize)).await?;
        edit.finish()
    }

    /// Set the mtime of `path`, creating an empty file if it is missing.
    pub async fn touch(&self, path: &str, opts: &TouchOptions) -> FilesResult<()> {
        let segments = FilesPath::parse_mfs(path)?;
        let mtime = opts.mtime.unwrap_or_else(Mtime::now);
        let mut edit = Edit::begin(self, &opts.layout, &opts.abort).await?;
        let node = match edit.lookup(&segments).await {
            Ok(cid) => edit.dag.set_metadata(&cid, MetadataUpdate::mtime(mtime)).await?,
            Err(FilesError::DoesNotExist(_)) if !segments.is_empty() => {
                let file_opts = self.file_options(&opts.layout, None, Some(mtime));
                let built = edit.dag.add_bytes(&[], &file_opts).await?;
                (built.cid, built.tsize)
            }
            Err(e) => return Err(e),
        };
        edit.replace_at(&segments, node).await?;
        edit.finish()
    }
}
