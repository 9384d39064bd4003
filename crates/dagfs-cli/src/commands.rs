use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use base64::Engine;
use colored::Colorize;
use dagfs_codec::from_ipld;
use dagfs_sdk::{
    parse_cid, AbortOptions, AddOptions, BlockPutOptions, BlockRmOptions, ChmodOptions, Cid,
    CidVersion, Codec, CpOptions, DagGetOptions, DagPutOptions, HashAlg, ImportEntry, Layout,
    MkdirOptions, ModeSpec, Mtime, MvOptions, Node, NodeConfig, NodeKind, ObjectTemplate,
    PinAddOptions, PinFilter, ReadOptions, RmOptions, StatOptions, TouchOptions, WriteOptions,
};
use dagfs_types::format_mode;
use serde::Serialize;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cli::*;

struct Session {
    repo: PathBuf,
    format: OutputFormat,
}

impl Session {
    async fn open(&self) -> anyhow::Result<Node> {
        debug!(repo = %self.repo.display(), "opening repository");
        Ok(Node::open_repo(&self.repo).await?)
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Print `value` as JSON, or run `text` for the human-readable form.
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        if self.json() {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text();
        }
        Ok(())
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let ctx = Session {
        repo: PathBuf::from(&cli.repo),
        format: cli.format,
    };
    match cli.command {
        Command::Init(args) => cmd_init(&ctx, args).await,
        Command::Add(args) => cmd_add(&ctx, args).await,
        Command::Cat(args) => cmd_cat(&ctx, args).await,
        Command::Ls(args) => cmd_ls(&ctx, args).await,
        Command::Get(args) => cmd_get(&ctx, args).await,
        Command::Block { action } => cmd_block(&ctx, action).await,
        Command::Dag { action } => cmd_dag(&ctx, action).await,
        Command::Object { action } => cmd_object(&ctx, action).await,
        Command::Files { action } => cmd_files(&ctx, action).await,
        Command::Pin { action } => cmd_pin(&ctx, action).await,
        Command::Repo {
            action: RepoAction::Gc,
        } => cmd_repo_gc(&ctx).await,
    }
}

// ---------------------------------------------------------------------------
// Top-level commands
// ---------------------------------------------------------------------------

async fn cmd_init(ctx: &Session, args: InitArgs) -> anyhow::Result<()> {
    let mut config = NodeConfig::default();
    config.unixfs.cid_version = CidVersion::try_from(args.cid_version)?;
    config.unixfs.raw_leaves = args.raw_leaves;
    config.offline = args.offline;
    let node = Node::init(&ctx.repo, config).await?;
    let root = node.files().root();
    ctx.emit(
        &json!({ "repo": ctx.repo, "root": root.to_string() }),
        || {
            println!(
                "{} Initialized dagfs repository in {}",
                "✓".green().bold(),
                ctx.repo.display().to_string().bold()
            );
            println!("  Files root: {}", root.to_string().cyan());
        },
    )
}

async fn cmd_add(ctx: &Session, args: AddArgs) -> anyhow::Result<()> {
    let node = ctx.open().await?;
    let opts = AddOptions {
        pin: !args.no_pin,
        wrap_with_directory: args.wrap_with_directory,
        cid_version: args.cid_version.map(CidVersion::try_from).transpose()?,
        raw_leaves: args.raw_leaves,
        chunk_size: args.chunk_size,
        shard_split_threshold: args.shard_split_threshold,
        ..AddOptions::default()
    };

    let added = if args.paths.is_empty() {
        vec![node.add(read_input(None).await?, &opts).await?]
    } else {
        let mut entries = Vec::new();
        for path in &args.paths {
            entries.extend(collect_entries(Path::new(path), args.recursive)?);
        }
        node.add_all(entries, &opts).await?
    };

    ctx.emit(&added, || {
        if args.quiet {
            if let Some(last) = added.last() {
                println!("{}", last.cid);
            }
            return;
        }
        for entry in &added {
            println!("{} {} {}", "added".green(), entry.cid.to_string().cyan(), entry.path);
        }
    })
}

/// Import entries for a local path, named relative to its parent.
fn collect_entries(path: &Path, recursive: bool) -> anyhow::Result<Vec<ImportEntry>> {
    let path = path
        .canonicalize()
        .with_context(|| format!("cannot read {}", path.display()))?;
    let Some(base) = path.parent() else {
        bail!("cannot import the file system root");
    };
    if path.is_dir() && !recursive {
        bail!("{} is a directory, use -r to import it", path.display());
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(&path).sort_by_file_name() {
        let entry = entry?;
        let name = entry
            .path()
            .strip_prefix(base)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let file_type = entry.file_type();
        if file_type.is_dir() {
            out.push(ImportEntry::directory(name));
        } else if file_type.is_file() {
            let content = std::fs::read(entry.path())
                .with_context(|| format!("cannot read {}", entry.path().display()))?;
            out.push(ImportEntry::file(name, content));
        } else {
            warn!(path = %entry.path().display(), "skipping entry that is not a file or directory");
        }
    }
    Ok(out)
}

async fn cmd_cat(ctx: &Session, args: CatArgs) -> anyhow::Result<()> {
    let node = ctx.open().await?;
    let data = node
        .cat(&args.path, args.offset, args.length, &AbortOptions::new())
        .await?;
    write_stdout(&data)
}

async fn cmd_ls(ctx: &Session, args: LsArgs) -> anyhow::Result<()> {
    let node = ctx.open().await?;
    let entries = node.ls(&args.path, &AbortOptions::new()).await?;
    ctx.emit(&entries, || {
        for entry in &entries {
            let name = if entry.kind.is_directory() {
                format!("{}/", entry.name).blue().bold()
            } else {
                entry.name.normal()
            };
            println!("{} {:>10} {}", entry.cid, entry.size, name);
        }
    })
}

async fn cmd_get(ctx: &Session, args: GetArgs) -> anyhow::Result<()> {
    let node = ctx.open().await?;
    let entries = node.get(&args.path, &AbortOptions::new()).await?;
    let first = entries.first().context("nothing to export")?;
    let out = PathBuf::from(args.output.unwrap_or_else(|| first.path.clone()));

    for entry in &entries {
        let relative = entry.path.split_once('/').map_or("", |(_, rest)| rest);
        let target = if relative.is_empty() {
            out.clone()
        } else {
            out.join(relative)
        };
        match entry.kind {
            kind if kind.is_directory() => std::fs::create_dir_all(&target)?,
            NodeKind::Symlink => write_symlink(entry.content.as_deref().unwrap_or_default(), &target)?,
            _ => std::fs::write(&target, entry.content.as_deref().unwrap_or_default())
                .with_context(|| format!("cannot write {}", target.display()))?,
        }
    }
    if !ctx.json() {
        println!(
            "{} Saved {} to {}",
            "✓".green().bold(),
            args.path,
            out.display().to_string().bold()
        );
    }
    Ok(())
}

#[cfg(unix)]
fn write_symlink(target: &[u8], link: &Path) -> anyhow::Result<()> {
    let target = String::from_utf8_lossy(target).into_owned();
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_symlink(_target: &[u8], link: &Path) -> anyhow::Result<()> {
    warn!(path = %link.display(), "symlinks are not supported here, skipping");
    Ok(())
}

// ---------------------------------------------------------------------------
// block
// ---------------------------------------------------------------------------

async fn cmd_block(ctx: &Session, action: BlockAction) -> anyhow::Result<()> {
    let node = ctx.open().await?;
    let abort = AbortOptions::new();
    match action {
        BlockAction::Put {
            file,
            codec,
            mhtype,
            cid_version,
            pin,
        } => {
            let mut opts = BlockPutOptions::default()
                .with_codec(codec.parse::<Codec>()?)
                .with_hash_alg(mhtype.parse::<HashAlg>()?);
            if let Some(version) = cid_version {
                opts = opts.with_cid_version(CidVersion::try_from(version)?);
            }
            if pin {
                opts = opts.pinned();
            }
            let data = read_input(file.as_deref()).await?;
            let size = data.len();
            let cid = node.block().put(data, &opts).await?;
            ctx.emit(&json!({ "Key": cid.to_string(), "Size": size }), || {
                println!("{cid}")
            })
        }
        BlockAction::Get { cid } => {
            let data = node.block().get(&cid_arg(&cid)?, &abort).await?;
            write_stdout(&data)
        }
        BlockAction::Stat { cid } => {
            let stat = node.block().stat(&cid_arg(&cid)?, &abort).await?;
            ctx.emit(
                &json!({ "Key": stat.cid.to_string(), "Size": stat.size }),
                || {
                    println!("Key: {}", stat.cid.to_string().cyan());
                    println!("Size: {}", stat.size);
                },
            )
        }
        BlockAction::Rm { cids, force } => {
            let cids = cids_arg(&cids)?;
            let opts = BlockRmOptions {
                force,
                ..BlockRmOptions::default()
            };
            let results = node.block().rm(&cids, &opts).await;
            let mut failed = 0;
            let mut report = Vec::new();
            for (cid, result) in &results {
                match result {
                    Ok(()) => {
                        report.push(json!({ "Hash": cid.to_string() }));
                        if !ctx.json() {
                            println!("removed {}", cid.to_string().cyan());
                        }
                    }
                    Err(err) => {
                        failed += 1;
                        report.push(json!({ "Hash": cid.to_string(), "Error": err.to_string() }));
                        if !ctx.json() {
                            eprintln!("{} cannot remove {cid}: {err}", "error:".red().bold());
                        }
                    }
                }
            }
            if ctx.json() {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            if failed > 0 {
                bail!("{failed} of {} blocks could not be removed", results.len());
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// dag
// ---------------------------------------------------------------------------

async fn cmd_dag(ctx: &Session, action: DagAction) -> anyhow::Result<()> {
    let node = ctx.open().await?;
    match action {
        DagAction::Put {
            file,
            store_codec,
            input_codec,
            hash,
            cid_version,
            pin,
        } => {
            let mut opts = DagPutOptions::default()
                .with_store_codec(store_codec.parse()?)
                .with_input_codec(input_codec.parse()?)
                .with_hash_alg(hash.parse()?);
            if let Some(version) = cid_version {
                opts = opts.with_cid_version(CidVersion::try_from(version)?);
            }
            if pin {
                opts = opts.pinned();
            }
            let data = read_input(file.as_deref()).await?;
            let cid = node.dag().put_bytes(&data, &opts).await?;
            ctx.emit(&json!({ "Cid": cid.to_string() }), || println!("{cid}"))
        }
        DagAction::Get { reference, local } => {
            let reference = reference.trim_start_matches("/ipfs/");
            let (cid, path) = reference.split_once('/').unwrap_or((reference, ""));
            let mut opts = DagGetOptions::at(path);
            opts.local_resolve = local;
            let got = node.dag().get(&cid_arg(cid)?, &opts).await?;
            if !got.remainder_path.is_empty() {
                warn!(remainder = %got.remainder_path, "path not fully resolved");
            }
            let mut encoded = from_ipld(Codec::DagJson, &got.value)?;
            encoded.push(b'\n');
            write_stdout(&encoded)
        }
        DagAction::Resolve { path } => {
            let res = node.dag().resolve(&path, &AbortOptions::new()).await?;
            ctx.emit(&res, || {
                if res.remainder_path.is_empty() {
                    println!("{}", res.cid);
                } else {
                    println!("{}/{}", res.cid, res.remainder_path);
                }
            })
        }
    }
}

// ---------------------------------------------------------------------------
// object
// ---------------------------------------------------------------------------

async fn cmd_object(ctx: &Session, action: ObjectAction) -> anyhow::Result<()> {
    let node = ctx.open().await?;
    let objects = node.object();
    let abort = AbortOptions::new();
    match action {
        ObjectAction::New { template } => {
            let cid = objects.create(template.parse::<ObjectTemplate>()?).await?;
            print_cid(ctx, &cid)
        }
        ObjectAction::Get { cid } => {
            let pb = objects.get(&cid_arg(&cid)?, &abort).await?;
            let data = pb.data.clone().unwrap_or_default();
            let links: Vec<_> = pb
                .links
                .iter()
                .map(|l| {
                    json!({
                        "Name": l.name.clone().unwrap_or_default(),
                        "Hash": l.cid.to_string(),
                        "Size": l.size.unwrap_or(0),
                    })
                })
                .collect();
            let value = json!({
                "Data": base64::engine::general_purpose::STANDARD.encode(&data),
                "Links": links,
            });
            // Text output is the same document; node data is binary.
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        ObjectAction::Data { cid } => {
            let data = objects.data(&cid_arg(&cid)?, &abort).await?;
            write_stdout(&data)
        }
        ObjectAction::Links { cid } => {
            let links = objects.links(&cid_arg(&cid)?, &abort).await?;
            let rows: Vec<_> = links
                .iter()
                .map(|l| {
                    json!({
                        "Name": l.name.clone().unwrap_or_default(),
                        "Hash": l.cid.to_string(),
                        "Size": l.size.unwrap_or(0),
                    })
                })
                .collect();
            ctx.emit(&rows, || {
                for l in &links {
                    println!(
                        "{} {:>10} {}",
                        l.cid,
                        l.size.unwrap_or(0),
                        l.name.as_deref().unwrap_or_default()
                    );
                }
            })
        }
        ObjectAction::Stat { cid } => {
            let stat = objects.stat(&cid_arg(&cid)?, &abort).await?;
            ctx.emit(&stat, || {
                println!("NumLinks:       {}", stat.num_links);
                println!("BlockSize:      {}", stat.block_size);
                println!("LinksSize:      {}", stat.links_size);
                println!("DataSize:       {}", stat.data_size);
                println!("CumulativeSize: {}", stat.cumulative_size);
            })
        }
        ObjectAction::Patch { action } => {
            let cid = match action {
                PatchAction::AddLink { cid, name, target } => {
                    objects
                        .patch_add_link(&cid_arg(&cid)?, &name, &cid_arg(&target)?, &abort)
                        .await?
                }
                PatchAction::RmLink { cid, name } => {
                    objects.patch_rm_link(&cid_arg(&cid)?, &name, &abort).await?
                }
                PatchAction::AppendData { cid, file } => {
                    let data = read_input(file.as_deref()).await?;
                    objects.patch_append_data(&cid_arg(&cid)?, &data, &abort).await?
                }
                PatchAction::SetData { cid, file } => {
                    let data = read_input(file.as_deref()).await?;
                    objects.patch_set_data(&cid_arg(&cid)?, &data, &abort).await?
                }
            };
            print_cid(ctx, &cid)
        }
    }
}

// ---------------------------------------------------------------------------
// files
// ---------------------------------------------------------------------------

async fn cmd_files(ctx: &Session, action: FilesAction) -> anyhow::Result<()> {
    let node = ctx.open().await?;
    let files = node.files();
    match action {
        FilesAction::Write {
            path,
            file,
            create,
            parents,
            offset,
            count,
            truncate,
            raw_leaves,
            cid_version,
        } => {
            let layout = Layout {
                raw_leaves,
                cid_version: cid_version.map(CidVersion::try_from).transpose()?,
                ..Layout::default()
            };
            let opts = WriteOptions {
                create,
                parents,
                offset,
                length: count,
                truncate,
                layout,
                ..WriteOptions::default()
            };
            let data = read_input(file.as_deref()).await?;
            files.write(&path, data, &opts).await?;
            Ok(())
        }
        FilesAction::Read {
            path,
            offset,
            count,
        } => {
            let data = files.read_all(&path, &ReadOptions::range(offset, count)).await?;
            write_stdout(&data)
        }
        FilesAction::Ls { path, long } => {
            let entries = files.ls(&path, &Default::default()).await?;
            ctx.emit(&entries, || {
                for entry in &entries {
                    let is_dir = entry.entry_type == "directory";
                    let name = if is_dir {
                        entry.name.blue().bold()
                    } else {
                        entry.name.normal()
                    };
                    if long {
                        println!(
                            "{} {} {:>10} {}",
                            format_mode(entry.mode, is_dir),
                            entry.cid,
                            entry.size,
                            name
                        );
                    } else {
                        println!("{name}");
                    }
                }
            })
        }
        FilesAction::Mkdir {
            path,
            parents,
            mode,
            cid_version,
            shard_split_threshold,
        } => {
            let layout = Layout {
                cid_version: cid_version.map(CidVersion::try_from).transpose()?,
                shard_split_threshold,
                ..Layout::default()
            };
            let opts = MkdirOptions {
                parents,
                mode: mode.as_deref().map(parse_octal).transpose()?,
                layout,
                ..MkdirOptions::default()
            };
            files.mkdir(&path, &opts).await?;
            Ok(())
        }
        FilesAction::Rm { paths, recursive } => {
            let opts = RmOptions {
                recursive,
                ..RmOptions::default()
            };
            files.rm(&paths, &opts).await?;
            Ok(())
        }
        FilesAction::Mv { mut paths, parents } => {
            let dest = paths.pop().context("missing destination")?;
            let opts = MvOptions {
                parents,
                ..MvOptions::default()
            };
            files.mv(&paths, &dest, &opts).await?;
            Ok(())
        }
        FilesAction::Cp { mut paths, parents } => {
            let dest = paths.pop().context("missing destination")?;
            let opts = CpOptions {
                parents,
                ..CpOptions::default()
            };
            files.cp(&paths, &dest, &opts).await?;
            Ok(())
        }
        FilesAction::Stat { path, with_local } => {
            let opts = StatOptions {
                with_local,
                ..StatOptions::default()
            };
            let stat = files.stat(&path, &opts).await?;
            ctx.emit(&stat, || {
                let is_dir = stat.entry_type == "directory";
                println!("{}", stat.cid.to_string().cyan());
                println!("Size: {}", stat.size);
                println!("CumulativeSize: {}", stat.cumulative_size);
                println!("ChildBlocks: {}", stat.blocks);
                println!("Type: {} ({})", stat.entry_type, stat.kind);
                println!("Mode: {} ({:04o})", format_mode(stat.mode, is_dir), stat.mode);
                if let Some(mtime) = &stat.mtime {
                    println!("Mtime: {mtime}");
                }
                if let (Some(local), Some(size_local)) = (stat.local, stat.size_local) {
                    let state = if local { "complete" } else { "partial" };
                    println!("Local: {size_local} of {} bytes ({state})", stat.cumulative_size);
                }
            })
        }
        FilesAction::Chmod {
            mode,
            path,
            recursive,
        } => {
            let mode: ModeSpec = mode.parse()?;
            let opts = ChmodOptions {
                recursive,
                ..ChmodOptions::default()
            };
            files.chmod(&path, &mode, &opts).await?;
            Ok(())
        }
        FilesAction::Touch { path, mtime } => {
            let opts = TouchOptions {
                mtime: mtime.map(|secs| Mtime::new(secs, 0)),
                ..TouchOptions::default()
            };
            files.touch(&path, &opts).await?;
            Ok(())
        }
        FilesAction::Flush { path } => {
            let cid = files.flush(&path).await?;
            print_cid(ctx, &cid)
        }
    }
}

// ---------------------------------------------------------------------------
// pin / repo
// ---------------------------------------------------------------------------

async fn cmd_pin(ctx: &Session, action: PinAction) -> anyhow::Result<()> {
    let node = ctx.open().await?;
    let abort = AbortOptions::new();
    match action {
        PinAction::Add { cids, direct } => {
            let opts = if direct {
                PinAddOptions::direct()
            } else {
                PinAddOptions::recursive()
            };
            let mut pins = Vec::new();
            for cid in cids_arg(&cids)? {
                pins.push(node.pin().add(&cid, &opts).await?);
            }
            ctx.emit(&pins, || {
                for pin in &pins {
                    println!("pinned {} {}", pin.cid.to_string().cyan(), pin.mode.as_str());
                }
            })
        }
        PinAction::Rm { cids, direct } => {
            let results = node.pin().rm_all(&cids_arg(&cids)?, !direct, &abort).await?;
            let mut failed = 0;
            for (cid, result) in &results {
                match result {
                    Ok(_) => println!("unpinned {}", cid.to_string().cyan()),
                    Err(err) => {
                        failed += 1;
                        eprintln!("{} {err}", "error:".red().bold());
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} of {} pins could not be removed", results.len());
            }
            Ok(())
        }
        PinAction::Ls { cids, filter } => {
            let filter = parse_filter(&filter)?;
            let entries = if cids.is_empty() {
                node.pin().ls(filter, &abort).await?
            } else {
                node.pin().ls_cids(&cids_arg(&cids)?, filter, &abort).await?
            };
            ctx.emit(&entries, || {
                for entry in &entries {
                    println!("{} {}", entry.cid, entry.status);
                }
            })
        }
    }
}

async fn cmd_repo_gc(ctx: &Session) -> anyhow::Result<()> {
    let node = ctx.open().await?;
    let report = node.repo_gc(&AbortOptions::new()).await?;
    ctx.emit(&report, || {
        for cid in &report.removed {
            println!("removed {cid}");
        }
        for err in &report.errors {
            eprintln!("{} {err}", "error:".red().bold());
        }
        println!(
            "{} GC: {} blocks removed, {} bytes freed",
            "✓".green(),
            report.removed.len(),
            report.bytes_freed
        );
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read a file, or stdin for `None` and `-`.
async fn read_input(file: Option<&str>) -> anyhow::Result<Vec<u8>> {
    match file {
        None | Some("-") => {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            Ok(buf)
        }
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("cannot read {path}")),
    }
}

fn write_stdout(data: &[u8]) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(data)?;
    out.flush()?;
    Ok(())
}

fn print_cid(ctx: &Session, cid: &Cid) -> anyhow::Result<()> {
    ctx.emit(&json!({ "Hash": cid.to_string() }), || println!("{cid}"))
}

fn cid_arg(s: &str) -> anyhow::Result<Cid> {
    parse_cid(s).with_context(|| format!("invalid CID {s:?}"))
}

fn cids_arg(args: &[String]) -> anyhow::Result<Vec<Cid>> {
    args.iter().map(|s| cid_arg(s)).collect()
}

fn parse_octal(s: &str) -> anyhow::Result<u32> {
    u32::from_str_radix(s, 8).with_context(|| format!("invalid mode {s:?}"))
}

fn parse_filter(s: &str) -> anyhow::Result<PinFilter> {
    Ok(match s {
        "all" => PinFilter::All,
        "direct" => PinFilter::Direct,
        "recursive" => PinFilter::Recursive,
        "indirect" => PinFilter::Indirect,
        other => bail!("unknown pin type {other:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octal_modes() {
        assert_eq!(parse_octal("0755").unwrap(), 0o755);
        assert_eq!(parse_octal("644").unwrap(), 0o644);
        assert!(parse_octal("9").is_err());
    }

    #[test]
    fn pin_filters() {
        assert_eq!(parse_filter("indirect").unwrap(), PinFilter::Indirect);
        assert!(parse_filter("sideways").is_err());
    }

    #[test]
    fn entries_are_named_from_the_parent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("photos");
        std::fs::create_dir_all(root.join("2024")).unwrap();
        std::fs::write(root.join("2024/a.jpg"), b"jpeg").unwrap();
        std::fs::write(root.join("b.txt"), b"text").unwrap();

        let entries = collect_entries(&root, true).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(names, vec!["photos", "photos/2024", "photos/2024/a.jpg", "photos/b.txt"]);
    }

    #[test]
    fn directories_need_recursive() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_entries(dir.path(), false).is_err());
    }

    #[tokio::test]
    async fn init_add_and_cat() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        let ctx = Session {
            repo: repo.clone(),
            format: OutputFormat::Json,
        };
        cmd_init(
            &ctx,
            InitArgs {
                cid_version: 1,
                raw_leaves: true,
                offline: true,
            },
        )
        .await
        .unwrap();

        let source = dir.path().join("hello.txt");
        std::fs::write(&source, b"hello dagfs").unwrap();
        let entries = collect_entries(&source, false).unwrap();
        let node = ctx.open().await.unwrap();
        let added = node.add_all(entries, &AddOptions::default()).await.unwrap();
        let data = node
            .cat(&added[0].cid.to_string(), 0, None, &AbortOptions::new())
            .await
            .unwrap();
        assert_eq!(data, b"hello dagfs");
    }
}
