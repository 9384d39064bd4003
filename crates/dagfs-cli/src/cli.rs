use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dagfs",
    about = "Content-addressed block store with a mutable file system on top",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository directory.
    #[arg(long, global = true, env = "DAGFS_PATH", default_value = ".dagfs")]
    pub repo: String,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new repository
    Init(InitArgs),
    /// Import files and directories
    Add(AddArgs),
    /// Print the content of a file
    Cat(CatArgs),
    /// List a directory
    Ls(LsArgs),
    /// Export a file or directory to the local disk
    Get(GetArgs),
    /// Raw block operations
    Block {
        #[command(subcommand)]
        action: BlockAction,
    },
    /// Structured IPLD values
    Dag {
        #[command(subcommand)]
        action: DagAction,
    },
    /// Low-level dag-pb nodes
    Object {
        #[command(subcommand)]
        action: ObjectAction,
    },
    /// The mutable file system
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },
    /// Protect content from garbage collection
    Pin {
        #[command(subcommand)]
        action: PinAction,
    },
    /// Repository maintenance
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },
}

#[derive(Args)]
pub struct InitArgs {
    /// CID version for new UnixFS nodes.
    #[arg(long, default_value = "0")]
    pub cid_version: u8,
    #[arg(long)]
    pub raw_leaves: bool,
    /// Never try to fetch missing blocks.
    #[arg(long)]
    pub offline: bool,
}

#[derive(Args)]
pub struct AddArgs {
    pub paths: Vec<String>,
    /// Import directories with their contents.
    #[arg(short, long)]
    pub recursive: bool,
    /// Wrap everything in one directory.
    #[arg(short, long)]
    pub wrap_with_directory: bool,
    #[arg(long)]
    pub cid_version: Option<u8>,
    #[arg(long)]
    pub raw_leaves: Option<bool>,
    #[arg(long)]
    pub chunk_size: Option<usize>,
    #[arg(long)]
    pub shard_split_threshold: Option<usize>,
    /// Do not pin the result.
    #[arg(long)]
    pub no_pin: bool,
    /// Print only the final CID.
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct CatArgs {
    pub path: String,
    #[arg(long, default_value = "0")]
    pub offset: u64,
    #[arg(short = 'l', long)]
    pub length: Option<u64>,
}

#[derive(Args)]
pub struct LsArgs {
    pub path: String,
}

#[derive(Args)]
pub struct GetArgs {
    pub path: String,
    /// Where to write the export. Defaults to the last path segment.
    #[arg(short, long)]
    pub output: Option<String>,
}

// ---------------------------------------------------------------------------
// block
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum BlockAction {
    /// Store a block read from a file or stdin
    Put {
        /// File to read; `-` or nothing for stdin.
        file: Option<String>,
        #[arg(long, default_value = "raw")]
        codec: String,
        #[arg(long, default_value = "sha2-256")]
        mhtype: String,
        #[arg(long)]
        cid_version: Option<u8>,
        #[arg(long)]
        pin: bool,
    },
    /// Write a block's bytes to stdout
    Get { cid: String },
    /// Show the size of a block
    Stat { cid: String },
    /// Delete blocks
    Rm {
        #[arg(required = true)]
        cids: Vec<String>,
        /// Delete pinned blocks and ignore missing ones.
        #[arg(short, long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// dag
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum DagAction {
    /// Store a value read from a file or stdin
    Put {
        file: Option<String>,
        #[arg(long, default_value = "dag-cbor")]
        store_codec: String,
        #[arg(long, default_value = "dag-json")]
        input_codec: String,
        #[arg(long, default_value = "sha2-256")]
        hash: String,
        #[arg(long)]
        cid_version: Option<u8>,
        #[arg(long)]
        pin: bool,
    },
    /// Print a value as dag-json
    Get {
        /// `<cid>` or `<cid>/path/inside`.
        reference: String,
        /// Do not follow links out of the first block.
        #[arg(long)]
        local: bool,
    },
    /// Find the block a path ends in
    Resolve { path: String },
}

// ---------------------------------------------------------------------------
// object
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ObjectAction {
    /// Create a node from a template (`empty` or `unixfs-dir`)
    New {
        #[arg(default_value = "empty")]
        template: String,
    },
    /// Print a node's data and links
    Get { cid: String },
    /// Print a node's data
    Data { cid: String },
    /// List a node's links
    Links { cid: String },
    /// Show sizes of a node
    Stat { cid: String },
    /// Derive a new node from an existing one
    Patch {
        #[command(subcommand)]
        action: PatchAction,
    },
}

#[derive(Subcommand)]
pub enum PatchAction {
    AddLink { cid: String, name: String, target: String },
    RmLink { cid: String, name: String },
    AppendData { cid: String, file: Option<String> },
    SetData { cid: String, file: Option<String> },
}

// ---------------------------------------------------------------------------
// files
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum FilesAction {
    /// Write data into a file
    Write {
        path: String,
        /// File to read; `-` or nothing for stdin.
        file: Option<String>,
        #[arg(short = 'e', long)]
        create: bool,
        #[arg(short, long)]
        parents: bool,
        #[arg(short, long, default_value = "0")]
        offset: u64,
        /// Write at most this many bytes.
        #[arg(short, long)]
        count: Option<u64>,
        #[arg(short, long)]
        truncate: bool,
        #[arg(long)]
        raw_leaves: Option<bool>,
        #[arg(long)]
        cid_version: Option<u8>,
    },
    /// Print a file
    Read {
        path: String,
        #[arg(short, long, default_value = "0")]
        offset: u64,
        #[arg(short, long)]
        count: Option<u64>,
    },
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Show type, size and CID.
        #[arg(short, long)]
        long: bool,
    },
    /// Create a directory
    Mkdir {
        path: String,
        #[arg(short, long)]
        parents: bool,
        /// Octal mode, e.g. 0750.
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        cid_version: Option<u8>,
        #[arg(long)]
        shard_split_threshold: Option<usize>,
    },
    /// Remove files or directories
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Move entries; the last path is the destination
    Mv {
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
        #[arg(short, long)]
        parents: bool,
    },
    /// Copy entries, from MFS or `/ipfs/`; the last path is the destination
    Cp {
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
        #[arg(short, long)]
        parents: bool,
    },
    /// Show an entry's details
    Stat {
        path: String,
        /// Also report how much of the DAG is held locally.
        #[arg(long)]
        with_local: bool,
    },
    /// Change permissions
    Chmod {
        mode: String,
        path: String,
        #[arg(short = 'R', long)]
        recursive: bool,
    },
    /// Set the modification time
    Touch {
        path: String,
        /// Seconds since the epoch; defaults to now.
        #[arg(short, long)]
        mtime: Option<i64>,
    },
    /// Print the CID of a path
    Flush {
        #[arg(default_value = "/")]
        path: String,
    },
}

// ---------------------------------------------------------------------------
// pin / repo
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum PinAction {
    Add {
        #[arg(required = true)]
        cids: Vec<String>,
        /// Pin only the named blocks, not their children.
        #[arg(long)]
        direct: bool,
    },
    Rm {
        #[arg(required = true)]
        cids: Vec<String>,
        #[arg(long)]
        direct: bool,
    },
    Ls {
        cids: Vec<String>,
        /// all, direct, recursive or indirect.
        #[arg(short = 't', long = "type", default_value = "all")]
        filter: String,
    },
}

#[derive(Subcommand)]
pub enum RepoAction {
    /// Delete blocks that are neither pinned nor part of the file system
    Gc,
}
