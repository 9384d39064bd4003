use std::fmt;
use std::str::FromStr;

use dagfs_types::{parse_cid, Cid};

use crate::dag::Dag;
use crate::error::{UnixFsError, UnixFsResult};

/// A content path: a root CID and the names below it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IpfsPath {
    pub root: Cid,
    pub segments: Vec<String>,
}

impl IpfsPath {
    pub fn new(root: Cid) -> Self {
        Self {
            root,
            segments: Vec::new(),
        }
    }

    pub fn join(mut self, name: impl Into<String>) -> Self {
        self.segments.push(name.into());
        self
    }
}

impl fmt::Display for IpfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/ipfs/{}", self.root)?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for IpfsPath {
    type Err = UnixFsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_ipfs_path(s)
    }
}

/// Parse `/ipfs/<cid>/a/b`, or the same without the `/ipfs/` prefix.
pub fn parse_ipfs_path(path: &str) -> UnixFsResult<IpfsPath> {
    let trimmed = path
        .strip_prefix("/ipfs/")
        .or_else(|| path.strip_prefix("ipfs/"))
        .unwrap_or(path);
    if trimmed.starts_with('/') {
        return Err(UnixFsError::InvalidPath(path.to_string()));
    }
    let mut parts = trimmed.split('/').filter(|s| !s.is_empty());
    let root = parts
        .next()
        .ok_or_else(|| UnixFsError::InvalidPath(path.to_string()))?;
    let root = parse_cid(root).map_err(|_| UnixFsError::InvalidPath(path.to_string()))?;
    let segments = parts.map(str::to_string).collect();
    Ok(IpfsPath { root, segments })
}

/// Follow `path` through UnixFS directories to the CID it names.
pub async fn resolve_path(dag: &Dag, path: &IpfsPath) -> UnixFsResult<Cid> {
    let mut current = path.root;
    for segment in &path.segments {
        current = dag
            .dir_lookup(&current, segment)
            .await?
            .ok_or_else(|| UnixFsError::NoSuchEntry(segment.clone()))?
            .cid;
    }
    Ok(current)
}
