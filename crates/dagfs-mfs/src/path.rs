use std::fmt;

use dagfs_unixfs::{parse_ipfs_path, IpfsPath};

use crate::error::{FilesError, FilesResult};

/// A path as accepted by MFS calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilesPath {
    /// A path inside the mutable tree; no segments means `/`.
    Mfs(Vec<String>),
    /// An immutable `/ipfs/<cid>/...` path.
    Ipfs(IpfsPath),
}

impl FilesPath {
    pub fn parse(path: &str) -> FilesResult<Self> {
        if path.starts_with("/ipfs/") {
            return parse_ipfs_path(path)
                .map(FilesPath::Ipfs)
                .map_err(|_| FilesError::InvalidPath(path.to_string()));
        }
        if !path.starts_with('/') {
            return Err(FilesError::InvalidPath(path.to_string()));
        }
        let mut segments = Vec::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            match segment {
                "." => {}
                ".." => {
                    segments.pop();
                }
                name => segments.push(name.to_string()),
            }
        }
        Ok(FilesPath::Mfs(segments))
    }

    /// Parse a path that must name something in the mutable tree.
    pub fn parse_mfs(path: &str) -> FilesResult<Vec<String>> {
        match Self::parse(path)? {
            FilesPath::Mfs(segments) => Ok(segments),
            FilesPath::Ipfs(_) => Err(FilesError::InvalidArgument(format!(
                "{path} is immutable and cannot be changed"
            ))),
        }
    }

    /// The last segment, or the root CID for a bare `/ipfs/<cid>`.
    pub fn basename(&self) -> Option<String> {
        match self {
            FilesPath::Mfs(segments) => segments.last().cloned(),
            FilesPath::Ipfs(p) => p.segments.last().cloned().or_else(|| Some(p.root.to_string())),
        }
    }
}

impl fmt::Display for FilesPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilesPath::Mfs(segments) => f.write_str(&display(segments)),
            FilesPath::Ipfs(p) => p.fmt(f),
        }
    }
}

/// `/a/b` form of a segment list.
pub fn display(segments: &[String]) -> String {
    if segments.is_empty() {
        "/".to_string()
    } else {
        segments.iter().map(|s| format!("/{s}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mfs(path: &str) -> Vec<String> {
        FilesPath::parse_mfs(path).unwrap()
    }

    #[test]
    fn normalizes() {
        assert!(mfs("/").is_empty());
        assert_eq!(mfs("/a//b/"), vec!["a", "b"]);
        assert_eq!(mfs("/a/./b/../c"), vec!["a", "c"]);
        assert!(mfs("/..").is_empty());
    }

    #[test]
    fn leading_slash_is_required() {
        let err = FilesPath::parse("a/b").unwrap_err();
        assert_eq!(err.kind(), dagfs_types::ErrorKind::InvalidPath);
        assert!(FilesPath::parse("").is_err());
    }

    #[test]
    fn ipfs_paths() {
        let cid = "QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn";
        let path = FilesPath::parse(&format!("/ipfs/{cid}/x")).unwrap();
        assert!(matches!(path, FilesPath::Ipfs(_)));
        assert_eq!(path.basename().as_deref(), Some("x"));
        let bare = FilesPath::parse(&format!("/ipfs/{cid}")).unwrap();
        assert_eq!(bare.basename().as_deref(), Some(cid));
        assert!(FilesPath::parse_mfs(&format!("/ipfs/{cid}")).is_err());
        assert!(FilesPath::parse("/ipfs/garbage").is_err());
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(display(&[]), "/");
        assert_eq!(FilesPath::parse("/a/b").unwrap().to_string(), "/a/b");
    }
}
