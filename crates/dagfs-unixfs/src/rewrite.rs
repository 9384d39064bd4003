//! Partial file rewrites.
//!
//! Writing into an existing file streams its content back through a
//! [`FileBuilder`] with the new bytes spliced in. Leaves that lie wholly
//! outside the written range, sit on a chunk boundary and were written
//! with the current layout are linked again by CID without being read.
//! The result is the tree a fresh import of the new content would give.

use bytes::Bytes;
use dagfs_types::{cid_version, codec_of, hash_alg_of, Cid, Codec};

use crate::dag::Dag;
use crate::error::{UnixFsError, UnixFsResult};
use crate::file::{inline_file, FileBuilder, FileOptions, Part};
use crate::node::NodeBody;
use crate::reader::node_sizes;
use crate::BuiltFile;

/// A run of bytes from the old file.
struct Piece {
    cid: Cid,
    start: u64,
    size: u64,
    /// Content, unless it is a raw leaf nobody needed to read yet.
    bytes: Option<Bytes>,
    /// Set when the block can be linked into the new file as is.
    leaf: Option<Part>,
}

impl Piece {
    fn end(&self) -> u64 {
        self.start + self.size
    }
}

#[derive(Clone, Copy)]
struct Pending {
    cid: Cid,
    start: u64,
    size: u64,
    depth: usize,
}

/// Walks a file's leaves in order, skipping subtrees inside `[skip_from,
/// skip_to)`.
struct LeafWalker<'a> {
    dag: &'a Dag,
    raw_leaves: bool,
    stack: Vec<Pending>,
    skip_from: u64,
    skip_to: u64,
}

impl<'a> LeafWalker<'a> {
    async fn open(dag: &'a Dag, cid: &Cid, raw_leaves: bool, skip: (u64, u64)) -> UnixFsResult<(Self, u64)> {
        let root = dag.load(cid).await?;
        root.expect_file()?;
        let size = root.file_size();
        let walker = Self {
            dag,
            raw_leaves,
            stack: vec![Pending {
                cid: *cid,
                start: 0,
                size,
                depth: 0,
            }],
            skip_from: skip.0,
            skip_to: skip.1,
        };
        Ok((walker, size))
    }

    async fn next(&mut self) -> UnixFsResult<Option<Piece>> {
        while let Some(pending) = self.stack.pop() {
            if pending.depth > 0 && codec_of(&pending.cid)? == Codec::Raw {
                let leaf = (self.raw_leaves && self.written_here(&pending.cid, Codec::Raw))
                    .then_some(Part {
                        cid: pending.cid,
                        tsize: pending.size,
                        size: pending.size,
                    });
                return Ok(Some(Piece {
                    cid: pending.cid,
                    start: pending.start,
                    size: pending.size,
                    bytes: None,
                    leaf,
                }));
            }

            let node = self.dag.load(&pending.cid).await?;
            let block_size = node.block_size;
            let (links, data) = match node.body {
                NodeBody::Raw(bytes) => {
                    return Ok(Some(Piece {
                        cid: pending.cid,
                        start: pending.start,
                        size: bytes.len() as u64,
                        bytes: Some(bytes),
                        leaf: None,
                    }))
                }
                NodeBody::Pb { links, data } => (links, data),
            };
            node_sizes(&pending.cid, &links, &data.blocksizes)?;
            let inline = data.data.clone().map(Bytes::from).unwrap_or_default();

            if links.is_empty() {
                if pending.depth > 0 && inline.len() as u64 != pending.size {
                    return Err(UnixFsError::Corrupt {
                        cid: pending.cid,
                        reason: format!("leaf holds {} bytes, parent records {}", inline.len(), pending.size),
                    });
                }
                let reusable = pending.depth > 0
                    && !self.raw_leaves
                    && self.written_here(&pending.cid, Codec::DagPb)
                    && data == inline_file(inline.to_vec(), None, None);
                return Ok(Some(Piece {
                    cid: pending.cid,
                    start: pending.start,
                    size: inline.len() as u64,
                    leaf: reusable.then_some(Part {
                        cid: pending.cid,
                        tsize: block_size,
                        size: inline.len() as u64,
                    }),
                    bytes: Some(inline),
                }));
            }

            let corrupt = || UnixFsError::Corrupt {
                cid: pending.cid,
                reason: "block sizes overflow".into(),
            };
            let mut child_start = pending.start.checked_add(inline.len() as u64).ok_or_else(corrupt)?;
            let mut children = Vec::with_capacity(links.len());
            for (link, &size) in links.iter().zip(&data.blocksizes) {
                let child_end = child_start.checked_add(size).ok_or_else(corrupt)?;
                let skipped = child_start >= self.skip_from && child_end <= self.skip_to;
                if size > 0 && !skipped {
                    children.push(Pending {
                        cid: link.cid,
                        start: child_start,
                        size,
                        depth: pending.depth + 1,
                    });
                }
                child_start = child_end;
            }
            self.stack.extend(children.into_iter().rev());

            if !inline.is_empty() {
                return Ok(Some(Piece {
                    cid: pending.cid,
                    start: pending.start,
                    size: inline.len() as u64,
                    bytes: Some(inline),
                    leaf: None,
                }));
            }
        }
        Ok(None)
    }

    /// Whether `cid` has the version and hash a new block of `codec`
    /// would get.
    fn written_here(&self, cid: &Cid, codec: Codec) -> bool {
        let put = self.dag.cid_options().put_options(codec);
        cid_version(cid) == put.cid_version && hash_alg_of(cid).is_ok_and(|h| h == put.hash_alg)
    }
}

impl Dag {
    /// Write `data` at `offset` into the file `base`, or into an empty
    /// file when there is none. A gap past the old end reads as zeros.
    pub async fn overwrite_file(
        &self,
        base: Option<&Cid>,
        offset: u64,
        data: &[u8],
        opts: &FileOptions,
    ) -> UnixFsResult<BuiltFile> {
        let end = offset.checked_add(data.len() as u64).ok_or_else(|| {
            UnixFsError::InvalidOption(format!(
                "writing {} bytes at offset {offset} overflows the file size",
                data.len()
            ))
        })?;
        let mut builder = FileBuilder::new(self.clone(), opts.clone())?;
        let Some(base) = base else {
            builder.write_zeros(offset).await?;
            builder.write(data).await?;
            return builder.finish().await;
        };

        let (mut walker, old_size) = LeafWalker::open(self, base, opts.raw_leaves, (offset, end)).await?;
        let new_size = old_size.max(end);
        let head_end = offset.min(old_size);
        let mut spliced = false;
        while let Some(piece) = walker.next().await? {
            self.abort().check()?;
            self.carry(&mut builder, &piece, 0, head_end, new_size).await?;
            if !spliced && piece.end() > head_end {
                builder.write(data).await?;
                spliced = true;
            }
            self.carry(&mut builder, &piece, end, old_size, new_size).await?;
        }
        if !spliced {
            builder.write_zeros(offset.saturating_sub(old_size)).await?;
            builder.write(data).await?;
        }
        builder.finish().await
    }

    /// Copy the part of `piece` inside `[lo, hi)` into the new file.
    async fn carry(
        &self,
        builder: &mut FileBuilder,
        piece: &Piece,
        lo: u64,
        hi: u64,
        new_size: u64,
    ) -> UnixFsResult<()> {
        let from = piece.start.max(lo);
        let to = piece.end().min(hi);
        if from >= to {
            return Ok(());
        }
        if let Some(leaf) = piece.leaf {
            let whole = from == piece.start && to == piece.end();
            if whole && builder.can_adopt(piece.start, piece.size, new_size) {
                return builder.adopt(leaf).await;
            }
        }
        let bytes = match &piece.bytes {
            Some(bytes) => bytes.clone(),
            None => self.get(&piece.cid).await?,
        };
        if bytes.len() as u64 != piece.size {
            return Err(UnixFsError::Corrupt {
                cid: piece.cid,
                reason: format!("leaf holds {} bytes, parent records {}", bytes.len(), piece.size),
            });
        }
        let range = (from - piece.start) as usize..(to - piece.start) as usize;
        builder.write(&bytes[range]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagfs_store::BlockService;
    use dagfs_types::{CidVersion, HashAlg};
    use proptest::prelude::*;

    use crate::dag::CidOptions;

    fn layout(raw_leaves: bool) -> FileOptions {
        FileOptions {
            chunk_size: 8,
            max_children: 3,
            raw_leaves,
            ..FileOptions::default()
        }
    }

    fn content(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i * 13 % 251) as u8 + 1).collect()
    }

    fn spliced(old: &[u8], offset: usize, data: &[u8]) -> Vec<u8> {
        let mut out = old.to_vec();
        let end = offset + data.len();
        if out.len() < end {
            out.resize(end, 0);
        }
        out[offset..end].copy_from_slice(data);
        out
    }

    async fn leaves(dag: &Dag, cid: &Cid) -> Vec<Cid> {
        let mut out = Vec::new();
        let mut stack = vec![*cid];
        while let Some(cid) = stack.pop() {
            let node = dag.load(&cid).await.unwrap();
            if node.links().is_empty() {
                out.push(cid);
            } else {
                stack.extend(node.links().iter().rev().map(|l| l.cid));
            }
        }
        out
    }

    #[tokio::test]
    async fn matches_a_fresh_import() {
        let dag = Dag::new(BlockService::in_memory());
        let old = content(100);
        for raw in [true, false] {
            let opts = layout(raw);
            let base = dag.add_bytes(&old, &opts).await.unwrap();
            for (offset, len) in [(0, 1), (5, 10), (16, 8), (95, 10), (100, 3), (130, 4), (0, 0)] {
                let data = vec![0xee; len];
                let got = dag.overwrite_file(Some(&base.cid), offset, &data, &opts).await.unwrap();
                let want = dag.add_bytes(&spliced(&old, offset as usize, &data), &opts).await.unwrap();
                assert_eq!(got, want, "raw={raw} offset={offset} len={len}");
            }
        }
    }

    #[tokio::test]
    async fn untouched_leaves_keep_their_cids() {
        let dag = Dag::new(BlockService::in_memory());
        let opts = layout(true);
        let base = dag.add_bytes(&content(80), &opts).await.unwrap();
        let before = leaves(&dag, &base.cid).await;

        let after = dag.overwrite_file(Some(&base.cid), 0, b"Z", &opts).await.unwrap();
        let after = leaves(&dag, &after.cid).await;
        assert_eq!(after.len(), before.len());
        assert_ne!(after[0], before[0]);
        assert_eq!(after[1..], before[1..]);
    }

    #[tokio::test]
    async fn layout_change_rebuilds_leaves() {
        let dag = Dag::new(BlockService::in_memory());
        let old = content(40);
        let base = dag.add_bytes(&old, &layout(false)).await.unwrap();
        let got = dag.overwrite_file(Some(&base.cid), 3, b"abc", &layout(true)).await.unwrap();
        let want = dag.add_bytes(&spliced(&old, 3, b"abc"), &layout(true)).await.unwrap();
        assert_eq!(got, want);

        let v1 = dag.clone().with_cid_options(CidOptions::new(CidVersion::V1, HashAlg::Blake3));
        let got = v1.overwrite_file(Some(&base.cid), 3, b"abc", &layout(false)).await.unwrap();
        let want = v1.add_bytes(&spliced(&old, 3, b"abc"), &layout(false)).await.unwrap();
        assert_eq!(got, want);
    }

    #[tokio::test]
    async fn gap_is_zero_filled() {
        let dag = Dag::new(BlockService::in_memory());
        let opts = layout(true);
        let got = dag.overwrite_file(None, 50, b"end", &opts).await.unwrap();
        let mut want = vec![0; 50];
        want.extend_from_slice(b"end");
        assert_eq!(dag.cat(&got.cid, 0, None).await.unwrap(), want);
        assert_eq!(got, dag.add_bytes(&want, &opts).await.unwrap());
    }

    #[tokio::test]
    async fn overflowing_offset_is_rejected() {
        let dag = Dag::new(BlockService::in_memory());
        let err = dag
            .overwrite_file(None, u64::MAX, b"Z", &layout(true))
            .await
            .unwrap_err();
        assert!(matches!(err, UnixFsError::InvalidOption(_)));
    }

    #[tokio::test]
    async fn metadata_applies_to_the_new_root() {
        let dag = Dag::new(BlockService::in_memory());
        let old = content(8);
        let base = dag.add_bytes(&old, &layout(true)).await.unwrap();
        let opts = layout(true).with_metadata(Some(0o600), None);
        let got = dag.overwrite_file(Some(&base.cid), 8, b"", &opts).await.unwrap();
        assert_eq!(got, dag.add_bytes(&old, &opts).await.unwrap());
        assert_eq!(dag.load(&got.cid).await.unwrap().mode(), 0o600);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_write_matches_import(len in 0usize..120, offset in 0usize..140, data in proptest::collection::vec(any::<u8>(), 0..30), raw in any::<bool>()) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let old = content(len);
            let (got, want) = rt.block_on(async {
                let dag = Dag::new(BlockService::in_memory());
                let opts = layout(raw);
                let base = dag.add_bytes(&old, &opts).await.unwrap();
                let got = dag.overwrite_file(Some(&base.cid), offset as u64, &data, &opts).await.unwrap();
                let want = dag.add_bytes(&spliced(&old, offset, &data), &opts).await.unwrap();
                (got, want)
            });
            prop_assert_eq!(got, want);
        }
    }
}
