use bytes::Bytes;
use dagfs_types::Cid;

use crate::dag::Dag;
use crate::error::{UnixFsError, UnixFsResult};
use crate::node::NodeBody;

#[derive(Clone, Copy, Debug)]
struct Pending {
    cid: Cid,
    /// File offset of the node's first byte.
    start: u64,
}

/// Pull reader over a file DAG.
///
/// Yields the bytes in `[offset, offset + length)` one block at a time,
/// skipping subtrees that fall outside the range using the parents'
/// recorded block sizes. Reading past the end yields nothing.
pub struct FileReader {
    dag: Dag,
    stack: Vec<Pending>,
    from: u64,
    to: u64,
    size: u64,
}

impl FileReader {
    pub async fn open(dag: Dag, cid: &Cid, offset: u64, length: Option<u64>) -> UnixFsResult<Self> {
        let root = dag.load(cid).await?;
        root.expect_file()?;
        let size = root.file_size();
        let to = length.map_or(size, |len| offset.saturating_add(len).min(size));
        let stack = if offset < to {
            vec![Pending {
                cid: *cid,
                start: 0,
            }]
        } else {
            Vec::new()
        };
        Ok(Self {
            dag,
            stack,
            from: offset,
            to,
            size,
        })
    }

    /// Total content length of the file.
    pub fn file_size(&self) -> u64 {
        self.size
    }

    /// Next slice of content, or `None` when the range is exhausted.
    pub async fn next_chunk(&mut self) -> UnixFsResult<Option<Bytes>> {
        while let Some(pending) = self.stack.pop() {
            let node = self.dag.load(&pending.cid).await?;
            let (inline, links, sizes) = match node.body {
                NodeBody::Raw(bytes) => (bytes, Vec::new(), Vec::new()),
                NodeBody::Pb { links, data } => {
                    node_sizes(&pending.cid, &links, &data.blocksizes)?;
                    let inline = data.data.map(Bytes::from).unwrap_or_default();
                    (inline, links, data.blocksizes)
                }
            };

            let corrupt = || UnixFsError::Corrupt {
                cid: pending.cid,
                reason: "block sizes overflow".into(),
            };
            let inline_end = pending.start.checked_add(inline.len() as u64).ok_or_else(corrupt)?;
            let mut child_start = inline_end;
            let mut children = Vec::new();
            for (link, size) in links.iter().zip(&sizes) {
                let child_end = child_start.checked_add(*size).ok_or_else(corrupt)?;
                if child_start < self.to && child_end > self.from {
                    children.push(Pending {
                        cid: link.cid,
                        start: child_start,
                    });
                }
                child_start = child_end;
            }
            self.stack.extend(children.into_iter().rev());

            if let Some(slice) = self.clip(pending.start, inline_end, &inline) {
                return Ok(Some(slice));
            }
        }
        Ok(None)
    }

    fn clip(&self, start: u64, end: u64, bytes: &Bytes) -> Option<Bytes> {
        let lo = self.from.max(start);
        let hi = self.to.min(end);
        (lo < hi).then(|| bytes.slice((lo - start) as usize..(hi - start) as usize))
    }

    /// Abandon the read. Later pulls return `None`.
    pub fn close(&mut self) {
        self.stack.clear();
    }

    pub async fn read_to_end(mut self) -> UnixFsResult<Vec<u8>> {
        let mut out = Vec::with_capacity((self.to.saturating_sub(self.from)) as usize);
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

pub(crate) fn node_sizes(cid: &Cid, links: &[dagfs_codec::PbLink], sizes: &[u64]) -> UnixFsResult<()> {
    if links.len() != sizes.len() {
        return Err(UnixFsError::Corrupt {
            cid: *cid,
            reason: format!("{} links but {} block sizes", links.len(), sizes.len()),
        });
    }
    Ok(())
}

impl std::fmt::Debug for FileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReader")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("pending", &self.stack.len())
            .finish()
    }
}

impl Dag {
    /// Read a whole file range into memory.
    pub async fn cat(&self, cid: &Cid, offset: u64, length: Option<u64>) -> UnixFsResult<Vec<u8>> {
        FileReader::open(self.clone(), cid, offset, length)
            .await?
            .read_to_end()
            .await
    }
}
