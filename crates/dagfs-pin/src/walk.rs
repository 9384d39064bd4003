//! Reachability over blocks of any supported codec.

use std::collections::HashSet;

use dagfs_codec::links;
use dagfs_store::{AbortOptions, BlockService};
use dagfs_types::{codec_of, to_v1, Cid};

use crate::error::PinResult;

/// Every block reachable from `roots`, keyed by CIDv1.
///
/// With `local_only` a missing block ends that branch of the walk; the
/// missing CID is still reported as reachable. Otherwise missing blocks
/// are fetched and a block nobody can supply fails the walk.
pub async fn reachable(
    blocks: &BlockService,
    roots: impl IntoIterator<Item = Cid>,
    local_only: bool,
    abort: &AbortOptions,
) -> PinResult<HashSet<Cid>> {
    let mut seen = HashSet::new();
    let mut stack: Vec<Cid> = roots.into_iter().collect();
    while let Some(cid) = stack.pop() {
        abort.check()?;
        if !seen.insert(to_v1(&cid)) {
            continue;
        }
        let bytes = if local_only {
            match blocks.get_local(&cid)? {
                Some(bytes) => bytes,
                None => continue,
            }
        } else {
            blocks.get(&cid, abort).await?
        };
        stack.extend(links(codec_of(&cid)?, &bytes)?);
    }
    Ok(seen)
}

/// Find which of `roots` reaches `target`, walking one root at a time.
pub(crate) async fn find_parent(
    blocks: &BlockService,
    roots: &[Cid],
    target: &Cid,
    abort: &AbortOptions,
) -> PinResult<Option<Cid>> {
    let target = to_v1(target);
    for root in roots {
        if to_v1(root) == target {
            continue;
        }
        if reachable(blocks, [*root], true, abort).await?.contains(&target) {
            return Ok(Some(*root));
        }
    }
    Ok(None)
}
