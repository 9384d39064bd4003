//! Mark and sweep.

use dagfs_store::{is_identity, AbortOptions, BlockService};
use dagfs_types::{to_v1, Cid};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PinResult;
use crate::pinner::Pinner;
use crate::walk::reachable;

/// Outcome of a collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    #[serde(with = "dagfs_types::serde_cid::vec")]
    pub removed: Vec<Cid>,
    pub bytes_freed: u64,
    /// Blocks that could not be deleted, with the reason.
    pub errors: Vec<String>,
}

/// Delete every local block not reachable from a pin or from
/// `extra_roots`.
///
/// Holds the collector side of the GC lock for the whole run, so no
/// writer is between writing blocks and linking them into a root.
/// `extra_roots` is evaluated once the lock is held, which makes it the
/// place to read roots that writers move, such as the MFS root.
pub async fn collect_garbage<F>(
    blocks: &BlockService,
    pinner: &Pinner,
    extra_roots: F,
    abort: &AbortOptions,
) -> PinResult<GcReport>
where
    F: FnOnce() -> Vec<Cid> + Send,
{
    let _guard = blocks.gc_lock().collector().await;
    let recursive = pinner.recursive_roots();
    let direct = pinner.direct_roots();
    let extra = extra_roots();

    let mut live = reachable(blocks, recursive.into_iter().chain(extra), true, abort).await?;
    live.extend(direct.iter().map(to_v1));

    let mut report = GcReport::default();
    for cid in blocks.list()? {
        abort.check()?;
        if is_identity(&cid) || live.contains(&to_v1(&cid)) {
            continue;
        }
        let size = blocks.store().size(&cid).ok().flatten().unwrap_or(0);
        match blocks.delete(&cid) {
            Ok(true) => {
                report.removed.push(cid);
                report.bytes_freed += size;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(%cid, error = %e, "could not delete block");
                report.errors.push(format!("{cid}: {e}"));
            }
        }
    }
    info!(
        live = live.len(),
        removed = report.removed.len(),
        bytes_freed = report.bytes_freed,
        errors = report.errors.len(),
        "garbage collection finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pinner::PinAddOptions;
    use dagfs_codec::pb;
    use dagfs_store::PutOptions;
    use dagfs_types::{CidVersion, Codec, HashAlg};

    async fn raw(blocks: &BlockService, data: &'static [u8]) -> Cid {
        blocks.put(data, &PutOptions::default()).await.unwrap()
    }

    async fn dir(blocks: &BlockService, child: Cid) -> Cid {
        blocks
            .put(
                pb::encode(pb::node(Some(vec![8, 1]), vec![pb::link(child, "c", 1)])),
                &PutOptions::new(Codec::DagPb, HashAlg::Sha2_256, CidVersion::V0),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn removes_only_unreachable_blocks() {
        let blocks = BlockService::in_memory();
        let pinner = Pinner::in_memory(blocks.clone());
        let kept_leaf = raw(&blocks, b"kept").await;
        let kept_root = dir(&blocks, kept_leaf).await;
        let direct = raw(&blocks, b"direct").await;
        let mfs_leaf = raw(&blocks, b"mfs").await;
        let garbage = raw(&blocks, b"garbage").await;

        pinner.add(&kept_root, &PinAddOptions::recursive()).await.unwrap();
        pinner.add(&direct, &PinAddOptions::direct()).await.unwrap();

        let report = collect_garbage(&blocks, &pinner, || vec![mfs_leaf], &AbortOptions::new())
            .await
            .unwrap();
        assert_eq!(report.removed, vec![to_v1(&garbage)]);
        assert_eq!(report.bytes_freed, 7);
        assert!(report.errors.is_empty());
        for cid in [kept_leaf, kept_root, direct, mfs_leaf] {
            assert!(blocks.has_local(&cid).unwrap());
        }
        assert!(!blocks.has_local(&garbage).unwrap());
    }

    #[tokio::test]
    async fn direct_pin_does_not_protect_children() {
        let blocks = BlockService::in_memory();
        let pinner = Pinner::in_memory(blocks.clone());
        let leaf = raw(&blocks, b"leaf").await;
        let root = dir(&blocks, leaf).await;
        pinner.add(&root, &PinAddOptions::direct()).await.unwrap();

        collect_garbage(&blocks, &pinner, Vec::new, &AbortOptions::new())
            .await
            .unwrap();
        assert!(blocks.has_local(&root).unwrap());
        assert!(!blocks.has_local(&leaf).unwrap());
    }

    #[tokio::test]
    async fn unpinned_blocks_go_away() {
        let blocks = BlockService::in_memory();
        let pinner = Pinner::in_memory(blocks.clone());
        let cid = raw(&blocks, b"temporary").await;
        pinner.add(&cid, &PinAddOptions::recursive()).await.unwrap();
        collect_garbage(&blocks, &pinner, Vec::new, &AbortOptions::new())
            .await
            .unwrap();
        assert!(blocks.has_local(&cid).unwrap());

        pinner.rm(&cid, true, &AbortOptions::new()).await.unwrap();
        let report = collect_garbage(&blocks, &pinner, Vec::new, &AbortOptions::new())
            .await
            .unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(!blocks.has_local(&cid).unwrap());
    }

    #[tokio::test]
    async fn cancelled_gc_deletes_nothing() {
        let blocks = BlockService::in_memory();
        let pinner = Pinner::in_memory(blocks.clone());
        let cid = raw(&blocks, b"survivor").await;
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let abort = AbortOptions::new().with_signal(token);
        assert!(collect_garbage(&blocks, &pinner, Vec::new, &abort).await.is_err());
        assert!(blocks.has_local(&cid).unwrap());
    }
}
